use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::application::{ChatProvider, ProviderStream};
use crate::domain::{
    AskRequest, ChatSession, ConversationTurn, Credential, DomainError, SessionConfig,
};

/// Sole chunk sent when no credential could be resolved at startup.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "\n\n[Error: the Gemini model is not configured. Check the server logs.]";

/// Trailing chunk sent when the provider fails after streaming has started.
pub const FALLBACK_MESSAGE: &str =
    "\n\n[A server error occurred while communicating with Gemini. Check the server logs for details.]";

/// Trailing chunk sent when the request deadline passes mid-stream.
pub const TIMEOUT_MESSAGE: &str =
    "\n\n[Gemini did not finish responding in time. Please try again.]";

/// Reply text, one provider fragment per item. Never fails: errors become text.
pub type ChunkStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// How a streamed reply ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed,
    DegradedCompleted,
}

/// Streams Gemini replies for one question plus resupplied history.
///
/// Configuration and credential are injected once and only read afterwards;
/// every call builds its own [`ChatSession`], so concurrent requests share
/// nothing mutable.
pub struct ChatRelayUseCase {
    config: Arc<SessionConfig>,
    credential: Option<Credential>,
    provider: Arc<dyn ChatProvider>,
}

impl ChatRelayUseCase {
    pub fn new(
        config: Arc<SessionConfig>,
        credential: Option<Credential>,
        provider: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            config,
            credential,
            provider,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Validate the request, open a provider session and return the reply stream.
    ///
    /// Returns `Err` only before anything has been produced: caller errors
    /// ([`DomainError::InvalidInput`], [`DomainError::PayloadTooLarge`]), a
    /// session that could not be opened, or a provider failure (such as a
    /// safety block) before the first fragment. Once a fragment has been
    /// produced, provider failures turn into a final [`FALLBACK_MESSAGE`] chunk.
    pub async fn respond(&self, request: AskRequest) -> Result<ChunkStream, DomainError> {
        let Some(credential) = self.credential.as_ref() else {
            warn!("Chat request received but no Gemini API key is configured");
            let diagnostic: ChunkStream =
                Box::pin(stream::iter([NOT_CONFIGURED_MESSAGE.to_string()]));
            return Ok(diagnostic);
        };

        let question = validate_question(&request.question, self.config.max_question_length())?;
        let history = parse_history(&request.history)?;

        let session = ChatSession::new(Arc::clone(&self.config), history);
        if session.truncated() > 0 {
            debug!(
                "History truncated: dropped {} oldest turns, kept {}",
                session.truncated(),
                session.history().len()
            );
        }

        let deadline = Instant::now() + self.config.request_timeout();

        let mut provider_stream = match timeout_at(
            deadline,
            self.provider.start_chat(credential, &session, &question),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Failed to open a Gemini chat session: {e}");
                return Err(e);
            }
            Err(_) => {
                error!(
                    "Timed out after {:?} opening a Gemini chat session",
                    self.config.request_timeout()
                );
                return Err(DomainError::timeout("opening the Gemini chat session"));
            }
        };

        // Nothing is committed until the first fragment arrives, so a prompt
        // rejected up front still surfaces as a structured error.
        let first = loop {
            match timeout_at(deadline, provider_stream.next()).await {
                Ok(Some(Ok(text))) if text.is_empty() => continue,
                Ok(Some(Ok(text))) => break Some(text),
                Ok(Some(Err(e))) => {
                    error!("Gemini rejected the request before replying: {e}");
                    return Err(e);
                }
                Ok(None) => break None,
                Err(_) => {
                    error!(
                        "Timed out after {:?} waiting for the first Gemini fragment",
                        self.config.request_timeout()
                    );
                    return Err(DomainError::timeout("waiting for the first Gemini fragment"));
                }
            }
        };

        let Some(first) = first else {
            info!(outcome = ?RelayOutcome::Completed, chunks = 0, "Gemini stream ended");
            let empty: ChunkStream = Box::pin(stream::empty());
            return Ok(empty);
        };

        info!(
            model = self.provider.model_name(),
            history = session.history().len(),
            "Streaming Gemini reply"
        );

        Ok(relay_stream(first, provider_stream, deadline, Span::current()))
    }
}

fn validate_question(question: &Value, max_chars: usize) -> Result<String, DomainError> {
    let text = match question {
        Value::Null => return Err(DomainError::invalid_input("Missing 'question' in request body")),
        Value::String(s) => s,
        _ => return Err(DomainError::invalid_input("'question' must be a string")),
    };

    if text.trim().is_empty() {
        return Err(DomainError::invalid_input("'question' must not be empty"));
    }

    let len = text.chars().count();
    if len > max_chars {
        return Err(DomainError::payload_too_large(format!(
            "'question' is {len} characters long; the limit is {max_chars}"
        )));
    }

    Ok(text.clone())
}

fn parse_history(history: &Value) -> Result<Vec<ConversationTurn>, DomainError> {
    match history {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| ConversationTurn::from_value(item, i))
            .collect(),
        _ => Err(DomainError::invalid_input("'history' must be an array")),
    }
}

struct RelayState {
    /// Fragment already read from the provider but not yet yielded.
    pending: Option<String>,
    inner: ProviderStream,
    deadline: Instant,
    finished: bool,
    chunks: usize,
    span: Span,
}

impl RelayState {
    /// Stop pulling from the provider and release its connection.
    fn finish(&mut self, outcome: RelayOutcome) {
        self.finished = true;
        self.inner = Box::pin(stream::empty());
        info!(?outcome, chunks = self.chunks, "Gemini stream ended");
    }
}

fn relay_stream(first: String, inner: ProviderStream, deadline: Instant, span: Span) -> ChunkStream {
    let state = RelayState {
        pending: Some(first),
        inner,
        deadline,
        finished: false,
        chunks: 0,
        span,
    };

    Box::pin(stream::unfold(state, |mut state| {
        let span = state.span.clone();
        async move {
            if let Some(text) = state.pending.take() {
                state.chunks += 1;
                return Some((text, state));
            }
            if state.finished {
                return None;
            }

            loop {
                match timeout_at(state.deadline, state.inner.next()).await {
                    Ok(Some(Ok(text))) => {
                        if text.is_empty() {
                            continue;
                        }
                        state.chunks += 1;
                        return Some((text, state));
                    }
                    Ok(Some(Err(e))) => {
                        error!(
                            chunks = state.chunks,
                            "Error while streaming from Gemini: {e}"
                        );
                        state.finish(RelayOutcome::DegradedCompleted);
                        return Some((FALLBACK_MESSAGE.to_string(), state));
                    }
                    Ok(None) => {
                        state.finish(RelayOutcome::Completed);
                        return None;
                    }
                    Err(_) => {
                        warn!(chunks = state.chunks, "Gemini stream exceeded the request deadline");
                        state.finish(RelayOutcome::DegradedCompleted);
                        return Some((TIMEOUT_MESSAGE.to_string(), state));
                    }
                }
            }
        }
        .instrument(span)
    }))
}
