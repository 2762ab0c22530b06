use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::{ChatProvider, ProviderStream};
use crate::connector::adapter::sse_data_events;
use crate::domain::{ChatSession, Credential, DomainError, SessionConfig};

const API_VERSION_PATH: &str = "/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";
/// Finish reasons that mean the candidate was withheld by a content filter.
const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent<'a>>,
    safety_settings: Vec<WireSafetySetting>,
}

#[derive(Serialize)]
struct WireContent<'a> {
    role: &'a str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct WireSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// One `data:` payload of a `streamGenerateContent?alt=sse` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

/// Streaming client for the Gemini `generateContent` API.
///
/// Each [`ChatProvider::start_chat`] call sends the session history followed
/// by the question, together with the session's safety thresholds, and reads
/// the reply as server-sent events. The API key travels in the
/// `x-goog-api-key` header and never appears in URLs or logs.
pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    /// Full endpoint URL for streamed generation.
    url: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base: String = base_url.into();
        let model: String = model.into();
        let url = format!(
            "{}{}/{}:streamGenerateContent?alt=sse",
            base.trim_end_matches('/'),
            API_VERSION_PATH,
            model
        );
        Self {
            // No overall timeout: replies stream for as long as the relay's
            // per-request deadline allows.
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            model,
            url,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.api_base_url(), config.model())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request<'a>(session: &'a ChatSession, question: &'a str) -> GenerateContentRequest<'a> {
        let mut contents: Vec<WireContent<'a>> = session
            .history()
            .iter()
            .map(|turn| WireContent {
                role: turn.role().as_str(),
                parts: turn.parts().iter().map(|p| WirePart { text: p }).collect(),
            })
            .collect();
        contents.push(WireContent {
            role: "user",
            parts: vec![WirePart { text: question }],
        });

        GenerateContentRequest {
            contents,
            safety_settings: session
                .config()
                .safety()
                .iter()
                .map(|(category, threshold)| WireSafetySetting {
                    category: category.api_name(),
                    threshold: threshold.api_name(),
                })
                .collect(),
        }
    }

    /// Extract the text carried by one streamed event.
    ///
    /// Safety blocks and embedded API errors become provider errors; an event
    /// with no text (e.g. the final usage-only event) yields an empty string.
    fn parse_chunk(data: &str) -> Result<String, DomainError> {
        let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
            DomainError::provider(format!("GeminiClient: failed to parse stream event: {e}"))
        })?;

        if let Some(error) = chunk.error {
            return Err(DomainError::provider(format!(
                "GeminiClient: API error {} {}: {}",
                error.code.map(|c| c.to_string()).unwrap_or_default(),
                error.status.unwrap_or_default(),
                error.message.unwrap_or_default()
            )));
        }

        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(DomainError::provider(format!(
                "GeminiClient: prompt blocked by safety filter ({reason})"
            )));
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(String::new());
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            if let Some(reason) = candidate
                .finish_reason
                .as_deref()
                .filter(|r| BLOCKING_FINISH_REASONS.iter().any(|b| b == r))
            {
                return Err(DomainError::provider(format!(
                    "GeminiClient: response blocked by safety filter ({reason})"
                )));
            }
        }

        Ok(text)
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn start_chat(
        &self,
        credential: &Credential,
        session: &ChatSession,
        question: &str,
    ) -> Result<ProviderStream, DomainError> {
        let request = Self::build_request(session, question);
        debug!(
            "GeminiClient: sending {} contents to model {}",
            request.contents.len(),
            self.model
        );

        let response = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::provider(format!("GeminiClient: request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("GeminiClient: API returned {status}: {body}");
            return Err(DomainError::provider(format!(
                "GeminiClient: API returned {status}"
            )));
        }

        let events = sse_data_events(response.bytes_stream());
        let stream: ProviderStream =
            Box::pin(events.map(|event| event.and_then(|data| Self::parse_chunk(&data))));
        Ok(stream)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
