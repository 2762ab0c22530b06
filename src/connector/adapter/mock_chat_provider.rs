use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::application::{ChatProvider, ProviderStream};
use crate::domain::{ChatSession, ConversationTurn, Credential, DomainError};

/// One step of a scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Chunk(String),
    Fail(String),
}

#[derive(Debug, Clone)]
enum Behavior {
    Script(Vec<MockEvent>),
    /// Repeat the question back word by word.
    Echo,
    FailToOpen(String),
}

/// Counts events pulled from one reply stream and how many streams are alive.
struct StreamTracker {
    pulled: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
}

impl StreamTracker {
    fn new(pulled: Arc<AtomicUsize>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { pulled, open }
    }

    fn record_pull(&self) {
        self.pulled.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for StreamTracker {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Deterministic [`ChatProvider`] for tests and local development.
///
/// Counts calls, pulled events and live reply streams, and remembers the last
/// history it was given, so callers can check what reached the provider.
pub struct MockChatProvider {
    behavior: Behavior,
    chunk_delay: Option<Duration>,
    calls: AtomicUsize,
    pulled: Arc<AtomicUsize>,
    open_streams: Arc<AtomicUsize>,
    last_history: Mutex<Option<Vec<ConversationTurn>>>,
}

impl MockChatProvider {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            chunk_delay: None,
            calls: AtomicUsize::new(0),
            pulled: Arc::new(AtomicUsize::new(0)),
            open_streams: Arc::new(AtomicUsize::new(0)),
            last_history: Mutex::new(None),
        }
    }

    pub fn new(script: Vec<MockEvent>) -> Self {
        Self::with_behavior(Behavior::Script(script))
    }

    pub fn from_chunks(chunks: &[&str]) -> Self {
        Self::new(chunks.iter().map(|c| MockEvent::Chunk(c.to_string())).collect())
    }

    pub fn echo() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    pub fn failing_to_open(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::FailToOpen(message.into()))
    }

    /// Sleep before every event, to exercise timeouts and incremental delivery.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Events handed out across all reply streams.
    pub fn events_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Reply streams not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub fn last_history(&self) -> Option<Vec<ConversationTurn>> {
        self.last_history
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn echo_events(question: &str) -> Vec<MockEvent> {
        std::iter::once(MockEvent::Chunk("You asked: ".to_string()))
            .chain(
                question
                    .split_whitespace()
                    .map(|word| MockEvent::Chunk(format!("{word} "))),
            )
            .collect()
    }
}

impl Default for MockChatProvider {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn start_chat(
        &self,
        _credential: &Credential,
        session: &ChatSession,
        question: &str,
    ) -> Result<ProviderStream, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_history.lock() {
            *guard = Some(session.history().to_vec());
        }

        let events = match &self.behavior {
            Behavior::Script(script) => script.clone(),
            Behavior::Echo => Self::echo_events(question),
            Behavior::FailToOpen(message) => return Err(DomainError::provider(message.clone())),
        };

        let tracker = StreamTracker::new(Arc::clone(&self.pulled), Arc::clone(&self.open_streams));
        let items = stream::iter(events).map(move |event| {
            tracker.record_pull();
            match event {
                MockEvent::Chunk(text) => Ok(text),
                MockEvent::Fail(message) => Err(DomainError::provider(message)),
            }
        });

        let stream: ProviderStream = match self.chunk_delay {
            Some(delay) => Box::pin(items.then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            })),
            None => Box::pin(items),
        };
        Ok(stream)
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}
