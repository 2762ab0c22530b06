use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::domain::{ChatSession, Credential, DomainError};

/// Fragments of generated text as the provider produces them.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<String, DomainError>> + Send>>;

/// A remote LLM that continues a chat session and streams its reply.
///
/// Implementors own transport, serialization and vendor-specific details. The
/// relay only sees a stream of text fragments and errors.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a session seeded with `session.history()`, send `question`, and
    /// return the reply stream.
    ///
    /// An `Err` here means nothing was produced; errors inside the stream can
    /// arrive after any number of fragments.
    async fn start_chat(
        &self,
        credential: &Credential,
        session: &ChatSession,
        question: &str,
    ) -> Result<ProviderStream, DomainError>;

    fn model_name(&self) -> &str;
}
