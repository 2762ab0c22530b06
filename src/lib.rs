pub mod application;
pub mod cli;
pub mod config;
pub mod connector;
pub mod domain;
pub mod logging;

pub use application::{
    ChatProvider, ChatRelayUseCase, ChunkStream, CredentialResolver, CredentialStrategy,
    ProviderStream, RelayOutcome, SecretStore,
};

pub use config::{AppConfig, ConfigBuilder, RunMode, ServerConfig};

pub use connector::{
    build_router, Container, ContainerConfig, GcpSecretManager, GeminiClient, MockChatProvider,
    MockEvent,
};

pub use domain::{
    AskRequest, ChatSession, ConversationTurn, Credential, DomainError, HarmCategory, Role,
    SafetySettings, SafetyThreshold, SecretRef, SessionConfig,
};
