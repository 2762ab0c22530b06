mod gemini_client;
mod mock_chat_provider;
mod secret_manager_client;
mod sse;

pub use gemini_client::*;
pub use mock_chat_provider::*;
pub use secret_manager_client::*;
pub use sse::*;
