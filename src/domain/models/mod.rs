mod chat_session;
mod conversation;
mod credential;
mod secret_ref;
mod session_config;

pub use chat_session::*;
pub use conversation::*;
pub use credential::*;
pub use secret_ref::*;
pub use session_config::*;
