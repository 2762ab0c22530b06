mod chat_relay;
mod resolve_credential;

pub use chat_relay::*;
pub use resolve_credential::*;
