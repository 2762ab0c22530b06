mod chat_provider;
mod secret_store;

pub use chat_provider::*;
pub use secret_store::*;
