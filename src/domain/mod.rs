//! # Domain Layer
//!
//! Conversation, credential and session configuration models plus the error type.
//! This layer is independent of external frameworks and infrastructure.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
