//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Gemini streaming client and a scripted mock provider
//! - Google Secret Manager client
//! - HTTP API (axum router, controllers, dependency container)

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::{build_router, Container, ContainerConfig};
