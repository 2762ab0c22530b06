//! # Application Layer
//!
//! Use cases (credential resolution, chat relay) and the interfaces they
//! expect from the connector layer.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
