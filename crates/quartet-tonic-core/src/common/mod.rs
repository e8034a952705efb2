//! Shared types and error definitions used across the quartet services.
//!
//! ## Submodules
//!
//! - [`error`] - Centralized service error type used throughout request
//!   handling.
//! - [`types`] - The opaque record identifier and its canonical text form.
//!
//! These definitions are not tied to any specific layer and are imported
//! throughout the server for error propagation and identifier handling.

pub mod error;
pub mod types;

pub use error::{Error, Result};
