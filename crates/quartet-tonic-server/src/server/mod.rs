//! Server wiring: configuration, telemetry, per-call supervision, the three
//! gRPC services, and the persistence adapter they share.
//!
//! ## Structure
//!
//! - [`config`] - CLI/environment configuration validated into `ServerConfig`.
//! - [`context`] - Deadline/cancellation supervision for in-flight calls.
//! - [`service`] - The gRPC service implementations.
//! - [`shutdown`] - Coordinated graceful shutdown shared by `main` and the
//!   streaming handlers.
//! - [`store`] - The persistence contract for blog records and its in-memory
//!   reference implementation.
//! - [`telemetry`] - Log subscriber initialization.

pub mod config;
pub mod context;
pub mod service;
pub mod shutdown;
pub mod store;
pub mod telemetry;
