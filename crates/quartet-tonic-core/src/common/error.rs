//! Error types for the quartet services.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable and reportable failure in the system. It implements
//! `From<Error>` for `tonic::Status` so handlers classify a failure exactly
//! once and the transport layer carries the right status code to the client.
//!
//! ## Error Cases
//! - `InvalidRequest`: The client request was malformed (bad identifier,
//!   negative square-root input, empty aggregate).
//! - `NotFound`: No record exists for the requested identifier.
//! - `DeadlineExceeded`: The caller's time budget elapsed before completion.
//! - `RequestCancelled`: The client aborted the request mid-flight.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `Storage`: The persistence adapter failed.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the quartet services.
///
/// Clients distinguish failure kinds by gRPC status code, never by parsing
/// message text; the message is human-readable context only.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No record exists for the requested identifier.
    #[error("Not found: {reason}")]
    NotFound { reason: String },

    /// The caller's deadline elapsed (or the caller cancelled) before the
    /// handler finished its work.
    #[error("Deadline exceeded before the call completed")]
    DeadlineExceeded,

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The persistence adapter failed in a way the taxonomy cannot classify
    /// more precisely.
    #[error("Storage error: {context}")]
    Storage { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::NotFound { reason } => Status::not_found(reason),
            Error::DeadlineExceeded => {
                Status::deadline_exceeded("Deadline exceeded before the call completed")
            }
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::Storage { context } => Status::internal(format!("Storage error: {context}")),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
