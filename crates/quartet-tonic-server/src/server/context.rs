//! Per-call deadline and cancellation supervision.
//!
//! gRPC callers attach a time budget to a call through the `grpc-timeout`
//! request header. [`CallContext`] turns that budget into a
//! [`CancellationToken`] flipped by a supervising timer task, so a handler
//! observes expiry at its own checkpoints instead of embedding a polling loop
//! around every piece of work. Explicit caller cancellation flips the same
//! token, and the abort path always classifies as deadline-exceeded.

use core::time::Duration;

use quartet_tonic_core::{Error, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Request;

/// Ambient state for one in-flight call: an optional absolute deadline and a
/// cancellation flag settable by either party.
///
/// Owned exclusively by the call for its duration. Dropping the context also
/// stops the supervising timer.
#[derive(Debug)]
pub struct CallContext {
    token: CancellationToken,
}

impl CallContext {
    /// Builds a context from the caller's `grpc-timeout` request metadata.
    ///
    /// Calls without a time budget get a context that never expires on its
    /// own; it can still be cancelled explicitly.
    pub fn from_request<T>(req: &Request<T>) -> Self {
        let timeout = req
            .metadata()
            .get("grpc-timeout")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout);
        Self::new(timeout)
    }

    /// Builds a context with an explicit time budget.
    pub fn new(timeout: Option<Duration>) -> Self {
        let token = CancellationToken::new();

        if let Some(timeout) = timeout {
            let deadline = Instant::now() + timeout;
            let timer = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => timer.cancel(),
                    // The call finished (or was cancelled) first.
                    () = timer.cancelled() => {}
                }
            });
        }

        Self { token }
    }

    /// Flags the call as cancelled by the caller.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Coarse-grained supervision point.
    ///
    /// Handlers call this between units of work; once the deadline has
    /// elapsed or the call was cancelled, the handler must abort with the
    /// returned error instead of completing normally.
    pub fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves when the deadline elapses or the call is cancelled.
    ///
    /// Suited to racing a suspension point with `tokio::select!`.
    pub async fn expired(&self) {
        self.token.cancelled().await;
    }
}

impl Drop for CallContext {
    fn drop(&mut self) {
        // Wakes the supervising timer so it does not outlive the call.
        self.cancel();
    }
}

/// Parses the gRPC wire format for timeouts: an integer of at most eight
/// digits followed by a unit (`H`, `M`, `S`, `m`, `u`, `n`).
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 3600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}
