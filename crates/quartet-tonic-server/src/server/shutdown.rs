//! Coordinated graceful shutdown.
//!
//! One [`Shutdown`] handle is shared between `main` and every service. The
//! sequence mirrors the listener's lifecycle:
//!
//! 1. `begin` - new streaming work is refused with `ServiceShutdown`.
//! 2. `drain` - in-flight streams get a bounded window to finish.
//! 3. cancel - whatever remains observes the token and terminates.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Shared handle that streaming handlers use to observe shutdown and that
/// `main` uses to drain them gracefully.
#[derive(Clone, Debug)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    shutting_down: AtomicBool,
    streams_inflight: AtomicUsize,
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                shutting_down: AtomicBool::new(false),
                streams_inflight: AtomicUsize::new(0),
                token: CancellationToken::new(),
            }),
        }
    }

    /// True once shutdown has begun; handlers refuse new streaming work.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Relaxed)
    }

    /// Registers one in-flight stream; the guard deregisters on drop, on
    /// every exit path.
    pub fn register_stream(&self) -> StreamGuard {
        self.inner.streams_inflight.fetch_add(1, Ordering::Relaxed);
        StreamGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn streams_inflight(&self) -> usize {
        self.inner.streams_inflight.load(Ordering::Relaxed)
    }

    /// Resolves once remaining work has been told to stop.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Winds the server down: refuses new work, waits (bounded) for in-flight
    /// streams to finish, then cancels whatever remains.
    pub async fn drain(&self, drain_timeout: Duration) {
        // === Phase 1: Stop accepting new streaming work ===
        tracing::info!("Refusing new streaming requests");
        self.inner.shutting_down.store(true, Ordering::Relaxed);

        // === Phase 2: Wait for in-flight streams to finish ===
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        let drained = timeout(drain_timeout, async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => {
                tracing::debug!("All in-flight streams drained successfully");
            }
            Err(_) => {
                tracing::warn!(
                    "Graceful drain timed out ({} streams still active)",
                    self.streams_inflight()
                );
            }
        }

        // === Phase 3: Cancel any remaining work ===
        self.inner.token.cancel();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StreamGuard {
    inner: Arc<Inner>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.inner.streams_inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_track_inflight_streams() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.streams_inflight(), 0);

        let a = shutdown.register_stream();
        let b = shutdown.register_stream();
        assert_eq!(shutdown.streams_inflight(), 2);

        drop(a);
        assert_eq!(shutdown.streams_inflight(), 1);
        drop(b);
        assert_eq!(shutdown.streams_inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_streams_then_returns() {
        let shutdown = Shutdown::new();
        let guard = shutdown.register_stream();

        let draining = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.drain(Duration::from_secs(3)).await })
        };

        // The stream finishes well within the drain window.
        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(guard);

        draining.await.unwrap();
        assert!(shutdown.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_cancels_stuck_streams_after_the_timeout() {
        let shutdown = Shutdown::new();
        let _stuck = shutdown.register_stream();

        shutdown.drain(Duration::from_secs(3)).await;

        // The stuck stream is now expected to observe cancellation.
        let cancelled = tokio::time::timeout(Duration::from_millis(10), shutdown.cancelled()).await;
        assert!(cancelled.is_ok());
    }
}
