//! Single-permit concurrency gate.
//!
//! The backend Lambda function runs with a reserved concurrency of one, so
//! admission control lives at the proxy edge: every request must hold the
//! gate's only permit for the full duration of its invocation. Requests
//! beyond the first in-flight one wait at [`ConcurrencyGate::acquire`] until
//! the permit is returned.

use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};

/// Error returned by [`ConcurrencyGate::acquire`] once the gate is closed.
///
/// Callers receiving this must abandon the request without writing a
/// response; the process is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("concurrency gate is closed")]
pub struct GateClosed;

/// Gate serializing access to the backend function.
///
/// Wraps a semaphore pre-loaded with exactly one permit. The permit is
/// returned when the [`GatePermit`] drops, which happens on every exit path
/// of the holder, including panic unwind, so a failed request can never
/// lock the gate permanently.
#[derive(Debug)]
pub struct ConcurrencyGate {
    permits: Semaphore,
}

impl ConcurrencyGate {
    /// Create a gate admitting one request at a time.
    pub fn single() -> Self {
        Self {
            permits: Semaphore::new(1),
        }
    }

    /// Wait for the permit.
    ///
    /// There is no timeout: a hung backend call blocks every waiter behind
    /// it. The backend's own concurrency limit is assumed to bound
    /// worst-case latency.
    pub async fn acquire(&self) -> Result<GatePermit<'_>, GateClosed> {
        let permit = self.permits.acquire().await.map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take the permit only if it is free right now.
    pub fn try_acquire(&self) -> Result<GatePermit<'_>, TryAcquireError> {
        let permit = self.permits.try_acquire()?;
        Ok(GatePermit { _permit: permit })
    }

    /// Close the gate for shutdown.
    ///
    /// Every waiter blocked in [`acquire`](Self::acquire) wakes with
    /// [`GateClosed`] instead of a permit.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// Proof that the holder is the only in-flight request.
///
/// Releases the gate on drop.
#[derive(Debug)]
pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
}
