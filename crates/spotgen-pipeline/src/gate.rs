//! Concurrent job admission gate.
//!
//! A fixed pool of permits bounds how many pipeline runs execute at
//! once. Jobs past the bound wait in FIFO order rather than being
//! rejected; the permit releases on every exit path because it rides
//! on the task's stack.

use std::sync::Arc;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Admission permit for one pipeline run. Dropping it releases the
/// slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Bounds concurrent pipeline runs to a fixed limit.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for an admission slot, observing cancellation while queued.
    pub async fn acquire(&self, cancel_rx: &mut watch::Receiver<bool>) -> PipelineResult<GatePermit> {
        if *cancel_rx.borrow() {
            return Err(PipelineError::Canceled);
        }

        tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => {
                // acquire_owned only fails if the semaphore is closed,
                // which never happens while the gate is alive.
                let permit = permit.map_err(|_| PipelineError::Canceled)?;
                debug!(available = self.semaphore.available_permits(), "Admission granted");
                Ok(GatePermit { _permit: permit })
            }
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    return Err(PipelineError::Canceled);
                }
                Err(PipelineError::Canceled)
            }
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_gate_bounds_concurrency() {
        let gate = ConcurrencyGate::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let (_tx, mut rx) = watch::channel(false);
                let _permit = gate.acquire(&mut rx).await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn test_gate_releases_on_drop() {
        let gate = ConcurrencyGate::new(1);
        let (_tx, mut rx) = watch::channel(false);

        {
            let _permit = gate.acquire(&mut rx).await.unwrap();
            assert_eq!(gate.available(), 0);
        }
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_queued_acquire_observes_cancel() {
        let gate = ConcurrencyGate::new(1);
        let (tx0, mut rx0) = watch::channel(false);
        let held = gate.acquire(&mut rx0).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let gate2 = gate.clone();
        let handle = tokio::spawn(async move {
            let mut rx = rx;
            gate2.acquire(&mut rx).await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        tx.send(true).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_canceled());

        drop(held);
        drop(tx0);
    }
}
