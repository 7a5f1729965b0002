//! # Compensations
//!
//! Undo log for multi-step operations whose steps are separate writes.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  step 1 ok ──► record(undo 1)                                          │
//! │  step 2 ok ──► record(undo 2)                                          │
//! │  step 3 ERR ─► compensate(): undo 2, undo 1   (reverse order)          │
//! │                  each undo retried up to `attempts` times              │
//! │                  failures logged and returned, never thrown            │
//! │                                                                         │
//! │  all ok ─────► commit(): undo log dropped                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Undo closures are `Fn`, not `FnOnce`, so a failed attempt can be re-run.
//! They should be idempotent (ledger credits carry a movement key).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{EngineError, EngineResult};

pub(crate) type UndoFuture = Pin<Box<dyn Future<Output = EngineResult<()>> + Send>>;
type UndoFn = Box<dyn Fn() -> UndoFuture + Send + Sync>;

/// Pause before the n-th retry of an undo step.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// An undo step that still failed after every attempt.
#[derive(Debug)]
pub struct FailedUndo {
    pub step: String,
    pub error: EngineError,
}

impl FailedUndo {
    pub fn into_error(self) -> EngineError {
        EngineError::CompensationFailure {
            step: self.step,
            reason: self.error.to_string(),
        }
    }
}

pub struct Compensations {
    operation: &'static str,
    attempts: u32,
    steps: Vec<(String, UndoFn)>,
}

impl Compensations {
    pub fn new(operation: &'static str, attempts: u32) -> Self {
        Compensations {
            operation,
            attempts: attempts.max(1),
            steps: Vec::new(),
        }
    }

    /// Registers how to undo a step that has just been applied.
    pub fn record<F, Fut>(&mut self, step: impl Into<String>, undo: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<()>> + Send + 'static,
    {
        let step = step.into();
        debug!(operation = self.operation, step = %step, "Recorded compensation");
        self.steps.push((step, Box::new(move || -> UndoFuture { Box::pin(undo()) })));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every recorded undo in reverse order.
    ///
    /// A step that keeps failing does not stop the steps before it.
    pub async fn compensate(self) -> Vec<FailedUndo> {
        let mut failures = Vec::new();
        if self.steps.is_empty() {
            return failures;
        }

        warn!(
            operation = self.operation,
            steps = self.steps.len(),
            "Compensating applied steps"
        );

        for (step, undo) in self.steps.into_iter().rev() {
            let mut attempt = 1;
            loop {
                match undo().await {
                    Ok(()) => {
                        debug!(operation = self.operation, step = %step, attempt, "Compensated");
                        break;
                    }
                    Err(e) if attempt < self.attempts => {
                        warn!(
                            operation = self.operation,
                            step = %step,
                            attempt,
                            error = %e,
                            "Compensation attempt failed, retrying"
                        );
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                        attempt += 1;
                    }
                    Err(e) => {
                        error!(
                            operation = self.operation,
                            step = %step,
                            attempts = attempt,
                            error = %e,
                            "Compensation failed"
                        );
                        failures.push(FailedUndo { step, error: e });
                        break;
                    }
                }
            }
        }

        failures
    }

    /// Drops the undo log once the operation has fully succeeded.
    pub fn commit(self) {
        debug!(operation = self.operation, steps = self.steps.len(), "Committed");
    }
}

impl std::fmt::Debug for Compensations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compensations")
            .field("operation", &self.operation)
            .field("attempts", &self.attempts)
            .field("steps", &self.steps.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_undo_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut comp = Compensations::new("test", 1);
        for i in 0..3 {
            let log = log.clone();
            comp.record(format!("step {}", i), move || {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(i);
                    Ok(())
                }
            });
        }
        assert_eq!(comp.len(), 3);

        let failures = comp.compensate().await;
        assert!(failures.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn test_failing_step_is_retried_then_reported() {
        let calls = Arc::new(AtomicU32::new(0));
        let after = Arc::new(AtomicU32::new(0));
        let mut comp = Compensations::new("test", 3);

        let a = after.clone();
        comp.record("first", move || {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let c = calls.clone();
        comp.record("second", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(EngineError::Config("store offline".into()))
            }
        });

        let failures = comp.compensate().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // earlier steps still run after a failure
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step, "second");

        let err = failures.into_iter().next().unwrap().into_error();
        assert!(matches!(err, EngineError::CompensationFailure { .. }));
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut comp = Compensations::new("test", 3);
        let c = calls.clone();
        comp.record("flaky", move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(EngineError::Config("busy".into()))
                } else {
                    Ok(())
                }
            }
        });

        assert!(comp.compensate().await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_commit_runs_nothing() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut comp = Compensations::new("test", 1);
        let c = calls.clone();
        comp.record("never", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        comp.commit();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
