use crate::{CalcError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag shared between the caller and a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation state for one run
///
/// Checked before every network call and between traversal nodes.
#[derive(Debug, Clone)]
pub struct RunControl {
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl RunControl {
    pub fn new(timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            cancel,
        }
    }

    /// No deadline, no external cancellation
    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.cancel.is_canceled() {
            return Err(CalcError::Canceled);
        }
        if let Some(at) = self.deadline {
            if Instant::now() >= at {
                return Err(CalcError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Time left until the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}
