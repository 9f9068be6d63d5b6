// src/enumeration/control.rs

use crate::error::{EnumError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Caller-side stop switch shared by all workers of one run.
///
/// Checked between labeling visits; a stopped run returns
/// [`EnumError::Cancelled`].
#[derive(Debug, Default)]
pub struct EnumerationControl {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl EnumerationControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_limit(limit: Duration) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            deadline: Instant::now().checked_add(limit),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.deadline_passed()
    }

    pub fn check(&self) -> Result<()> {
        if self.should_stop() {
            Err(EnumError::Cancelled)
        } else {
            Ok(())
        }
    }
}
