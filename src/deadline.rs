//! Deadlines and cancellation for operations that read the raw source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{InboxError, Result};

/// An optional point in time plus an optional shared cancel flag.
///
/// Checked between messages, never in the middle of a read: a blocked read
/// is only noticed once it returns.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Deadline {
    /// No time limit and no cancellation.
    pub fn none() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn at(instant: Instant) -> Self {
        Self {
            expires: Some(instant),
            cancel: None,
        }
    }

    /// Also stop as soon as `flag` becomes `true`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Fail with [`InboxError::Cancelled`] or [`InboxError::DeadlineExceeded`]
    /// if the operation should stop now.
    pub fn check(&self) -> Result<()> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(InboxError::Cancelled);
        }
        match self.expires {
            Some(at) if Instant::now() >= at => Err(InboxError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
