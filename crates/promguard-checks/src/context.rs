use promguard_promapi::PromError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Shared state for one check run: the wall-clock instant probes evaluate
/// against, a cancellation flag and an optional global deadline.
///
/// Clones share the flag, so cancelling any clone cancels the run. A
/// cancelled probe produces no problem, unlike a failed one.
#[derive(Clone, Debug)]
pub struct CheckContext {
    now: OffsetDateTime,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CheckContext {
    pub fn new() -> Self {
        Self {
            now: OffsetDateTime::now_utc(),
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, ttl: Duration) -> Self {
        self.deadline = Some(Instant::now() + ttl);
        self
    }

    /// The reference time every probe in this run uses. Fixing it once
    /// keeps range windows (and the query cache keys) identical across
    /// selectors.
    pub fn now(&self) -> OffsetDateTime {
        self.now
    }

    pub fn now_epoch(&self) -> i64 {
        self.now.unix_timestamp()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Error out of a probe when the run was cancelled.
    pub fn checkpoint(&self) -> Result<(), PromError> {
        if self.is_cancelled() {
            Err(PromError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CheckContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_propagates_to_clones() {
        let ctx = CheckContext::new();
        let clone = ctx.clone();
        assert!(ctx.checkpoint().is_ok());
        clone.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.checkpoint(), Err(PromError::Cancelled));
    }

    #[test]
    fn expired_deadline_cancels() {
        let ctx = CheckContext::new().with_deadline(Duration::ZERO);
        assert!(ctx.is_cancelled());
    }
}
