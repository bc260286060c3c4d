//! Time source for issuance and validation.
//!
//! Every "now" used by the issuer and validator comes from a [`Clock`], so
//! tests can move time without sleeping.

use std::fmt;

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-utils"))]
mod manual {
    use super::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        now: AtomicI64,
    }

    impl ManualClock {
        #[must_use]
        pub fn new(start: i64) -> Self {
            Self {
                now: AtomicI64::new(start),
            }
        }

        pub fn set(&self, now: i64) {
            self.now.store(now, Ordering::SeqCst);
        }

        #[allow(clippy::cast_possible_wrap)]
        pub fn advance(&self, by: Duration) {
            self.now.fetch_add(by.as_secs() as i64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
    }
}
