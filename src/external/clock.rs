use chrono::Utc;

/// Source of "current time" for expiry comparisons.
///
/// Injected rather than read globally so entitlement checks are
/// deterministic under test.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_ts(&self) -> i64;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ts(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock pinned to a fixed instant.
#[derive(Debug, Clone)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ts(&self) -> i64 {
        self.0
    }
}
