use chrono::{DateTime, Duration, Utc};

/// Abstraction over "current time" so expiry checks are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// True while `expires_at` is strictly in the future.
    fn is_before(&self, expires_at: DateTime<Utc>) -> bool {
        self.now() < expires_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// A clock pinned `offset` away from `self`.
    pub fn shifted(&self, offset: Duration) -> Self {
        Self {
            now: self.now + offset,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
