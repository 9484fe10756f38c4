//! Per-session cap on dynamic query attempts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

struct Entry {
    attempts: u32,
    last_seen: Instant,
}

/// Counts dynamic query attempts per caller-supplied session id.
///
/// Requests without a session id are never capped. Sessions idle for longer
/// than `idle_timeout` are forgotten. A cap of 0 disables the limit.
pub struct SqlAttemptBudget {
    max_attempts: u32,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SqlAttemptBudget {
    pub fn new(max_attempts: u32, idle_timeout: Duration) -> Self {
        Self {
            max_attempts,
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Consume one attempt for `session`. Returns false when the session
    /// has used up its budget.
    pub fn try_acquire(&self, session: Option<&str>) -> bool {
        let Some(session) = session.filter(|s| !s.is_empty()) else {
            return true;
        };
        if self.max_attempts == 0 {
            return true;
        }

        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, e| now.duration_since(e.last_seen) < self.idle_timeout);

        let entry = sessions.entry(session.to_string()).or_insert(Entry {
            attempts: 0,
            last_seen: now,
        });
        entry.last_seen = now;
        if entry.attempts >= self.max_attempts {
            debug!(session, "Dynamic query budget exhausted");
            return false;
        }
        entry.attempts += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_per_session() {
        let budget = SqlAttemptBudget::new(2, Duration::from_secs(60));
        assert!(budget.try_acquire(Some("a")));
        assert!(budget.try_acquire(Some("a")));
        assert!(!budget.try_acquire(Some("a")));
        // Other sessions are independent.
        assert!(budget.try_acquire(Some("b")));
    }

    #[test]
    fn test_anonymous_requests_are_uncapped() {
        let budget = SqlAttemptBudget::new(1, Duration::from_secs(60));
        for _ in 0..5 {
            assert!(budget.try_acquire(None));
            assert!(budget.try_acquire(Some("")));
        }
        assert!(budget.sessions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_disables_cap() {
        let budget = SqlAttemptBudget::new(0, Duration::from_secs(60));
        for _ in 0..20 {
            assert!(budget.try_acquire(Some("a")));
        }
    }

    #[test]
    fn test_idle_sessions_expire() {
        let budget = SqlAttemptBudget::new(1, Duration::from_millis(10));
        assert!(budget.try_acquire(Some("a")));
        assert!(!budget.try_acquire(Some("a")));
        std::thread::sleep(Duration::from_millis(20));
        assert!(budget.try_acquire(Some("a")));
    }
}
