//! Circuit breaker guarding every call to the generative service.
//!
//! Closed until `failure_threshold` consecutive failures, then Open for
//! `open_timeout`. The first state read after the timeout moves it to
//! HalfOpen, where exactly one trial call is let through.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ChatError;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected without reaching the service.
    Open,
    /// One trial call decides between Closed and Open.
    HalfOpen,
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Shared breaker. State is behind a std mutex that is never held across
/// an await point.
#[derive(Debug)]
pub struct Breaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    open_timeout: Duration,
}

impl Breaker {
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            failure_threshold: failure_threshold.max(1),
            open_timeout,
        }
    }

    /// Current state, moving Open to HalfOpen once the timeout has elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
        }
    }

    /// Reserve the right to make one call.
    ///
    /// Fails with [`ChatError::BreakerOpen`] when open, or when half-open
    /// and the trial call is already in flight.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, ChatError> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            BreakerState::Closed => Ok(CallPermit {
                breaker: self,
                trial: false,
            }),
            BreakerState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Ok(CallPermit {
                    breaker: self,
                    trial: true,
                })
            }
            _ => Err(ChatError::BreakerOpen),
        }
    }

    /// Run `fut` through the breaker and record its outcome.
    ///
    /// When the breaker rejects the call, `fut` is dropped without being
    /// polled. If the returned future is itself dropped before completion,
    /// nothing is recorded.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, ChatError>
    where
        F: Future<Output = Result<T, ChatError>>,
    {
        let permit = self.try_acquire()?;
        let outcome = fut.await;
        permit.record(&outcome);
        outcome
    }

    /// The dependency answered; any state goes back to Closed.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != BreakerState::Closed {
            info!("Breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        match inner.state {
            BreakerState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                warn!(
                    failures = inner.consecutive_failures,
                    "Breaker opened after consecutive failures"
                );
                Self::open(&mut inner);
            }
            BreakerState::HalfOpen => {
                warn!("Breaker trial call failed, reopening");
                Self::open(&mut inner);
            }
            _ => {}
        }
    }

    fn open(inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.trial_in_flight = false;
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open
            && inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.open_timeout)
        {
            info!("Breaker half-open, allowing one trial call");
            inner.state = BreakerState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release_trial(&self) {
        self.lock().trial_in_flight = false;
    }
}

impl Default for Breaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(60))
    }
}

/// Right to make one guarded call.
///
/// Dropping an unsettled trial permit frees the half-open slot without
/// recording an outcome.
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a Breaker,
    trial: bool,
}

impl CallPermit<'_> {
    /// Record the outcome of the call this permit guarded.
    pub fn record<T>(self, outcome: &Result<T, ChatError>) {
        match outcome {
            Err(e) if e.trips_breaker() => self.breaker.record_failure(),
            _ => self.breaker.record_success(),
        }
        // Outcome recorded; the slot is already settled.
        std::mem::forget(self);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.trial {
            self.breaker.release_trial();
        }
    }
}
