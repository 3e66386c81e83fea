//! Circuit breaker guarding realtime cache-store reads.
//!
//! Explicit CLOSED → OPEN → HALF_OPEN state machine driven by a rolling
//! window of call outcomes. While OPEN, calls are rejected without touching
//! the network and the caller runs its fallback chain; after the cool-down
//! a bounded number of trial calls probe recovery.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use super::lock::mutex_lock;

const SOURCE: &str = "cache::breaker";
const METRIC_TRANSITIONS: &str = "vetrina_breaker_transition_total";

/// Breaker tuning knobs.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Number of recent call outcomes kept in the rolling window.
    pub window: usize,
    /// Failure fraction (0..=1) at which the breaker opens.
    pub failure_rate: f64,
    /// Minimum outcomes in the window before the rate is evaluated.
    pub min_calls: usize,
    /// How long the breaker stays open before probing recovery.
    pub cool_down: Duration,
    /// Trial calls allowed while half-open.
    pub half_open_trials: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: 20,
            failure_rate: 0.5,
            min_calls: 10,
            cool_down: Duration::from_secs(5),
            half_open_trials: 3,
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

enum Inner {
    Closed { outcomes: VecDeque<bool> },
    Open { until: Instant },
    HalfOpen { permits: usize, successes: usize },
}

/// Error surface of a breaker-wrapped call.
#[derive(Debug, Error)]
pub enum BreakerError<E: std::error::Error> {
    /// The breaker is open; the protected call was not attempted.
    #[error("circuit open; call rejected")]
    Open,
    #[error(transparent)]
    Inner(E),
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::Closed {
                outcomes: VecDeque::new(),
            }),
        }
    }

    /// Run `op` under the breaker. Rejected immediately with
    /// [`BreakerError::Open`] while the breaker is open and no trial permit
    /// is available; otherwise the outcome of `op` feeds the window.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(BreakerError::Open);
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Current nominal state. Does not consume a half-open permit.
    pub fn state(&self) -> BreakerState {
        match &*mutex_lock(&self.inner, SOURCE, "state") {
            Inner::Closed { .. } => BreakerState::Closed,
            Inner::Open { .. } => BreakerState::Open,
            Inner::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    fn try_acquire(&self) -> bool {
        let mut inner = mutex_lock(&self.inner, SOURCE, "try_acquire");
        match &mut *inner {
            Inner::Closed { .. } => true,
            Inner::Open { until } => {
                if Instant::now() < *until {
                    return false;
                }
                // Cool-down elapsed: move to half-open and hand out the
                // first trial permit.
                self.transition(BreakerState::HalfOpen);
                *inner = Inner::HalfOpen {
                    permits: self.config.half_open_trials.max(1) - 1,
                    successes: 0,
                };
                true
            }
            Inner::HalfOpen { permits, .. } => {
                if *permits == 0 {
                    return false;
                }
                *permits -= 1;
                true
            }
        }
    }

    fn record_success(&self) {
        let mut inner = mutex_lock(&self.inner, SOURCE, "record_success");
        match &mut *inner {
            Inner::Closed { outcomes } => {
                Self::push_outcome(outcomes, self.config.window, true);
            }
            Inner::HalfOpen { successes, .. } => {
                *successes += 1;
                if *successes >= self.config.half_open_trials.max(1) {
                    self.transition(BreakerState::Closed);
                    *inner = Inner::Closed {
                        outcomes: VecDeque::new(),
                    };
                }
            }
            Inner::Open { .. } => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = mutex_lock(&self.inner, SOURCE, "record_failure");
        let open = match &mut *inner {
            Inner::Closed { outcomes } => {
                Self::push_outcome(outcomes, self.config.window, false);
                if outcomes.len() >= self.config.min_calls.max(1) {
                    let failures = outcomes.iter().filter(|ok| !**ok).count();
                    let rate = failures as f64 / outcomes.len() as f64;
                    if rate >= self.config.failure_rate {
                        warn!(
                            failure_rate = rate,
                            cool_down_ms = self.config.cool_down.as_millis() as u64,
                            "circuit breaker opened"
                        );
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            // A failed trial call reopens immediately.
            Inner::HalfOpen { .. } => true,
            Inner::Open { .. } => false,
        };
        if open {
            self.transition(BreakerState::Open);
            *inner = Inner::Open {
                until: Instant::now() + self.config.cool_down,
            };
        }
    }

    fn transition(&self, to: BreakerState) {
        info!(state = to.as_str(), "circuit breaker transition");
        counter!(METRIC_TRANSITIONS, "to" => to.as_str()).increment(1);
    }

    fn push_outcome(outcomes: &mut VecDeque<bool>, window: usize, ok: bool) {
        outcomes.push_back(ok);
        while outcomes.len() > window.max(1) {
            outcomes.pop_front();
        }
    }
}
