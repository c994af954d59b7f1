use crate::presentation::middleware::error::AppError;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default cooldown window after a trip.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Messages that identify a backend "too many requests" failure.
///
/// Matching is case-insensitive. JSON-parse failure text (for example
/// `Unexpected token`) is deliberately NOT in this set; treating it as a
/// rate-limit signal would misclassify malformed responses.
const RATE_LIMIT_MARKERS: [&str; 3] = ["429", "too many requests", "rate limit"];

/// Whether a failure message matches a known rate-limit signature.
pub fn is_rate_limit_signature(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

type CooldownCallback = Box<dyn FnOnce() + Send>;

struct GuardState {
    tripped: bool,
    reset_at: Instant,
    callbacks: Vec<CooldownCallback>,
}

/// Cooperative circuit breaker around backend calls.
///
/// Two states: Open (calls pass through) and Tripped (calls short-circuit to
/// their fallback). A detected rate-limit failure trips the guard for one
/// cooldown window; the transition back to Open happens lazily on the first
/// check at or after `reset_at`, never on a timer. Shared across requests by
/// cloning; all state sits behind one mutex so concurrent trips within a
/// window collapse into one.
#[derive(Clone)]
pub struct RateLimitGuard {
    state: Arc<Mutex<GuardState>>,
    cooldown: Duration,
}

impl Default for RateLimitGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitGuard {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN)
    }

    /// Create a guard with a custom cooldown window. Tests use millisecond
    /// windows to exercise expiry without waiting.
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState {
                tripped: false,
                reset_at: Instant::now(),
                callbacks: Vec::new(),
            })),
            cooldown,
        }
    }

    /// Whether calls are currently short-circuited.
    ///
    /// The first call that observes an expired window clears the tripped
    /// flag and fires every queued cooldown callback exactly once, in
    /// registration order.
    pub fn check_limited(&self) -> bool {
        let (limited, drained) = {
            let mut state = self.state.lock().expect("rate limit guard lock poisoned");
            let drained = Self::clear_if_expired(&mut state);
            (state.tripped, drained)
        };

        if !drained.is_empty() {
            debug!(callbacks = drained.len(), "rate limit cooldown ended");
        }
        for callback in drained {
            callback();
        }

        limited
    }

    /// Enter the Tripped state for one cooldown window.
    ///
    /// Idempotent while already tripped: repeated trips never extend the
    /// window past the first trip's `reset_at`. An expired window counts as
    /// Open, so a trip arriving after expiry but before any check starts a
    /// fresh window; the old window's callbacks fire first.
    pub fn trip(&self) {
        let drained = {
            let mut state = self.state.lock().expect("rate limit guard lock poisoned");
            let drained = Self::clear_if_expired(&mut state);
            if !state.tripped {
                state.tripped = true;
                state.reset_at = Instant::now() + self.cooldown;
                warn!(cooldown_secs = self.cooldown.as_secs_f64(), "rate limit guard tripped");
            }
            drained
        };

        for callback in drained {
            callback();
        }
    }

    /// Run `callback` when the current cooldown ends, or immediately if the
    /// guard is open. Each callback fires exactly once.
    pub fn on_cooldown_end(&self, callback: impl FnOnce() + Send + 'static) {
        let (run_now, drained) = {
            let mut state = self.state.lock().expect("rate limit guard lock poisoned");
            let drained = Self::clear_if_expired(&mut state);
            if state.tripped {
                state.callbacks.push(Box::new(callback));
                (None, drained)
            } else {
                (Some(callback), drained)
            }
        };

        for queued in drained {
            queued();
        }
        if let Some(callback) = run_now {
            callback();
        }
    }

    /// Run a backend operation under the guard.
    ///
    /// While tripped, returns `fallback` without invoking the operation, or
    /// a rate-limit error when no fallback is given. Otherwise the operation
    /// runs once; a failure matching a rate-limit signature trips the guard
    /// and yields the fallback (re-raising the original error when there is
    /// none). Any other failure propagates unchanged.
    pub async fn run_guarded<T, F, Fut>(
        &self,
        operation: F,
        fallback: Option<T>,
    ) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if self.check_limited() {
            return fallback.ok_or_else(|| AppError::RateLimited {
                message: "Backend requests are cooling down".to_string(),
            });
        }

        match operation().await {
            Ok(value) => Ok(value),
            Err(error) if is_rate_limit_signature(&error.to_string()) => {
                self.trip();
                match fallback {
                    Some(value) => Ok(value),
                    None => Err(error),
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Drop out of the Tripped state once the window has elapsed, handing
    /// back the callbacks to invoke after the lock is released.
    fn clear_if_expired(state: &mut GuardState) -> Vec<CooldownCallback> {
        if state.tripped && Instant::now() >= state.reset_at {
            state.tripped = false;
            return std::mem::take(&mut state.callbacks);
        }
        Vec::new()
    }
}
