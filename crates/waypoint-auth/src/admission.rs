//! Admission control for the identity bridge.
//!
//! Every login-class operation passes through a fixed-window counter
//! keyed by `(caller, endpoint)` before any credential work happens. The
//! check is synchronous and decided entirely from local state, so a flood
//! of bad credentials is refused without touching a provider or the
//! identity store. Token verification is not admitted here: it is pure
//! local computation and sits on the hot path of every protected call.
//!
//! # Example
//!
//! ```ignore
//! let admission = AdmissionController::new(&config.admission, clock);
//! match admission.admit("203.0.113.7", Endpoint::Login) {
//!     AdmissionDecision::Allowed => { /* proceed */ }
//!     AdmissionDecision::RateLimited { retry_after } => {
//!         return Err(AuthError::rate_limited(retry_after));
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;

use crate::clock::Clock;
use crate::config::AdmissionConfig;

/// The login-class operations admission control distinguishes.
///
/// Each endpoint gets its own counter, so a caller burning through login
/// attempts does not lock themselves out of linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Anonymous,
    Link,
}

impl Endpoint {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Login => "login",
            Endpoint::Anonymous => "anonymous",
            Endpoint::Link => "link",
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The call may proceed.
    Allowed,

    /// The window is full; the caller should wait before retrying.
    RateLimited {
        /// Time until the current window ends. Never exceeds the
        /// configured window length.
        retry_after: Duration,
    },
}

#[derive(Debug)]
struct WindowBucket {
    window_start: OffsetDateTime,
    count: u32,
}

/// Fixed-window admission controller.
///
/// Buckets are created lazily on first sight of a `(caller, endpoint)`
/// pair and dropped again by [`prune_expired`](Self::prune_expired) once
/// their window has passed.
pub struct AdmissionController {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<(String, Endpoint), WindowBucket>>,
}

impl AdmissionController {
    /// Creates a controller from validated configuration.
    #[must_use]
    pub fn new(config: &AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit: config.login_limit,
            window: config.window,
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one attempt for `(caller, endpoint)` and decides admission.
    ///
    /// The attempt is counted before the decision, so a refused call still
    /// consumed its slot. A bucket whose window has passed is reset rather
    /// than carried over.
    pub fn admit(&self, caller: &str, endpoint: Endpoint) -> AdmissionDecision {
        let now = self.clock.now();
        let mut buckets = lock_or_recover(&self.buckets);

        let bucket = buckets
            .entry((caller.to_string(), endpoint))
            .or_insert(WindowBucket {
                window_start: now,
                count: 0,
            });

        if now - bucket.window_start >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        bucket.count = bucket.count.saturating_add(1);
        if bucket.count <= self.limit {
            return AdmissionDecision::Allowed;
        }

        let elapsed = now - bucket.window_start;
        let retry_after = Duration::try_from(elapsed)
            .ok()
            .and_then(|elapsed| self.window.checked_sub(elapsed))
            .unwrap_or(self.window);

        tracing::debug!(
            caller,
            endpoint = endpoint.as_str(),
            retry_after_secs = retry_after.as_secs(),
            "admission refused"
        );

        AdmissionDecision::RateLimited { retry_after }
    }

    /// Drops every bucket whose window has fully passed.
    ///
    /// Called periodically by the server so idle callers do not pin memory.
    /// Returns the number of buckets removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let mut buckets = lock_or_recover(&self.buckets);
        let before = buckets.len();
        buckets.retain(|_, bucket| now - bucket.window_start < self.window);
        before - buckets.len()
    }

    /// Number of live buckets, for observability.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        lock_or_recover(&self.buckets).len()
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use time::macros::datetime;

    fn test_controller(limit: u32, window_secs: u64) -> (AdmissionController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-06-01 10:00:00 UTC)));
        let config = AdmissionConfig {
            login_limit: limit,
            window: Duration::from_secs(window_secs),
        };
        (AdmissionController::new(&config, clock.clone()), clock)
    }

    #[test]
    fn test_allows_up_to_limit() {
        let (controller, _clock) = test_controller(5, 60);
        for _ in 0..5 {
            assert_eq!(
                controller.admit("1.2.3.4", Endpoint::Login),
                AdmissionDecision::Allowed
            );
        }
        assert!(matches!(
            controller.admit("1.2.3.4", Endpoint::Login),
            AdmissionDecision::RateLimited { .. }
        ));
    }

    #[test]
    fn test_retry_after_bounded_by_window() {
        let (controller, clock) = test_controller(1, 60);
        assert_eq!(
            controller.admit("1.2.3.4", Endpoint::Login),
            AdmissionDecision::Allowed
        );

        clock.advance(Duration::from_secs(20));
        match controller.admit("1.2.3.4", Endpoint::Login) {
            AdmissionDecision::RateLimited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(40));
                assert!(retry_after <= Duration::from_secs(60));
            }
            AdmissionDecision::Allowed => panic!("expected refusal"),
        }
    }

    #[test]
    fn test_window_reset_admits_again() {
        let (controller, clock) = test_controller(2, 60);
        controller.admit("1.2.3.4", Endpoint::Login);
        controller.admit("1.2.3.4", Endpoint::Login);
        assert!(matches!(
            controller.admit("1.2.3.4", Endpoint::Login),
            AdmissionDecision::RateLimited { .. }
        ));

        clock.advance(Duration::from_secs(60));
        assert_eq!(
            controller.admit("1.2.3.4", Endpoint::Login),
            AdmissionDecision::Allowed
        );
    }

    #[test]
    fn test_callers_and_endpoints_are_independent() {
        let (controller, _clock) = test_controller(1, 60);
        assert_eq!(
            controller.admit("1.2.3.4", Endpoint::Login),
            AdmissionDecision::Allowed
        );
        assert!(matches!(
            controller.admit("1.2.3.4", Endpoint::Login),
            AdmissionDecision::RateLimited { .. }
        ));

        // Same caller, different endpoint.
        assert_eq!(
            controller.admit("1.2.3.4", Endpoint::Link),
            AdmissionDecision::Allowed
        );
        // Different caller, same endpoint.
        assert_eq!(
            controller.admit("5.6.7.8", Endpoint::Login),
            AdmissionDecision::Allowed
        );
    }

    #[test]
    fn test_prune_drops_only_expired_buckets() {
        let (controller, clock) = test_controller(5, 60);
        controller.admit("1.2.3.4", Endpoint::Login);
        clock.advance(Duration::from_secs(40));
        controller.admit("5.6.7.8", Endpoint::Login);
        assert_eq!(controller.bucket_count(), 2);

        clock.advance(Duration::from_secs(25));
        assert_eq!(controller.prune_expired(), 1);
        assert_eq!(controller.bucket_count(), 1);
    }
}
