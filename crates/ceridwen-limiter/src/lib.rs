//! Admission controller for expensive operations.
//!
//! A sliding-window request counter keyed by hashed caller identity and
//! logical endpoint. All state lives in the store, so limits hold across
//! process restarts and multiple workers. The controller never returns an
//! error: callers always get a structured allow/deny decision, which makes
//! it safe to consult unconditionally before any gated operation.

pub mod config;
pub mod identity;

pub use config::{BucketClass, LimiterConfig, Quota};
pub use identity::{ActorKind, IdentitySource, hash_actor};

use chrono::Utc;
use tracing::{debug, warn};

use ceridwen_store::LimitStore;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { retry_after_secs: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Stateless-in-process gatekeeper over the persisted event log.
pub struct AdmissionController {
    store: LimitStore,
    config: LimiterConfig,
}

impl AdmissionController {
    pub fn new(store: LimitStore, config: LimiterConfig) -> Self {
        Self { store, config }
    }

    /// Check whether `source` may hit `endpoint` now. Recording the check
    /// consumes one unit of quota whether or not it is allowed.
    pub fn check(
        &self,
        source: &IdentitySource,
        endpoint: &str,
        bucket: BucketClass,
        explicit_quota: Option<Quota>,
    ) -> Decision {
        self.check_at(
            source,
            endpoint,
            bucket,
            explicit_quota,
            Utc::now().timestamp_millis(),
        )
    }

    /// `check` with an injectable clock, for tests.
    pub fn check_at(
        &self,
        source: &IdentitySource,
        endpoint: &str,
        bucket: BucketClass,
        explicit_quota: Option<Quota>,
        now_ms: i64,
    ) -> Decision {
        if !self.config.enabled {
            return Decision::Allowed;
        }

        let (kind, raw) = source.resolve();
        let actor_hash = hash_actor(&self.config.salt, &raw);
        let quota = self.config.effective_quota(endpoint, bucket, explicit_quota);
        let window_ms = quota.window.as_millis() as i64;

        let check = match self.store.check_window(
            endpoint,
            &actor_hash,
            kind.as_str(),
            quota.max_requests,
            window_ms,
            now_ms,
        ) {
            Ok(check) => check,
            Err(e) => {
                // The limiter must not take gated endpoints down with it
                warn!(endpoint, error = %e, "Rate-limit store unavailable, allowing request");
                return Decision::Allowed;
            }
        };

        self.housekeep(now_ms);

        if check.blocked {
            let retry_after_secs = retry_after(check.oldest_in_window_ms, window_ms, now_ms);
            debug!(
                endpoint,
                actor_kind = kind.as_str(),
                count = check.count,
                max = quota.max_requests,
                retry_after_secs,
                "Admission denied"
            );
            Decision::Denied { retry_after_secs }
        } else {
            Decision::Allowed
        }
    }

    /// Best-effort retention prune, piggybacked on each check rather than
    /// scheduled.
    fn housekeep(&self, now_ms: i64) {
        let horizon = now_ms - i64::from(self.config.retention_days) * MS_PER_DAY;
        match self.store.prune_events(horizon) {
            Ok(0) => {}
            Ok(n) => debug!(pruned = n, "Pruned expired rate-limit events"),
            Err(e) => warn!(error = %e, "Rate-limit event prune failed"),
        }
    }
}

/// Seconds until the oldest in-window event leaves the window.
fn retry_after(oldest_ms: Option<i64>, window_ms: i64, now_ms: i64) -> u64 {
    match oldest_ms {
        Some(oldest) => {
            let remaining_ms = oldest + window_ms - now_ms;
            std::cmp::max(1, (remaining_ms + 999) / 1000) as u64
        }
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceridwen_store::Database;

    fn controller(config: LimiterConfig) -> AdmissionController {
        let store = LimitStore::new(Database::open_in_memory().unwrap());
        AdmissionController::new(store, config)
    }

    fn ip_source(ip: &str) -> IdentitySource {
        IdentitySource {
            forwarded_for: Some(ip.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_always_allows() {
        let ctrl = controller(LimiterConfig {
            enabled: false,
            ..Default::default()
        });
        let quota = Some(Quota::new(0, 60));
        for _ in 0..5 {
            let decision = ctrl.check(&ip_source("1.2.3.4"), "runs.create", BucketClass::Ai, quota);
            assert!(decision.is_allowed());
        }
    }

    #[test]
    fn test_sixty_per_minute_scenario() {
        let ctrl = controller(LimiterConfig::default());
        let quota = Some(Quota::new(60, 60));
        let start = 1_000_000i64;

        for i in 0..60 {
            let decision = ctrl.check_at(
                &ip_source("1.2.3.4"),
                "runs.create",
                BucketClass::Ai,
                quota,
                start + i,
            );
            assert!(decision.is_allowed(), "request {i} should pass");
        }

        match ctrl.check_at(
            &ip_source("1.2.3.4"),
            "runs.create",
            BucketClass::Ai,
            quota,
            start + 60,
        ) {
            Decision::Denied { retry_after_secs } => {
                assert!((1..=60).contains(&retry_after_secs));
            }
            Decision::Allowed => panic!("61st request should be denied"),
        }
    }

    #[test]
    fn test_allows_again_after_window() {
        let ctrl = controller(LimiterConfig::default());
        let quota = Some(Quota::new(2, 60));
        let start = 1_000_000i64;

        ctrl.check_at(&ip_source("5.5.5.5"), "runs.create", BucketClass::Ai, quota, start);
        ctrl.check_at(&ip_source("5.5.5.5"), "runs.create", BucketClass::Ai, quota, start + 1);
        let denied = ctrl.check_at(
            &ip_source("5.5.5.5"),
            "runs.create",
            BucketClass::Ai,
            quota,
            start + 2,
        );
        assert!(!denied.is_allowed());

        let later = start + 61_000;
        let allowed = ctrl.check_at(
            &ip_source("5.5.5.5"),
            "runs.create",
            BucketClass::Ai,
            quota,
            later,
        );
        assert!(allowed.is_allowed());
    }

    #[test]
    fn test_actors_isolated_by_hash() {
        let ctrl = controller(LimiterConfig::default());
        let quota = Some(Quota::new(1, 60));
        let now = 1_000_000i64;

        ctrl.check_at(&ip_source("1.1.1.1"), "runs.create", BucketClass::Ai, quota, now);
        let other = ctrl.check_at(
            &ip_source("2.2.2.2"),
            "runs.create",
            BucketClass::Ai,
            quota,
            now + 1,
        );
        assert!(other.is_allowed());

        let api_key = ctrl.check_at(
            &IdentitySource {
                api_key: Some("key-7".to_string()),
                forwarded_for: Some("1.1.1.1".to_string()),
                ..Default::default()
            },
            "runs.create",
            BucketClass::Ai,
            quota,
            now + 2,
        );
        assert!(api_key.is_allowed(), "api key identity is distinct from its IP");
    }

    #[test]
    fn test_retry_after_bounds() {
        assert_eq!(retry_after(None, 60_000, 0), 1);
        // Oldest event just entered the window
        assert_eq!(retry_after(Some(1_000), 60_000, 1_001), 60);
        // Oldest event about to leave the window
        assert_eq!(retry_after(Some(1_000), 60_000, 60_900), 1);
        // Never below one second
        assert_eq!(retry_after(Some(1_000), 60_000, 61_500), 1);
    }

    #[test]
    fn test_bucket_default_applies() {
        // Heavy bucket hard default is 5 per 300s
        let ctrl = controller(LimiterConfig::default());
        let now = 1_000_000i64;
        for i in 0..5 {
            let d = ctrl.check_at(&ip_source("8.8.8.8"), "render.pdf", BucketClass::Heavy, None, now + i);
            assert!(d.is_allowed());
        }
        let d = ctrl.check_at(&ip_source("8.8.8.8"), "render.pdf", BucketClass::Heavy, None, now + 5);
        assert!(!d.is_allowed());
    }
}
