//! Limiter configuration and quota resolution.
//!
//! Limits resolve by precedence: explicit per-call override, then an
//! endpoint-specific configured override, then a bucket-class override,
//! then the global default, then the bucket's hard-coded default.

use std::collections::HashMap;
use std::time::Duration;

/// Maximum requests allowed within a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

impl Quota {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Coarse traffic class applied when no endpoint override is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketClass {
    Default,
    /// LLM-backed endpoints (expensive, tightly limited).
    Ai,
    /// Cheap read endpoints safe to poll.
    Public,
    /// Endpoints that fan out to slow external services.
    Heavy,
}

impl BucketClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketClass::Default => "default",
            BucketClass::Ai => "ai",
            BucketClass::Public => "public",
            BucketClass::Heavy => "heavy",
        }
    }

    /// Hard-coded fallback quota for this class.
    pub fn default_quota(&self) -> Quota {
        match self {
            BucketClass::Default => Quota::new(60, 60),
            BucketClass::Ai => Quota::new(20, 60),
            BucketClass::Public => Quota::new(120, 60),
            BucketClass::Heavy => Quota::new(5, 300),
        }
    }
}

/// Default retention horizon for raw events.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Environment-derived limiter configuration.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Global kill switch; when false every check allows.
    pub enabled: bool,
    /// Global default quota, below bucket overrides.
    pub global: Option<Quota>,
    /// Per-bucket-class overrides.
    pub buckets: HashMap<BucketClass, Quota>,
    /// Per-endpoint overrides (highest configured precedence).
    pub endpoints: HashMap<String, Quota>,
    /// Raw events older than this are pruned.
    pub retention_days: u32,
    /// Server-side secret mixed into actor hashes.
    pub salt: String,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global: None,
            buckets: HashMap::new(),
            endpoints: HashMap::new(),
            retention_days: DEFAULT_RETENTION_DAYS,
            salt: "ceridwen-dev-salt".to_string(),
        }
    }
}

impl LimiterConfig {
    /// Build configuration from `CERIDWEN_RATELIMIT_*` environment
    /// variables. Unset or malformed values fall through to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("CERIDWEN_RATELIMIT_ENABLED") {
            config.enabled = !matches!(v.trim(), "0" | "false" | "off");
        }
        if let Some(quota) = quota_from_env("CERIDWEN_RATELIMIT_MAX", "CERIDWEN_RATELIMIT_WINDOW_SECS")
        {
            config.global = Some(quota);
        }
        for (bucket, prefix) in [
            (BucketClass::Default, "DEFAULT"),
            (BucketClass::Ai, "AI"),
            (BucketClass::Public, "PUBLIC"),
            (BucketClass::Heavy, "HEAVY"),
        ] {
            let max_var = format!("CERIDWEN_RATELIMIT_{prefix}_MAX");
            let window_var = format!("CERIDWEN_RATELIMIT_{prefix}_WINDOW_SECS");
            if let Some(quota) = quota_from_env(&max_var, &window_var) {
                config.buckets.insert(bucket, quota);
            }
        }
        if let Ok(v) = std::env::var("CERIDWEN_RATELIMIT_ENDPOINTS") {
            config.endpoints = parse_endpoint_overrides(&v);
        }
        if let Ok(v) = std::env::var("CERIDWEN_RATELIMIT_RETENTION_DAYS") {
            if let Ok(days) = v.trim().parse() {
                config.retention_days = days;
            }
        }
        if let Ok(v) = std::env::var("CERIDWEN_RATELIMIT_SALT") {
            if !v.trim().is_empty() {
                config.salt = v;
            }
        }

        config
    }

    /// Resolve the effective quota for one check.
    pub fn effective_quota(
        &self,
        endpoint: &str,
        bucket: BucketClass,
        explicit: Option<Quota>,
    ) -> Quota {
        explicit
            .or_else(|| self.endpoints.get(endpoint).copied())
            .or_else(|| self.buckets.get(&bucket).copied())
            .or(self.global)
            .unwrap_or_else(|| bucket.default_quota())
    }
}

fn quota_from_env(max_var: &str, window_var: &str) -> Option<Quota> {
    let max: u32 = std::env::var(max_var).ok()?.trim().parse().ok()?;
    let window_secs: u64 = std::env::var(window_var).ok()?.trim().parse().ok()?;
    Some(Quota::new(max, window_secs))
}

/// Parse `endpoint=max:window_secs` pairs separated by commas, e.g.
/// `runs.create=10:60,runs.poll=240:60`. Malformed entries are skipped.
fn parse_endpoint_overrides(raw: &str) -> HashMap<String, Quota> {
    let mut out = HashMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((endpoint, quota)) = entry.split_once('=') else {
            continue;
        };
        let Some((max, window)) = quota.split_once(':') else {
            continue;
        };
        if let (Ok(max), Ok(window_secs)) = (max.trim().parse(), window.trim().parse()) {
            out.insert(endpoint.trim().to_string(), Quota::new(max, window_secs));
        }
    }
    out
}
