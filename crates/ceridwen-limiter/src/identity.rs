//! Caller identity resolution and hashing.
//!
//! An explicit API key wins; otherwise the best available network origin
//! identifier is used; otherwise all callers share the `unknown` sentinel.
//! The resolved identity is salted and hashed before it ever reaches the
//! store, so persisted rows cannot be reversed to a key or address.

use sha2::{Digest, Sha256};

/// How a caller was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    ApiKey,
    Ip,
    Unknown,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::ApiKey => "api-key",
            ActorKind::Ip => "ip",
            ActorKind::Unknown => "unknown",
        }
    }
}

/// Raw identity material collected at the transport boundary.
///
/// The server fills this from request headers and the connection; the
/// limiter itself has no HTTP knowledge.
#[derive(Debug, Clone, Default)]
pub struct IdentitySource {
    /// Explicit caller-supplied key (e.g. an API key header).
    pub api_key: Option<String>,
    /// `X-Forwarded-For` header value (first hop is used).
    pub forwarded_for: Option<String>,
    /// `X-Real-IP` header value.
    pub real_ip: Option<String>,
    /// CDN-specific origin header (e.g. `CF-Connecting-IP`).
    pub cf_connecting_ip: Option<String>,
    /// Direct connection address, when known.
    pub remote_addr: Option<String>,
}

impl IdentitySource {
    /// Resolve to (kind, raw identity) by precedence.
    pub fn resolve(&self) -> (ActorKind, String) {
        if let Some(key) = non_empty(self.api_key.as_deref()) {
            return (ActorKind::ApiKey, key);
        }
        if let Some(xff) = non_empty(self.forwarded_for.as_deref()) {
            // First hop is the original client
            if let Some(first) = xff.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
                return (ActorKind::Ip, first.to_string());
            }
        }
        if let Some(ip) = non_empty(self.real_ip.as_deref()) {
            return (ActorKind::Ip, ip);
        }
        if let Some(ip) = non_empty(self.cf_connecting_ip.as_deref()) {
            return (ActorKind::Ip, ip);
        }
        if let Some(addr) = non_empty(self.remote_addr.as_deref()) {
            return (ActorKind::Ip, addr);
        }
        (ActorKind::Unknown, "unknown".to_string())
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// Salted one-way hash of a resolved identity (lower-hex, 64 chars).
pub fn hash_actor(salt: &str, raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(raw.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_wins() {
        let source = IdentitySource {
            api_key: Some("key-1".to_string()),
            forwarded_for: Some("1.2.3.4".to_string()),
            ..Default::default()
        };
        assert_eq!(source.resolve(), (ActorKind::ApiKey, "key-1".to_string()));
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let source = IdentitySource {
            forwarded_for: Some(" 9.9.9.9 , 10.0.0.1, 10.0.0.2".to_string()),
            real_ip: Some("1.1.1.1".to_string()),
            ..Default::default()
        };
        assert_eq!(source.resolve(), (ActorKind::Ip, "9.9.9.9".to_string()));
    }

    #[test]
    fn test_header_precedence_chain() {
        let source = IdentitySource {
            real_ip: Some("2.2.2.2".to_string()),
            cf_connecting_ip: Some("3.3.3.3".to_string()),
            remote_addr: Some("4.4.4.4".to_string()),
            ..Default::default()
        };
        assert_eq!(source.resolve(), (ActorKind::Ip, "2.2.2.2".to_string()));

        let source = IdentitySource {
            cf_connecting_ip: Some("3.3.3.3".to_string()),
            remote_addr: Some("4.4.4.4".to_string()),
            ..Default::default()
        };
        assert_eq!(source.resolve(), (ActorKind::Ip, "3.3.3.3".to_string()));

        let source = IdentitySource {
            remote_addr: Some("4.4.4.4".to_string()),
            ..Default::default()
        };
        assert_eq!(source.resolve(), (ActorKind::Ip, "4.4.4.4".to_string()));
    }

    #[test]
    fn test_unknown_sentinel() {
        let source = IdentitySource::default();
        assert_eq!(source.resolve(), (ActorKind::Unknown, "unknown".to_string()));

        // Blank headers are treated as absent
        let source = IdentitySource {
            api_key: Some("  ".to_string()),
            forwarded_for: Some("".to_string()),
            ..Default::default()
        };
        assert_eq!(source.resolve().0, ActorKind::Unknown);
    }

    #[test]
    fn test_hash_is_salted_and_fixed_length() {
        let a = hash_actor("salt-a", "1.2.3.4");
        let b = hash_actor("salt-b", "1.2.3.4");
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, hash_actor("salt-a", "1.2.3.4"));
        assert!(!a.contains("1.2.3.4"));
    }
}
