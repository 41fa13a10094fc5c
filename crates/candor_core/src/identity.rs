//! Identity digests for anonymous callers.
//!
//! Callers are identified by at most two signals: a long-lived client
//! cookie and the network origin address. Neither is ever stored raw; only
//! a fixed-length one-way digest is kept and used as an opaque lookup key.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an identity signal.
pub fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// The digests identifying one anonymous voter.
///
/// An empty string means the signal was absent for this request. Either
/// signal alone is enough to match a prior vote, so dedup checks OR over
/// [`VoteIdentity::signals`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteIdentity {
    pub ip_hash: String,
    pub client_hash: String,
}

impl VoteIdentity {
    pub fn new(ip_hash: impl Into<String>, client_hash: impl Into<String>) -> Self {
        Self {
            ip_hash: ip_hash.into(),
            client_hash: client_hash.into(),
        }
    }

    /// Digest raw signals. `None` or empty input leaves the field absent.
    pub fn from_signals(origin: Option<&str>, client_token: Option<&str>) -> Self {
        let hash = |signal: Option<&str>| {
            signal
                .filter(|s| !s.is_empty())
                .map(digest)
                .unwrap_or_default()
        };
        Self {
            ip_hash: hash(origin),
            client_hash: hash(client_token),
        }
    }

    /// The non-empty digests, in field order.
    ///
    /// Vote dedup matches a prior record on any one of these. A future
    /// third identity signal only needs to be appended here.
    pub fn signals(&self) -> impl Iterator<Item = &str> {
        [self.ip_hash.as_str(), self.client_hash.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
    }

    /// True when no signal is present at all.
    pub fn is_anonymous(&self) -> bool {
        self.signals().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_fixed_length() {
        let a = digest("203.0.113.7");
        let b = digest("203.0.113.7");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, digest("203.0.113.8"));
    }

    #[test]
    fn from_signals_skips_absent_inputs() {
        let identity = VoteIdentity::from_signals(Some("203.0.113.7"), None);
        assert!(!identity.ip_hash.is_empty());
        assert!(identity.client_hash.is_empty());
        assert_eq!(identity.signals().count(), 1);

        let identity = VoteIdentity::from_signals(Some(""), Some("tok"));
        assert!(identity.ip_hash.is_empty());
        assert_eq!(identity.client_hash, digest("tok"));
    }

    #[test]
    fn anonymous_identity_has_no_signals() {
        let identity = VoteIdentity::from_signals(None, None);
        assert!(identity.is_anonymous());
        assert_eq!(identity.signals().count(), 0);
    }
}
