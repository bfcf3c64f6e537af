//! Session configuration.

use std::time::Duration;

use docchat_core::defaults;

use crate::heartbeat::HeartbeatConfig;
use crate::render::CitationFallback;

/// Behaviour switches for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How unmatched citation uris are named.
    pub citation_fallback: CitationFallback,
    /// Append a short assistant note after clearing the chat.
    pub reseed_on_clear: bool,
    /// How long an optimistic store entry is shown without confirmation.
    pub pending_store_ttl: Duration,
    pub heartbeat: HeartbeatConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            citation_fallback: CitationFallback::default(),
            reseed_on_clear: true,
            pending_store_ttl: Duration::from_secs(defaults::PENDING_STORE_TTL_SECS),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    ///
    /// Reads `DOCCHAT_CITATION_FALLBACK` plus the heartbeat variables (see
    /// [`HeartbeatConfig::from_env`]).
    pub fn from_env() -> Self {
        Self {
            citation_fallback: CitationFallback::from_env(),
            heartbeat: HeartbeatConfig::from_env(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.citation_fallback, CitationFallback::LastPathSegment);
        assert!(config.reseed_on_clear);
        assert_eq!(config.pending_store_ttl, Duration::from_secs(30));
    }
}
