//! Client configuration.

use docchat_core::defaults;

/// Configuration for the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the document-chat server (no trailing `/api`).
    pub base_url: String,
    /// Request timeout in seconds; `None` relies on transport defaults.
    pub timeout_seconds: Option<u64>,
    /// Upload body chunk size, which is also the progress granularity.
    pub upload_chunk_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            timeout_seconds: None,
            upload_chunk_bytes: defaults::UPLOAD_CHUNK_BYTES,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DOCCHAT_BASE_URL` | `http://127.0.0.1:5000` | Server base URL |
    /// | `DOCCHAT_TIMEOUT` | (unset) | Request timeout in seconds |
    /// | `DOCCHAT_UPLOAD_CHUNK_BYTES` | `65536` | Upload progress granularity |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("DOCCHAT_BASE_URL").unwrap_or_else(|_| defaults::BASE_URL.to_string());

        let timeout_seconds = std::env::var("DOCCHAT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0);

        let upload_chunk_bytes = std::env::var("DOCCHAT_UPLOAD_CHUNK_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::UPLOAD_CHUNK_BYTES)
            .max(1);

        Self {
            base_url,
            timeout_seconds,
            upload_chunk_bytes,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_upload_chunk_bytes(mut self, bytes: usize) -> Self {
        self.upload_chunk_bytes = bytes.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, defaults::BASE_URL);
        assert!(config.timeout_seconds.is_none());
        assert_eq!(config.upload_chunk_bytes, defaults::UPLOAD_CHUNK_BYTES);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::default()
            .with_base_url("http://localhost:9000")
            .with_timeout(30)
            .with_upload_chunk_bytes(0);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout_seconds, Some(30));
        assert_eq!(config.upload_chunk_bytes, 1);
    }
}
