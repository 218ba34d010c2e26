//! Hub configuration.

use regatta_types::{DeviceId, SyncId, DEFAULT_BUCKET};
use std::time::Duration;

/// Configuration for the hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Identity of this hub instance; bound into device tokens.
    pub hub_id: SyncId,
    /// Replica identity used when the hub itself creates records.
    pub hub_device: DeviceId,
    /// Maximum records per upload request.
    pub max_upload_batch: usize,
    /// Fingerprint bucket width. The single tunable parameter of the
    /// auto-merge recall/precision trade-off.
    pub fingerprint_bucket: Duration,
    /// Whether to require token authentication.
    pub require_auth: bool,
    /// Secret key for token validation (if auth enabled).
    pub auth_secret: Option<Vec<u8>>,
    /// Token expiration.
    pub token_expiry: Duration,
}

impl HubConfig {
    /// Creates a configuration with fresh hub identities.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hub_id: SyncId::new(),
            hub_device: DeviceId::new(),
            max_upload_batch: 200,
            fingerprint_bucket: DEFAULT_BUCKET,
            require_auth: false,
            auth_secret: None,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the maximum upload batch size.
    #[must_use]
    pub fn with_max_upload_batch(mut self, size: usize) -> Self {
        self.max_upload_batch = size.max(1);
        self
    }

    /// Sets the fingerprint bucket width.
    #[must_use]
    pub fn with_fingerprint_bucket(mut self, bucket: Duration) -> Self {
        self.fingerprint_bucket = bucket;
        self
    }

    /// Enables token authentication with the given secret.
    #[must_use]
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.require_auth = true;
        self.auth_secret = Some(secret);
        self
    }

    /// Sets the token expiration.
    #[must_use]
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_upload_batch, 200);
        assert_eq!(config.fingerprint_bucket, DEFAULT_BUCKET);
        assert!(!config.require_auth);
    }

    #[test]
    fn config_builder() {
        let config = HubConfig::new()
            .with_max_upload_batch(50)
            .with_fingerprint_bucket(Duration::from_secs(10))
            .with_auth(vec![1, 2, 3, 4]);

        assert_eq!(config.max_upload_batch, 50);
        assert_eq!(config.fingerprint_bucket, Duration::from_secs(10));
        assert!(config.require_auth);
        assert_eq!(config.auth_secret, Some(vec![1, 2, 3, 4]));
    }
}
