//! Device registry and token authentication.
//!
//! Every sync request is attributed to a registered device identity;
//! unregistered or badly-signed requests are rejected before the
//! deduplication engine runs.
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 16 bytes: device id
//! - 16 bytes: hub id
//! - 8 bytes: timestamp (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 signature
//!
//! Total: 72 bytes.

use crate::error::{HubError, HubResult};
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use regatta_types::{DeviceId, SyncId};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_LEN: usize = 72;

/// A registered field device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// The device identity.
    pub device: DeviceId,
    /// Operator-facing name ("Finish tower", "Gate 14 left bank").
    pub name: String,
    /// When the device was registered (Unix millis).
    pub registered_at_ms: u64,
}

/// The set of devices allowed to sync with this hub.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<DeviceId, DeviceRecord>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device. Re-registering updates the name.
    pub fn register(&self, device: DeviceId, name: impl Into<String>, now_ms: u64) {
        self.devices.write().insert(
            device,
            DeviceRecord {
                device,
                name: name.into(),
                registered_at_ms: now_ms,
            },
        );
    }

    /// Returns true if the device is registered.
    #[must_use]
    pub fn is_registered(&self, device: DeviceId) -> bool {
        self.devices.read().contains_key(&device)
    }

    /// Fails with [`HubError::UnknownDevice`] for unregistered devices.
    pub fn require(&self, device: DeviceId) -> HubResult<()> {
        if self.is_registered(device) {
            Ok(())
        } else {
            Err(HubError::UnknownDevice(device))
        }
    }

    /// All registered devices.
    #[must_use]
    pub fn list(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> = self.devices.read().values().cloned().collect();
        records.sort_by_key(|r| r.registered_at_ms);
        records
    }
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Token issuer and validator.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates an auth token binding a device to this hub.
    pub fn create_token(&self, device: DeviceId, hub: SyncId, now_ms: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(device.as_bytes());
        data.extend_from_slice(hub.as_bytes());
        data.extend_from_slice(&now_ms.to_be_bytes());

        let signature = self.sign(&data);

        let mut token = data;
        token.extend_from_slice(&signature);
        token
    }

    /// Validates a token against the expected device and hub.
    pub fn validate_token(
        &self,
        token: &[u8],
        expected_device: DeviceId,
        expected_hub: SyncId,
        now_ms: u64,
    ) -> HubResult<()> {
        if token.len() != TOKEN_LEN {
            return Err(HubError::NotAuthorized("invalid token length".into()));
        }

        let device = DeviceId::from_bytes(
            token[0..16]
                .try_into()
                .map_err(|_| HubError::NotAuthorized("invalid token".into()))?,
        );
        let hub = SyncId::from_slice(&token[16..32])
            .ok_or_else(|| HubError::NotAuthorized("invalid token".into()))?;
        let timestamp_bytes: [u8; 8] = token[32..40]
            .try_into()
            .map_err(|_| HubError::NotAuthorized("invalid token".into()))?;
        let signature = &token[40..72];

        if device != expected_device {
            return Err(HubError::NotAuthorized("device mismatch".into()));
        }
        if hub != expected_hub {
            return Err(HubError::NotAuthorized("hub mismatch".into()));
        }

        let expected_signature = self.sign(&token[0..40]);
        if signature != expected_signature {
            return Err(HubError::NotAuthorized("invalid signature".into()));
        }

        let timestamp = u64::from_be_bytes(timestamp_bytes);
        let expiry_ms = self.config.token_expiry.as_millis() as u64;
        if now_ms > timestamp.saturating_add(expiry_ms) {
            return Err(HubError::NotAuthorized("token expired".into()));
        }

        Ok(())
    }

    fn sign(&self, data: &[u8]) -> [u8; 32] {
        let mut mac =
            HmacSha256::new_from_slice(&self.config.secret).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}
