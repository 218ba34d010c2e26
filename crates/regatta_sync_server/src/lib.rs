//! # Regatta Sync Server
//!
//! Hub-side synchronization for Regatta Sync.
//!
//! This crate provides:
//! - The three-layer deduplication engine (identity, fingerprint, new)
//! - The committed-record store with the merge alias map
//! - The conflict store and operator resolution workflow
//! - Device registry and HMAC-SHA256 token authentication
//! - Request handlers and an embeddable server facade
//!
//! # Architecture
//!
//! The hub is authoritative for committed records but never guesses on
//! a genuine disagreement: anything the identity layer cannot prove
//! equivalent is parked in the conflict store for an operator. The one
//! deliberately automatic path is the fingerprint merge, which is
//! scoped to "same event, no information lost" and leaves an audit
//! note instead of a conflict.
//!
//! Per-record decisions run under a single write guard, so concurrent
//! submissions of one identifier serialize rather than double-create.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod conflicts;
mod dedup;
mod error;
mod handler;
mod hub;
mod store;

pub use auth::{AuthConfig, DeviceRecord, DeviceRegistry, TokenValidator};
pub use config::HubConfig;
pub use conflicts::{ConflictRecord, ConflictResolution, ConflictStore, ResolutionAction};
pub use dedup::DedupEngine;
pub use error::{HubError, HubResult};
pub use handler::RequestHandler;
pub use hub::HubServer;
pub use store::{HubState, HubStore, MergeNote};
