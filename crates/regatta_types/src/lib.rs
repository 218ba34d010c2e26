//! # Regatta Types
//!
//! Core domain types for Regatta Sync.
//!
//! This crate provides:
//! - Replica-independent identifiers (`SyncId`, `DeviceId`)
//! - Entity kinds with their fixed dependency order
//! - Domain records for reference and operational data
//! - Content-based, time-bucketed case fingerprints
//!
//! This is a pure types crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fingerprint;
mod id;
mod kind;
mod record;

pub use fingerprint::{bucket_floor, Fingerprint, DEFAULT_BUCKET};
pub use id::{DeviceId, LocalId, SyncId};
pub use kind::{EntityCategory, EntityKind};
pub use record::{
    Athlete, CaseDecision, Competition, Entry, IncidentCase, IncidentReport, Location,
    RecordPayload, Race, Stage,
};
