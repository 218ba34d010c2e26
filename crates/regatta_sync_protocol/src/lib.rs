//! # Regatta Sync Protocol
//!
//! Wire types and CBOR codecs for Regatta Sync.
//!
//! This crate provides:
//! - Download messages (the pre-event reference-data graph)
//! - Per-kind upload messages with parallel per-record outcomes
//! - Conflict details with a human-readable field diff
//! - CBOR encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod conflict;
mod messages;
mod outcome;

pub use codec::{from_cbor, to_cbor, ProtocolError, ProtocolResult};
pub use conflict::{ConflictDetail, ConflictKind, FieldDiff};
pub use messages::{
    DownloadRequest, DownloadResponse, ReferenceGraph, UploadRequest, UploadResponse,
};
pub use outcome::RecordOutcome;
