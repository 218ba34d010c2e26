//! Content-based, time-bucketed case fingerprints.
//!
//! Two cases that describe the same real-world event but were captured
//! on different replicas carry different sync IDs. The fingerprint
//! detects them anyway: it hashes the case's referencing identifiers,
//! its bib number, and its creation timestamp rounded DOWN to a fixed
//! bucket. Timestamps a few seconds apart land in the same bucket and
//! produce identical fingerprints; genuinely distinct events almost
//! always fall into different buckets.
//!
//! Widening the bucket raises auto-merge recall at the cost of merging
//! genuinely distinct near-simultaneous events. The width is the single
//! tunable parameter of this trade-off and is configuration, not a
//! constant; bucket-edge behavior is pinned by tests (two timestamps
//! exactly one width apart never share a bucket).

use crate::record::IncidentCase;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Default fingerprint bucket width.
pub const DEFAULT_BUCKET: Duration = Duration::from_secs(30);

/// Domain separator so fingerprints never collide with other digests.
const FINGERPRINT_DOMAIN: &[u8] = b"regatta.case.fingerprint.v1";

/// A fixed-length, content-derived case fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint of a case under the given bucket width.
    ///
    /// Inputs, in order: race sync ID, location sync ID, bib number,
    /// and `created_at_ms` rounded down to the bucket.
    #[must_use]
    pub fn of_case(case: &IncidentCase, bucket: Duration) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN);
        hasher.update(case.race.as_bytes());
        hasher.update(case.location.as_bytes());
        hasher.update(case.bib_number.to_be_bytes());
        hasher.update(bucket_floor(case.created_at_ms, bucket).to_be_bytes());
        Self(hasher.finalize().into())
    }

    /// Returns the raw digest bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars are enough to tell fingerprints apart in logs.
        write!(
            f,
            "Fingerprint({:02x}{:02x}{:02x}{:02x})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Rounds a Unix-millisecond timestamp down to the start of its bucket.
///
/// A zero-width bucket is treated as one millisecond so the floor is
/// always well defined.
#[must_use]
pub fn bucket_floor(timestamp_ms: u64, bucket: Duration) -> u64 {
    let width = (bucket.as_millis() as u64).max(1);
    timestamp_ms - (timestamp_ms % width)
}
