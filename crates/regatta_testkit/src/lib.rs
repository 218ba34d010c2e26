//! # Regatta Testkit
//!
//! Shared fixtures and helpers for Regatta Sync tests.
//!
//! This crate provides:
//! - A complete competition fixture (stage, race, locations, athletes,
//!   entries) with case and report builders
//! - A loopback transport wiring a device engine to an in-process hub,
//!   with failure injection for crash and outage scenarios
//! - Test logging setup

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fixtures;
mod loopback;

pub use fixtures::EventFixture;
pub use loopback::LoopbackTransport;

/// Installs a compact `tracing` subscriber for tests.
///
/// Honors `RUST_LOG`; safe to call from every test, only the first call
/// installs.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
