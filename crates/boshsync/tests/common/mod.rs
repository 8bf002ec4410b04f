//! Shared utilities for boshsync integration tests.
//!
//! - `TestHarness` wires an in-memory store, secret store and recording
//!   remote clients to a reconciler
//! - builder functions create records with realistic specs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
