//! Test utilities and fixtures for Stylemill
//!
//! Shared by the integration tests of the core and CLI crates.

pub mod compile;
pub mod fixtures;
pub mod mocks;

pub use compile::ImportScanningCompiler;
pub use mocks::{LogEntry, RecordingHooks, ScriptedCompiler};
#[cfg(unix)]
pub use mocks::fake_sass;
