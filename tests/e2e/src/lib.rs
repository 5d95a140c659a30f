//! End-to-end test support for Flow
//!
//! A [`Harness`] runs a real pipeline from a TOML document. Besides the core
//! modules it offers test-only plugin modules, registered through the native
//! plugin loader:
//!
//! - `plugin.collector`: records every message and completes it with the
//!   `status` parameter (default `done`)
//! - `plugin.flaky`: fails the first `fail_first` deliveries of every body,
//!   then completes `Done`
//! - `plugin.silent`: holds every message and never completes it

pub mod fixtures;
pub mod framework;

pub use fixtures::{Collector, FlakySink, SilentSink};
pub use framework::{free_port, Harness, LineClient};
