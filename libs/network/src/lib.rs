//! # Flow Network
//!
//! Transport plumbing shared by Flow receivers and sinks:
//!
//! - [`Endpoint`]: parsing of `bind` strings (`tcp://`, `udp://`, `unix://`,
//!   `http://`, file targets)
//! - [`Head`]: the sink back-end contract with TCP, UDP, Unix and file heads
//! - [`ReconnectPolicy`]: exponential backoff used to re-establish heads
//! - [`framing`]: CRLF line framing

pub mod endpoint;
pub mod error;
pub mod framing;
pub mod reconnect;
pub mod transports;

pub use endpoint::{Endpoint, FileTarget, DEFAULT_HTTP_PATH};
pub use error::{Result, TransportError};
pub use reconnect::ReconnectPolicy;
pub use transports::{head_for, Head, WriteError, WriteResult};

/// Default connect timeout for stream heads
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
