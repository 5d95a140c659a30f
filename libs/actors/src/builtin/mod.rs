//! Built-in passthrough actors

pub(crate) mod broadcast;

pub mod base64;
pub mod buffer;
pub mod compressor;
pub mod demux;
pub mod fanout;
pub mod meta_parser;
pub mod mux;
pub mod replicator;
pub mod router;
pub mod throttler;
pub mod transform;

pub use buffer::{Buffer, BufferSettings};
pub use demux::Demux;
pub use fanout::Fanout;
pub use mux::Mux;
pub use replicator::{Mode, Replicator};
pub use router::Router;
pub use throttler::{Gcra, Throttler};
pub use transform::{Transform, TransformActor};
