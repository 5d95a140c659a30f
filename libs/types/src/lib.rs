//! # Flow Message Types
//!
//! The unit of data every Flow actor handles: an immutable body, metadata
//! guarded by a per-message mutex, and a one-shot completion signal carrying
//! a terminal [`MessageStatus`].
//!
//! ```rust
//! use flow_types::{Message, MessageStatus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let msg = Message::new(b"payload");
//! msg.set_meta("sendto", "a");
//!
//! let completion = msg.completion();
//! msg.complete(MessageStatus::Done);
//! assert_eq!(completion.wait().await, MessageStatus::Done);
//! # }
//! ```

pub mod message;
pub mod status;

pub use message::{Completion, Message, Metadata};
pub use status::MessageStatus;
