//! Terminal message statuses
//!
//! Every message that enters a pipeline ends in exactly one of these states.
//! `New` is the pre-completion state and is never reported as a result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Not completed yet
    #[default]
    New,
    /// Delivered everywhere it was supposed to go
    Done,
    /// Delivered to some but not all destinations
    PartialSend,
    /// Rejected as malformed
    Invalid,
    /// Delivery failed
    Failed,
    /// No result within the deadline
    TimedOut,
    /// No route matched the message
    Unroutable,
    /// Rejected by a rate limiter
    Throttled,
}

impl MessageStatus {
    /// All terminal statuses, in declaration order
    pub const TERMINAL: [MessageStatus; 7] = [
        MessageStatus::Done,
        MessageStatus::PartialSend,
        MessageStatus::Invalid,
        MessageStatus::Failed,
        MessageStatus::TimedOut,
        MessageStatus::Unroutable,
        MessageStatus::Throttled,
    ];

    /// Whether this status ends a message lifecycle
    pub fn is_terminal(self) -> bool {
        self != MessageStatus::New
    }

    /// Whether the message reached at least one destination
    pub fn is_delivered(self) -> bool {
        matches!(self, MessageStatus::Done | MessageStatus::PartialSend)
    }

    /// Stable lowercase label, used as a metrics key
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::New => "new",
            MessageStatus::Done => "done",
            MessageStatus::PartialSend => "partial_send",
            MessageStatus::Invalid => "invalid",
            MessageStatus::Failed => "failed",
            MessageStatus::TimedOut => "timed_out",
            MessageStatus::Unroutable => "unroutable",
            MessageStatus::Throttled => "throttled",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
