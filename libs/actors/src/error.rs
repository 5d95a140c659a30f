//! Actor runtime errors
//!
//! Construction and contract errors are fatal during pipeline assembly.
//! Message-level outcomes are never errors; they travel as
//! [`MessageStatus`](flow_types::MessageStatus) on the message itself.

use flow_config::ParamsError;
use flow_network::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActorError {
    /// Invalid option or unusable configuration for one actor
    #[error("actor '{actor}': {reason}")]
    Construction { actor: String, reason: String },

    #[error(transparent)]
    Params(#[from] ParamsError),

    /// Operation outside the actor's contract (receive on a source, connect
    /// on a sink)
    #[error("actor '{actor}' does not support {operation}")]
    Unsupported {
        actor: String,
        operation: &'static str,
    },

    #[error("actor '{actor}' cannot take more than {cap} peers")]
    PeerCap { actor: String, cap: usize },

    /// The actor's queues are closed
    #[error("actor '{actor}' is stopped")]
    Closed { actor: String },

    #[error("actor '{actor}': unknown module '{module}'")]
    UnknownModule { actor: String, module: String },

    #[error("duplicate actor name '{0}'")]
    Duplicate(String),

    #[error("pipeline '{from}' references undefined actor '{peer}'")]
    UnresolvedPeer { from: String, peer: String },

    #[error("cycle detected at actor '{node}'")]
    Cycle { node: String },

    #[error("plugin '{module}': {reason}")]
    Plugin { module: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("actor '{actor}': {source}")]
    Io {
        actor: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    pub fn construction(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            actor: actor.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(actor: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            actor: actor.into(),
            operation,
        }
    }

    pub fn closed(actor: impl Into<String>) -> Self {
        Self::Closed {
            actor: actor.into(),
        }
    }

    pub fn plugin(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Plugin {
            module: module.into(),
            reason: reason.into(),
        }
    }

    pub fn io(actor: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            actor: actor.into(),
            source,
        }
    }
}
