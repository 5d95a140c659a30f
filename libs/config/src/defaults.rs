//! Default configuration values
//!
//! Constants shared by the configuration loader and the actor runtime so
//! both agree on what an omitted setting means.

/// `system.*` defaults
pub mod system {
    /// Per-edge parallelism when the host parallelism cannot be queried
    pub const FALLBACK_MAXPROCS: usize = 1;

    /// Host parallelism, at least one
    pub fn maxprocs() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(FALLBACK_MAXPROCS)
    }
}

/// `plugin.*` defaults
pub mod plugin {
    pub const PATH: &str = "/usr/lib/flow/plugins";

    /// Symbol resolved in a plugin library when `builder` is not set
    pub const BUILDER_SYMBOL: &str = "flow_build_actor";

    /// File extension of loadable plugin libraries
    pub const LIBRARY_EXTENSION: &str = "so";
}

/// `log.*` defaults
pub mod log {
    pub const LEVEL: &str = "info";
    pub const OUTPUT: &str = "stderr";
    pub const FORMAT: &str = "text";
}

/// Actor runtime defaults
pub mod actors {
    /// Capacity of an actor's outbound queue
    pub const OUTLET_CAPACITY: usize = 1024;

    /// Buffer inbound queue capacity
    pub const BUFFER_CAPACITY: usize = 65_536;

    /// Buffer retry budget per message
    pub const BUFFER_MAX_RETRY: u32 = 16;

    /// Demux and replicator aggregate deadline (milliseconds)
    pub const DEMUX_DEADLINE_MS: u64 = 50;

    /// Demux and replicator peer cap, the width of the selection mask
    pub const MAX_PEERS: usize = 64;

    /// Throttler compare-and-swap attempts per admission
    pub const THROTTLER_CAS_ATTEMPTS: usize = 10;

    /// Sink inbound queue capacity
    pub const SINK_QUEUE_CAPACITY: usize = 1024;
}

/// Receiver defaults
pub mod receivers {
    /// TCP and Unix per-message send timeout (milliseconds)
    pub const STREAM_TIMEOUT_MS: u64 = 100;

    /// UDP per-message send timeout (milliseconds)
    pub const UDP_TIMEOUT_MS: u64 = 50;

    /// HTTP per-message send timeout (milliseconds)
    pub const HTTP_TIMEOUT_MS: u64 = 100;

    /// HTTP graceful shutdown drain deadline (seconds)
    pub const HTTP_DRAIN_SECS: u64 = 5;

    /// Largest datagram the UDP receiver accepts
    pub const UDP_MAX_DATAGRAM: usize = 65_507;
}
