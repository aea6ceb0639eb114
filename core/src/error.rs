use thiserror::Error;

/// Error taxonomy for the ring subsystem: transport, protocol, empty-node,
/// storage, and hop-budget failures. RPC replies never serialize this type
/// directly — handlers map it down to a bare `success: bool`.
#[derive(Debug, Error)]
pub enum ChordError {
    #[error("peer {addr} unreachable during {method}: {source}")]
    Unreachable {
        addr: String,
        method: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("peer {addr} unreachable during {method}")]
    UnreachableMsg { addr: String, method: &'static str },

    #[error("protocol mismatch with {addr}: expected (m={expected_m}, r={expected_r}), got (m={got_m}, r={got_r})")]
    ProtocolMismatch {
        addr: String,
        expected_m: u32,
        expected_r: usize,
        got_m: u32,
        got_r: usize,
    },

    #[error("empty node reference where a live peer was required")]
    EmptyNode,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("find_successor exceeded hop budget ({0} steps)")]
    HopBudgetExceeded(u32),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("all successors are dead; this node is partitioned from its slice of the ring")]
    AllSuccessorsDead,
}

pub type Result<T> = std::result::Result<T, ChordError>;
