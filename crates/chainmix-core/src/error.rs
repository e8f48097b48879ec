//! Error taxonomy for the randomness pipeline.
//!
//! Per-slot RPC failures are never surfaced here — the scanner swallows them
//! as skips. Everything in this enum aborts the current draw.

use thiserror::Error;

/// Fatal failures of a draw or of one of its standalone operations.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// The backward scan ran out of budget without finding a single
    /// finalized block.
    #[error("no finalized blocks found (RPC/scan window exhausted)")]
    ExhaustedScan,

    /// The RPC endpoint itself is unreachable or answers garbage. Distinct
    /// from a per-slot miss, which is a skip.
    #[error("upstream RPC unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Strict collection mode: the local entropy floor was not met after
    /// the window closed.
    #[error("not enough local entropy: {actual} < {required}")]
    InsufficientEntropy { actual: usize, required: usize },

    /// Malformed hex, wrong-length seed, empty source set, bad draw id.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Range size is not representable: empty or larger than 2^64.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence collaborator failure (corrupt record, serialization).
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, BeaconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_counts() {
        let e = BeaconError::InsufficientEntropy {
            actual: 12,
            required: 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn test_io_error_converts() {
        fn read() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/not/here")?)
        }
        assert!(matches!(read(), Err(BeaconError::Io(_))));
    }
}
