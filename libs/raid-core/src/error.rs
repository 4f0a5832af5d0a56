//! Error types for raid-core.

use thiserror::Error;

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Domain failures surfaced by the core algorithms.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown track: {0}")]
    UnknownTrack(String),

    #[error("fact pool is empty for track {track}")]
    EmptyPool { track: String },

    #[error("invalid boss level {0} (expected 0-8)")]
    InvalidBossLevel(u8),
}
