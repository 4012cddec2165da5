//! Error types of the extension subsystem.

use crate::extension::coordinate::CoordinateParseError;

/// Errors raised while finding, loading or instantiating extensions.
///
/// Most of these never escape a load pass: the pass logs them and moves on
/// to the next coordinate. `NotRegistered` is the exception and signals a
/// programming error in the caller.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("No package found for {0}")]
    NotFound(String),

    #[error("Conflicting packages for {coordinate}: {candidates:?}")]
    Conflict {
        coordinate: String,
        candidates: Vec<String>,
    },

    #[error("Finder {finder} failed: {reason}")]
    FinderFailed { finder: String, reason: String },

    #[error("Factory {factory} failed: {reason}")]
    FactoryFailed { factory: String, reason: String },

    /// Release of a coordinate that has no registered loader.
    #[error("No corresponding loader exists for {0}")]
    NotRegistered(String),

    #[error("Invalid package {path}: {reason}")]
    InvalidPackage { path: String, reason: String },

    #[error("Load failed: {0}")]
    LoadFailed(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Incompatible ABI version: expected {expected}, got {got}")]
    AbiMismatch { expected: u32, got: u32 },

    /// Coordinate part that cannot be used as a single path component.
    #[error("Coordinate {coordinate} cannot name a folder: {reason}")]
    UnsafeCoordinate { coordinate: String, reason: String },

    #[error("Loader for {0} is closed")]
    LoaderClosed(String),

    #[error("Dependency resolution failed for {coordinate}: {reasons:?}")]
    DependencyResolution {
        coordinate: String,
        reasons: Vec<String>,
    },

    #[error(transparent)]
    InvalidCoordinate(#[from] CoordinateParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Result type of the extension subsystem.
pub type Result<T> = std::result::Result<T, ExtensionError>;
