//! Error type of the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CmapError>;

/// Reasons a contact map run can fail.
///
/// Malformed structure records never surface through this type at runtime: the
/// parser skips them and logs the cause. Switch-function singularities are
/// likewise recovered in place.
#[derive(Debug, Error)]
pub enum CmapError {
    /// Input file does not exist
    #[error("File not found: {}", path.display())]
    MissingFile {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Reading or writing a file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An atom record could not be parsed
    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number within the frame
        line: usize,
        /// Field that failed
        reason: String,
    },

    /// A required selection resolved to no atoms
    #[error("No atoms selected for the {side} side")]
    EmptySelection {
        /// `receptor`, `ligand` or `index`
        side: &'static str,
    },

    /// The ensemble has no frames to process
    #[error("No frames found in {}", path.display())]
    EmptyFrameList {
        /// Ensemble file
        path: PathBuf,
    },

    /// Sizes that must agree do not
    #[error("Dimension mismatch: {context} (expected {expected}, found {found})")]
    DimensionMismatch {
        /// What was counted
        context: &'static str,
        /// Required size
        expected: usize,
        /// Actual size
        found: usize,
    },

    /// A setting or command line value is unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Building or writing a DataFrame failed
    #[error("Failed to write table: {0}")]
    Polars(#[from] polars::error::PolarsError),
}
