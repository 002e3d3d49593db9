use std::error::Error;
use std::fmt;

/// Error kinds of the bitmap-building boundary.
///
/// Matching and classification themselves have no recoverable error
/// conditions; only the constructors that accept caller-supplied buffers can
/// fail.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MatchError {
    /// A bitmap with zero width or height was requested.
    InvalidDimensions(usize, usize),

    /// A packed buffer does not have the length implied by the dimensions.
    BufferSize {
        actual_bytes: usize,
        required_bytes: usize,
    },
}

impl fmt::Display for MatchError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use self::MatchError::*;
        match *self {
            InvalidDimensions(width, height) => {
                write!(fmt, "Invalid dimensions: {}x{}.", width, height)
            }
            BufferSize {
                actual_bytes,
                required_bytes,
            } => {
                write!(
                    fmt,
                    "Packed buffer has a different length than the dimensions imply: got {}, expected {}.",
                    actual_bytes, required_bytes
                )
            }
        }
    }
}

impl Error for MatchError {}

/// Result of a bitmap-building operation.
pub type MatchResult<T> = Result<T, MatchError>;
