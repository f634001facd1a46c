//! Error types for level construction and configuration validation
//!
//! Expected run-time conditions (placement conflicts, blocked scrolls) are
//! reported through boolean results, never through this module. The error
//! type below only covers one-time construction input that cannot produce a
//! usable level.

use std::fmt;

/// Validation error raised while building a level
#[derive(Debug)]
pub enum CoreError {
    /// A construction parameter failed validation
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Initial board data does not match the declared dimensions
    BoardShape {
        /// Number of tiles implied by width * height
        expected: usize,
        /// Number of tiles actually supplied
        actual: usize,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::BoardShape { expected, actual } => {
                write!(
                    f,
                    "Initial board holds {actual} tiles but the dimensions require {expected}"
                )
            }
        }
    }
}

impl std::error::Error for CoreError {}

/// Convenience type alias for construction results
pub type Result<T> = std::result::Result<T, CoreError>;

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> CoreError {
    CoreError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
