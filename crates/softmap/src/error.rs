//! Error types for softmap

use std::io;

use thiserror::Error;

/// Result type alias for softmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a map or starting its reaper.
///
/// Map reads and writes never fail: a missing or reclaimed value is `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected by [`SoftMapConfig::validate`](crate::SoftMapConfig::validate)
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        /// Offending field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The reaper thread could not be spawned
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = Error::invalid_config("sweep_threshold", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration: sweep_threshold must be at least 1"
        );
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "no threads").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
