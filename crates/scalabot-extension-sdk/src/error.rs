//! Factory error types.

/// Error returned by a factory that could not build its extension.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// Initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data folder could not be used
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Factory result type
pub type FactoryResult<T> = Result<T, FactoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FactoryError::InitializationFailed("test error".to_string());
        assert_eq!(err.to_string(), "Initialization failed: test error");

        let err = FactoryError::Custom("plain".to_string());
        assert_eq!(err.to_string(), "plain");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: FactoryError = io.into();
        assert!(matches!(err, FactoryError::Io(_)));
    }
}
