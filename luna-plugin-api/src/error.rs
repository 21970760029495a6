//! Error types for plug-in authors

use thiserror::Error;

/// Errors that plug-ins can return from their capabilities
#[derive(Error, Debug)]
pub enum PluginError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialisation or deserialisation failed
    #[error("Serialisation error: {0}")]
    Serialisation(String),

    /// Persisted configuration data was malformed
    #[error("Configuration format error: {0}")]
    ConfigurationFormat(String),

    /// Identifier does not exist in this plug-in
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// Identifier uses a reserved prefix or reserved metadata key
    #[error("Reserved identifier or key: {0}")]
    Reserved(String),

    /// The plug-in does not implement this optional capability
    #[error("Capability not supported: {0}")]
    Unsupported(&'static str),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl PluginError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create a serialisation error
    pub fn serialisation(message: impl Into<String>) -> Self {
        Self::Serialisation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::Serialisation("bad prefix".to_string());
        assert_eq!(err.to_string(), "Serialisation error: bad prefix");

        let err = PluginError::UnknownIdentifier("colour".to_string());
        assert!(err.to_string().contains("colour"));

        let err = PluginError::custom("something happened");
        assert_eq!(err.to_string(), "something happened");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PluginError = io_err.into();
        assert!(matches!(err, PluginError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_unsupported_display() {
        let err = PluginError::Unsupported("iterate_directory");
        assert!(err.to_string().contains("iterate_directory"));
    }
}
