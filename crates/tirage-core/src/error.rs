use thiserror::Error;

/// Top-level error type for the Tirage system.
///
/// Subsystem crates define their own error types and convert into or out of
/// `TirageError` at crate boundaries so `?` works across them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TirageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TirageError {
    fn from(err: toml::de::Error) -> Self {
        TirageError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TirageError {
    fn from(err: toml::ser::Error) -> Self {
        TirageError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TirageError {
    fn from(err: serde_json::Error) -> Self {
        TirageError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tirage operations.
pub type Result<T> = std::result::Result<T, TirageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TirageError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = TirageError::Query("no such column: foo".to_string());
        assert_eq!(err.to_string(), "Query error: no such column: foo");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TirageError = io_err.into();
        assert!(matches!(err, TirageError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("not = = valid").unwrap_err();
        let err: TirageError = toml_err.into();
        assert!(matches!(err, TirageError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: TirageError = json_err.into();
        assert!(matches!(err, TirageError::Serialization(_)));
    }
}
