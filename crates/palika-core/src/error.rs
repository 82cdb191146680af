use thiserror::Error;

/// Top-level error type for the Palika assistant.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for PalikaError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PalikaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Bot error: {0}")]
    Bot(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("History error: {0}")]
    History(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for PalikaError {
    fn from(err: toml::de::Error) -> Self {
        PalikaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PalikaError {
    fn from(err: toml::ser::Error) -> Self {
        PalikaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PalikaError {
    fn from(err: serde_json::Error) -> Self {
        PalikaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Palika operations.
pub type Result<T> = std::result::Result<T, PalikaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PalikaError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PalikaError = io_err.into();
        assert!(matches!(err, PalikaError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        let err: PalikaError = parse.unwrap_err().into();
        assert!(matches!(err, PalikaError::Serialization(_)));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let parse: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let err: PalikaError = parse.unwrap_err().into();
        assert!(matches!(err, PalikaError::Config(_)));
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(PalikaError, &str)> = vec![
            (
                PalikaError::Auth("bad token".to_string()),
                "Authentication error: bad token",
            ),
            (
                PalikaError::Bot("status 500".to_string()),
                "Bot error: status 500",
            ),
            (
                PalikaError::Speech("no match".to_string()),
                "Speech error: no match",
            ),
            (
                PalikaError::Chat("busy".to_string()),
                "Chat error: busy",
            ),
            (
                PalikaError::History("corrupt".to_string()),
                "History error: corrupt",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
