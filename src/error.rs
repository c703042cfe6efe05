use thiserror::Error;

#[derive(Error, Debug)]
pub enum SosError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Invalid parameter for {operation}: {reason}")]
    InvalidParameter {
        operation: &'static str,
        reason: String,
    },

    #[error("Service failure: {0}")]
    ServiceFailure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type SosResult<T> = Result<T, SosError>;

impl SosError {
    pub fn invalid_parameter(operation: &'static str, reason: impl Into<String>) -> Self {
        SosError::InvalidParameter {
            operation,
            reason: reason.into(),
        }
    }

    /// Maps any failure raised while running a filter query onto the
    /// all-or-nothing ServiceFailure kind.
    pub fn into_service_failure(self) -> Self {
        match self {
            SosError::ServiceFailure(_) => self,
            other => SosError::ServiceFailure(other.to_string()),
        }
    }
}

impl serde::Serialize for SosError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<rusqlite::Error> for SosError {
    fn from(err: rusqlite::Error) -> Self {
        SosError::ExecutionError(err.to_string())
    }
}
