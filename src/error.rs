use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Schema validation failed for {field}: {details}")]
    SchemaValidation { field: String, details: String },

    #[error("Invalid extraction result: {0}")]
    InvalidResult(String),

    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ExtractionError {
    pub fn validation(field: impl Into<String>, details: impl Into<String>) -> Self {
        Self::SchemaValidation {
            field: field.into(),
            details: details.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::SchemaValidation { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
