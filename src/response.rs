use crate::error::{ExtractionError, Result};
use log::{debug, error};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

pub const JSON_FENCE_OPEN: &str = "```json";
pub const FENCE: &str = "```";
pub const PARSE_FAILURE: &str = "Failed to parse JSON";

/// What a document-processing call produced. Failures are values, not
/// errors, so callers can render them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelOutcome {
    Extracted(Value),
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_text: Option<String>,
    },
}

impl ModelOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            raw_text: None,
        }
    }

    /// Interprets a stored result blob; any object carrying an `error` key is
    /// a failure.
    pub fn from_value(value: Value) -> Self {
        if let Some(obj) = value.as_object() {
            if let Some(err) = obj.get("error") {
                let error = match err {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let raw_text = obj
                    .get("raw_text")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Self::Failed { error, raw_text };
            }
        }
        Self::Extracted(value)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Extracted(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Extracted(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::Extracted(value) => Ok(value),
            Self::Failed { error, .. } => Err(ExtractionError::ModelCall(error)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Extracted(value) => value.clone(),
            Self::Failed { error, raw_text } => match raw_text {
                Some(raw) => json!({ "error": error, "raw_text": raw }),
                None => json!({ "error": error }),
            },
        }
    }
}

impl<'de> Deserialize<'de> for ModelOutcome {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl From<ExtractionError> for ModelOutcome {
    fn from(err: ExtractionError) -> Self {
        Self::failed(err.to_string())
    }
}

fn fenced_candidate(text: &str) -> &str {
    if let Some(start) = text.find(JSON_FENCE_OPEN) {
        let rest = &text[start + JSON_FENCE_OPEN.len()..];
        let end = rest.find(FENCE).unwrap_or(rest.len());
        return rest[..end].trim();
    }

    if let Some(start) = text.find(FENCE) {
        let rest = &text[start + FENCE.len()..];
        let end = rest.find(FENCE).unwrap_or(rest.len());
        let block = &rest[..end];
        // drop a language tag such as "JSON" or "javascript" on the fence line
        let block = match block.split_once('\n') {
            Some((tag, body)) if !tag.trim().is_empty() && tag.trim().chars().all(char::is_alphanumeric) => body,
            _ => block,
        };
        return block.trim();
    }

    text.trim()
}

/// Extracts the JSON payload from raw model text: a ```json block first, then
/// any fenced block, then the whole text. When that fails the fences are
/// stripped and parsing is retried once before giving up with
/// `{error, raw_text}`.
pub fn parse_model_text(text: &str) -> ModelOutcome {
    let candidate = fenced_candidate(text);
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => {
            debug!("Parsed model response ({} bytes)", text.len());
            ModelOutcome::from_value(value)
        }
        Err(first) => {
            error!("Error parsing JSON response: {}", first);
            debug!("Response text: {}", text);

            let stripped = text.replace(JSON_FENCE_OPEN, "").replace(FENCE, "");
            match serde_json::from_str::<Value>(stripped.trim()) {
                Ok(value) => ModelOutcome::from_value(value),
                Err(_) => ModelOutcome::Failed {
                    error: PARSE_FAILURE.to_string(),
                    raw_text: Some(text.to_string()),
                },
            }
        }
    }
}
