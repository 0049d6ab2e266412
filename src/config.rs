use crate::error::{ExtractionError, Result};
use crate::tree::IndexRule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-002";
pub const DEFAULT_DATABASE_PATH: &str = "data/extractions.json";

/// Settings for the document-understanding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Missing keys are reported per call, not at load time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: 2048,
            temperature: 0.0,
            top_p: 0.95,
            top_k: 40,
            request_timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub store: StoreConfig,
    pub index_rule: IndexRule,
}

impl AppConfig {
    /// Reads `GEMINI_API_KEY`, `GEMINI_MODEL`, `MAX_TOKENS`, `TEMPERATURE`,
    /// `REQUEST_TIMEOUT_SECS`, `DATABASE_PATH` and `SCHEMA_INDEX_RULE`.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with a caller-supplied variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(key) = get("GEMINI_API_KEY") {
            config.model.api_key = Some(key);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            config.model.model = model;
        }
        if let Some(raw) = get("MAX_TOKENS") {
            config.model.max_output_tokens = parse_var("MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = get("TEMPERATURE") {
            config.model.temperature = parse_var("TEMPERATURE", &raw)?;
        }
        if let Some(raw) = get("REQUEST_TIMEOUT_SECS") {
            config.model.request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(path) = get("DATABASE_PATH") {
            config.store.database_path = PathBuf::from(path);
        }
        if let Some(raw) = get("SCHEMA_INDEX_RULE") {
            config.index_rule = parse_index_rule(&raw)?;
        }
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ExtractionError::Configuration(format!("invalid configuration: {}", e)))
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ExtractionError::Configuration(format!("{}='{}': {}", key, raw, e)))
}

fn parse_index_rule(raw: &str) -> Result<IndexRule> {
    match raw.to_lowercase().as_str() {
        "full" | "full_sequence" => Ok(IndexRule::FullSequence),
        "prefix" | "inserted_prefix" => Ok(IndexRule::InsertedPrefix),
        other => Err(ExtractionError::Configuration(format!(
            "SCHEMA_INDEX_RULE='{}': expected 'full' or 'prefix'",
            other
        ))),
    }
}
