use crate::config::ModelConfig;
use crate::error::{ExtractionError, Result};
use crate::llm::types::*;
use crate::model::{Document, DocumentModel};
use crate::response::{parse_model_text, ModelOutcome};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, error, info};
use reqwest::Client;
use std::time::Duration;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client. Documents are sent inline, base64
/// encoded, after the prompt text.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Points the client at another endpoint, e.g. a local proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub(crate) fn build_request(&self, prompt: &str, documents: &[Document]) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        parts.extend(documents.iter().map(|doc| Part::InlineData {
            inline_data: Blob {
                mime_type: doc.mime_type.clone(),
                data: STANDARD.encode(&doc.bytes),
            },
        }));

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
            },
        }
    }

    pub(crate) async fn generate_content(&self, prompt: &str, documents: &[Document]) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ExtractionError::Configuration("GEMINI_API_KEY is not set".to_string()))?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.config.model, api_key
        );
        let payload = self.build_request(prompt, documents);

        let res = self.client.post(&url).json(&payload).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(ExtractionError::ModelCall(format!(
                "Gemini API Error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res.json().await?;
        body.first_text()
            .ok_or_else(|| ExtractionError::ModelCall("No candidates returned".to_string()))
    }
}

impl DocumentModel for GeminiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn process(&self, prompt: &str, documents: &[Document]) -> ModelOutcome {
        info!(
            "Sending {} document(s) to {}",
            documents.len(),
            self.config.model
        );
        match self.generate_content(prompt, documents).await {
            Ok(text) => {
                debug!("Model returned {} characters", text.len());
                parse_model_text(&text)
            }
            Err(e) => {
                error!("Error processing document with Gemini: {}", e);
                ModelOutcome::from(e)
            }
        }
    }
}
