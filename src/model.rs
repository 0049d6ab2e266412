use crate::response::ModelOutcome;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A document handed to the model: raw bytes plus the mime type the model
/// should interpret them as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads a file and guesses its mime type from the extension.
    #[cfg(feature = "gemini")]
    pub async fn from_path(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                crate::error::ExtractionError::validation(
                    path.display().to_string(),
                    "invalid file name",
                )
            })?
            .to_string();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// The document-understanding collaborator.
///
/// Implementations never fail outright: auth problems, transport errors and
/// unparsable responses all come back as `ModelOutcome::Failed`.
pub trait DocumentModel: Send + Sync {
    /// Identifier recorded alongside persisted results.
    fn name(&self) -> &str;

    fn process(
        &self,
        prompt: &str,
        documents: &[Document],
    ) -> impl Future<Output = ModelOutcome> + Send;
}
