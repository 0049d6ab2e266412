use crate::categorize::{categorize_outcome, CategorizedResult};
use crate::error::{ExtractionError, Result};
use crate::model::{Document, DocumentModel};
use crate::prompt::PromptBuilder;
use crate::response::ModelOutcome;
use crate::store::{ExtractionRecord, NewExtraction, RecordId, SchemaStore};
use crate::tree::IndexRule;
use futures::stream::{self, StreamExt};
use log::{error, info, warn};

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub schema_id: RecordId,
    pub documents: Vec<Document>,
}

impl BatchRequest {
    pub fn new(schema_id: RecordId, documents: Vec<Document>) -> Self {
        Self {
            schema_id,
            documents,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub schema_id: RecordId,
    pub file_name: String,
    pub outcome: ModelOutcome,
    /// Set when the outcome was a success and got persisted.
    pub extraction_id: Option<RecordId>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub record: ExtractionRecord,
    /// `None` when the stored result is not a mapping or not valid JSON.
    pub categorized: Option<CategorizedResult>,
}

/// Schema lookup, prompt construction, model call and persistence for one
/// or many documents.
pub struct ExtractionPipeline<M, S> {
    model: M,
    store: S,
    prompts: PromptBuilder,
}

impl<M: DocumentModel, S: SchemaStore> ExtractionPipeline<M, S> {
    pub fn new(model: M, store: S, rule: IndexRule) -> Self {
        Self {
            model,
            store,
            prompts: PromptBuilder::new(rule),
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The exact prompt that `process_document` would send for a schema.
    pub fn prompt_for(&self, schema_id: RecordId) -> Result<String> {
        let schema = self
            .store
            .get_schema(schema_id)?
            .ok_or_else(|| ExtractionError::NotFound(format!("schema {}", schema_id)))?;
        self.prompts.build(&schema.fields()?)
    }

    /// Runs one extraction. Model failures come back inside the result and
    /// are not persisted; schema, prompt and store problems are errors.
    pub async fn process_document(
        &self,
        schema_id: RecordId,
        documents: &[Document],
    ) -> Result<ProcessedDocument> {
        if documents.is_empty() {
            return Err(ExtractionError::validation(
                "documents",
                "at least one document is required",
            ));
        }
        let prompt = self.prompt_for(schema_id)?;
        let file_name = documents
            .iter()
            .map(|d| d.file_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        info!(
            "Processing {} with schema {} using {}",
            file_name,
            schema_id,
            self.model.name()
        );
        let outcome = self.model.process(&prompt, documents).await;

        let extraction_id = match &outcome {
            ModelOutcome::Extracted(value) => {
                let extraction = NewExtraction::new(schema_id, &file_name, self.model.name(), value)?;
                let id = self.store.save_extraction(extraction)?;
                info!("Stored extraction {} for {}", id, file_name);
                Some(id)
            }
            ModelOutcome::Failed { error, .. } => {
                error!("Extraction of {} failed: {}", file_name, error);
                None
            }
        };

        Ok(ProcessedDocument {
            schema_id,
            file_name,
            outcome,
            extraction_id,
        })
    }

    /// Processes independent requests with at most `concurrency` model calls
    /// in flight. Results line up with `requests`.
    pub async fn process_batch(
        &self,
        requests: Vec<BatchRequest>,
        concurrency: usize,
    ) -> Vec<Result<ProcessedDocument>> {
        let total = requests.len();
        let mut results: Vec<(usize, Result<ProcessedDocument>)> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| async move {
                let result = self.process_document(request.schema_id, &request.documents).await;
                (index, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!("Batch finished: {} requests, {} errors", total, failed);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Recent extractions paired with their categorized view.
    pub fn history(&self, schema_id: Option<RecordId>, limit: usize) -> Result<Vec<HistoryEntry>> {
        let records = self.store.list_extractions(schema_id, limit)?;
        Ok(records
            .into_iter()
            .map(|record| {
                let categorized = record
                    .outcome()
                    .and_then(|outcome| categorize_outcome(&outcome));
                let categorized = match categorized {
                    Ok(c) => Some(c),
                    Err(e) => {
                        warn!("Cannot categorize extraction {}: {}", record.id, e);
                        None
                    }
                };
                HistoryEntry {
                    record,
                    categorized,
                }
            })
            .collect())
    }
}
