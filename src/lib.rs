//! # Extraction Schema Builder
//!
//! A library for defining hierarchical extraction schemas, turning them into
//! prompts for a document-understanding model, and making sense of whatever
//! JSON comes back.
//!
//! ## Core Concepts
//!
//! - **Flat schema**: an ordered list of [`FieldRecord`]s where children point at their
//!   parent by position or by name. This is the stored form.
//! - **Nested schema**: [`SchemaTreeNode`]s carrying their children inline. This is the
//!   editing form; [`to_tree`] and [`from_tree`] convert between the two.
//! - **Draft**: a caller-owned [`SchemaDraft`] that applies edits atomically.
//! - **Categorization**: [`categorize`] sorts an extraction result into invoice, vendor,
//!   customer, payment and other sections and drops flat keys already covered by a nested
//!   object.
//!
//! ## Example
//!
//! ```rust
//! use extraction_schema_builder::*;
//!
//! let fields = vec![
//!     FieldRecord::new("Invoice", FieldType::Object),
//!     FieldRecord::new("Number", FieldType::String).child_of("Invoice"),
//! ];
//!
//! let tree = to_tree(&fields, IndexRule::FullSequence).unwrap();
//! assert_eq!(tree[0].children[0].name, "Number");
//!
//! let flat = from_tree(&tree).unwrap();
//! assert_eq!(flat, fields);
//!
//! let prompt = build_extraction_prompt(&flat, IndexRule::FullSequence).unwrap();
//! assert!(prompt.contains("Contains fields: Number"));
//! ```

pub mod categorize;
pub mod config;
pub mod draft;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod response;
pub mod schema;
pub mod store;
pub mod templates;
pub mod tree;
pub mod utils;

#[cfg(feature = "gemini")]
pub mod llm;

pub use categorize::{
    categorize, categorize_outcome, categorize_value, classify_key, summarize_value, Bucket,
    CategorizedResult, LineItems, Placement, ResultValue,
};
pub use config::{AppConfig, ModelConfig, StoreConfig};
pub use draft::SchemaDraft;
pub use error::{ExtractionError, Result};
pub use model::{Document, DocumentModel};
pub use pipeline::{BatchRequest, ExtractionPipeline, HistoryEntry, ProcessedDocument};
pub use prompt::{build_extraction_prompt, PromptBuilder, OUTPUT_CONTRACT};
pub use render::{example_payload, render_outline, type_icon, FieldRow, FieldTable};
pub use response::{parse_model_text, ModelOutcome};
pub use schema::*;
pub use store::{
    ExtractionRecord, MemoryStore, NewExtraction, NewSchema, RecordId, SchemaRecord, SchemaStore,
};
pub use templates::{ensure_default_schema, standard_invoice_fields, starter_tree};
pub use tree::{
    from_tree, from_tree_value, to_indexed_refs, to_named_refs, to_tree, validate_schema,
    FieldHierarchy, IndexRule, ResolveMode,
};
pub use utils::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every derived view of one flat schema, as shown while editing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaPreview {
    pub tree: Vec<SchemaTreeNode>,
    pub outline: String,
    pub example: Value,
    pub prompt: String,
    pub table: FieldTable,
}

pub struct SchemaPreviewer;

impl SchemaPreviewer {
    /// Validates the schema the way a save would, then renders it.
    pub fn preview(fields: &[FieldRecord], rule: IndexRule) -> Result<SchemaPreview> {
        validate_schema(fields, rule)?;

        info!("Building preview for {} fields", fields.len());
        let tree = to_tree(fields, rule)?;
        debug!(
            "Preview tree has {} top-level nodes",
            tree.len()
        );

        Ok(SchemaPreview {
            outline: render_outline(fields, rule)?,
            example: example_payload(fields, rule)?,
            prompt: build_extraction_prompt(fields, rule)?,
            table: FieldTable::from_fields(fields),
            tree,
        })
    }
}

pub fn preview_schema(fields: &[FieldRecord], rule: IndexRule) -> Result<SchemaPreview> {
    SchemaPreviewer::preview(fields, rule)
}
