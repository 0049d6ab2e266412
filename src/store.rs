use crate::error::{ExtractionError, Result};
use crate::response::ModelOutcome;
use crate::schema::{parse_flat_fields, FieldRecord};
use crate::tree::{validate_schema, IndexRule};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub type RecordId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Serialized flat field list.
    pub fields_json: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SchemaRecord {
    pub fn fields(&self) -> Result<Vec<FieldRecord>> {
        decode_fields(&self.fields_json)
    }
}

fn decode_fields(fields_json: &str) -> Result<Vec<FieldRecord>> {
    let raw: Value = serde_json::from_str(fields_json)?;
    parse_flat_fields(&raw)
}

/// A validated schema ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchema {
    pub name: String,
    pub description: String,
    pub fields_json: String,
}

impl NewSchema {
    /// Runs save-time validation (named schema, at least one field, unique
    /// names, resolvable parents) and serializes the field list.
    pub fn from_fields(
        name: &str,
        description: &str,
        fields: &[FieldRecord],
        rule: IndexRule,
    ) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ExtractionError::validation("schema name", "must not be empty"));
        }
        if fields.is_empty() {
            return Err(ExtractionError::validation(
                format!("schema '{}'", name),
                "at least one field is required",
            ));
        }
        validate_schema(fields, rule)?;

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            fields_json: serde_json::to_string(fields)?,
        })
    }

    pub fn fields(&self) -> Result<Vec<FieldRecord>> {
        decode_fields(&self.fields_json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub id: RecordId,
    pub schema_id: RecordId,
    pub file_name: String,
    pub model_used: String,
    pub result_json: String,
    pub created_at: DateTime<Utc>,
    /// Name of the owning schema at read time.
    #[serde(default)]
    pub schema_name: String,
}

impl ExtractionRecord {
    pub fn result(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.result_json)?)
    }

    pub fn outcome(&self) -> Result<ModelOutcome> {
        self.result().map(ModelOutcome::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExtraction {
    pub schema_id: RecordId,
    pub file_name: String,
    pub model_used: String,
    pub result_json: String,
    pub created_at: DateTime<Utc>,
}

impl NewExtraction {
    pub fn new(
        schema_id: RecordId,
        file_name: impl Into<String>,
        model_used: impl Into<String>,
        result: &Value,
    ) -> Result<Self> {
        Ok(Self {
            schema_id,
            file_name: file_name.into(),
            model_used: model_used.into(),
            result_json: serde_json::to_string(result)?,
            created_at: Utc::now(),
        })
    }
}

/// Persistence collaborator for schemas and extraction results.
pub trait SchemaStore: Send + Sync {
    /// All schemas ordered by id.
    fn list_schemas(&self) -> Result<Vec<SchemaRecord>>;

    fn get_schema(&self, id: RecordId) -> Result<Option<SchemaRecord>>;

    /// Inserts when `id` is `None`, otherwise updates that schema.
    fn save_schema(&self, schema: NewSchema, id: Option<RecordId>) -> Result<RecordId>;

    /// Refused while any extraction still references the schema.
    fn delete_schema(&self, id: RecordId) -> Result<()>;

    /// Newest first, optionally restricted to one schema.
    fn list_extractions(&self, schema_id: Option<RecordId>, limit: usize) -> Result<Vec<ExtractionRecord>>;

    fn get_extraction(&self, id: RecordId) -> Result<Option<ExtractionRecord>>;

    fn save_extraction(&self, extraction: NewExtraction) -> Result<RecordId>;

    fn delete_extraction(&self, id: RecordId) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    last_schema_id: RecordId,
    #[serde(default)]
    last_extraction_id: RecordId,
    #[serde(default)]
    schemas: Vec<SchemaRecord>,
    #[serde(default)]
    extractions: Vec<ExtractionRecord>,
}

impl StoreState {
    fn schema_name(&self, id: RecordId) -> String {
        self.schemas
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn with_schema_name(&self, record: &ExtractionRecord) -> ExtractionRecord {
        ExtractionRecord {
            schema_name: self.schema_name(record.schema_id),
            ..record.clone()
        }
    }
}

/// In-memory store, optionally mirrored to a JSON file.
///
/// Each mutation runs against the locked state and, when file-backed, is
/// written out before the lock is released. If the write fails the state is
/// restored to its previous value.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path: None,
        }
    }

    /// Loads `path` if it exists, otherwise creates it (and its directory).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let state: StoreState = serde_json::from_str(&raw).map_err(|e| {
                ExtractionError::Persistence(format!(
                    "cannot read store file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            info!(
                "Loaded {} schemas and {} extractions from {}",
                state.schemas.len(),
                state.extractions.len(),
                path.display()
            );
            state
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let state = StoreState::default();
            write_state(&path, &state)?;
            info!("Created store file {}", path.display());
            state
        };

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&*self.state.read())
    }

    /// Applies `f` all-or-nothing: an error from `f` or from the file write
    /// leaves the state untouched.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write();
        let snapshot = state.clone();

        let value = match f(&mut *state) {
            Ok(value) => value,
            Err(e) => {
                *state = snapshot;
                return Err(e);
            }
        };

        if let Some(path) = &self.path {
            if let Err(e) = write_state(path, &state) {
                error!("Store write to {} failed, rolling back: {}", path.display(), e);
                *state = snapshot;
                return Err(e);
            }
        }
        Ok(value)
    }
}

fn write_state(path: &Path, state: &StoreState) -> Result<()> {
    let temp_file = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(&temp_file, json)
        .and_then(|_| std::fs::rename(&temp_file, path))
        .map_err(|e| ExtractionError::Persistence(format!("{}: {}", path.display(), e)))?;
    debug!("Wrote store file {}", path.display());
    Ok(())
}

impl SchemaStore for MemoryStore {
    fn list_schemas(&self) -> Result<Vec<SchemaRecord>> {
        Ok(self.read(|state| {
            let mut schemas = state.schemas.clone();
            schemas.sort_by_key(|s| s.id);
            schemas
        }))
    }

    fn get_schema(&self, id: RecordId) -> Result<Option<SchemaRecord>> {
        Ok(self.read(|state| state.schemas.iter().find(|s| s.id == id).cloned()))
    }

    fn save_schema(&self, schema: NewSchema, id: Option<RecordId>) -> Result<RecordId> {
        let now = Utc::now();
        let saved = self.mutate(|state| match id {
            Some(id) => {
                let record = state
                    .schemas
                    .iter_mut()
                    .find(|s| s.id == id)
                    .ok_or_else(|| ExtractionError::NotFound(format!("schema {}", id)))?;
                record.name = schema.name;
                record.description = schema.description;
                record.fields_json = schema.fields_json;
                record.updated_at = now;
                Ok(id)
            }
            None => {
                state.last_schema_id += 1;
                let id = state.last_schema_id;
                state.schemas.push(SchemaRecord {
                    id,
                    name: schema.name,
                    description: schema.description,
                    fields_json: schema.fields_json,
                    created_at: now,
                    updated_at: now,
                });
                Ok(id)
            }
        })?;
        info!("Saved schema {}", saved);
        Ok(saved)
    }

    fn delete_schema(&self, id: RecordId) -> Result<()> {
        self.mutate(|state| {
            let position = state
                .schemas
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| ExtractionError::NotFound(format!("schema {}", id)))?;
            let in_use = state.extractions.iter().filter(|e| e.schema_id == id).count();
            if in_use > 0 {
                error!("Cannot delete schema {}: it is used by {} extractions", id, in_use);
                return Err(ExtractionError::Persistence(format!(
                    "schema {} is used by {} extractions",
                    id, in_use
                )));
            }
            state.schemas.remove(position);
            Ok(())
        })?;
        info!("Deleted schema {}", id);
        Ok(())
    }

    fn list_extractions(&self, schema_id: Option<RecordId>, limit: usize) -> Result<Vec<ExtractionRecord>> {
        Ok(self.read(|state| {
            let mut records: Vec<ExtractionRecord> = state
                .extractions
                .iter()
                .filter(|e| schema_id.map_or(true, |id| e.schema_id == id))
                .map(|e| state.with_schema_name(e))
                .collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            records.truncate(limit);
            records
        }))
    }

    fn get_extraction(&self, id: RecordId) -> Result<Option<ExtractionRecord>> {
        Ok(self.read(|state| {
            state
                .extractions
                .iter()
                .find(|e| e.id == id)
                .map(|e| state.with_schema_name(e))
        }))
    }

    fn save_extraction(&self, extraction: NewExtraction) -> Result<RecordId> {
        let id = self.mutate(|state| {
            if !state.schemas.iter().any(|s| s.id == extraction.schema_id) {
                return Err(ExtractionError::NotFound(format!(
                    "schema {}",
                    extraction.schema_id
                )));
            }
            state.last_extraction_id += 1;
            let id = state.last_extraction_id;
            state.extractions.push(ExtractionRecord {
                id,
                schema_id: extraction.schema_id,
                file_name: extraction.file_name,
                model_used: extraction.model_used,
                result_json: extraction.result_json,
                created_at: extraction.created_at,
                schema_name: String::new(),
            });
            Ok(id)
        })?;
        info!("Saved extraction {}", id);
        Ok(id)
    }

    fn delete_extraction(&self, id: RecordId) -> Result<()> {
        self.mutate(|state| {
            let position = state
                .extractions
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| ExtractionError::NotFound(format!("extraction {}", id)))?;
            state.extractions.remove(position);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn sample_schema(name: &str) -> NewSchema {
        let fields = vec![
            FieldRecord::new("invoice_number", FieldType::String).required(),
            FieldRecord::new("total", FieldType::Number),
        ];
        NewSchema::from_fields(name, "test schema", &fields, IndexRule::FullSequence).unwrap()
    }

    #[test]
    fn test_new_schema_validation() {
        let dupes = vec![
            FieldRecord::new("a", FieldType::String),
            FieldRecord::new("a", FieldType::Number),
        ];
        assert!(NewSchema::from_fields("S", "", &dupes, IndexRule::FullSequence)
            .unwrap_err()
            .is_validation());

        let dangling = vec![FieldRecord::new("a", FieldType::String).child_of("nope")];
        assert!(NewSchema::from_fields("S", "", &dangling, IndexRule::FullSequence).is_err());
        assert!(NewSchema::from_fields("  ", "", &[], IndexRule::FullSequence).is_err());

        let schema = sample_schema("  Trimmed ");
        assert_eq!(schema.name, "Trimmed");
        assert_eq!(schema.fields().unwrap().len(), 2);
    }

    #[test]
    fn test_schema_crud() {
        let store = MemoryStore::new();
        let a = store.save_schema(sample_schema("A"), None).unwrap();
        let b = store.save_schema(sample_schema("B"), None).unwrap();
        assert_eq!((a, b), (1, 2));

        store.save_schema(sample_schema("A2"), Some(a)).unwrap();
        let record = store.get_schema(a).unwrap().unwrap();
        assert_eq!(record.name, "A2");
        assert!(record.updated_at >= record.created_at);

        assert!(matches!(
            store.save_schema(sample_schema("C"), Some(99)),
            Err(ExtractionError::NotFound(_))
        ));

        let names: Vec<String> = store.list_schemas().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["A2", "B"]);

        store.delete_schema(b).unwrap();
        assert!(store.get_schema(b).unwrap().is_none());
        assert!(store.delete_schema(b).is_err());
    }

    #[test]
    fn test_delete_in_use_schema_refused() {
        let store = MemoryStore::new();
        let id = store.save_schema(sample_schema("A"), None).unwrap();
        let extraction = NewExtraction::new(id, "a.pdf", "mock", &json!({"total": 1})).unwrap();
        let ext_id = store.save_extraction(extraction).unwrap();

        assert!(matches!(
            store.delete_schema(id),
            Err(ExtractionError::Persistence(_))
        ));
        assert!(store.get_schema(id).unwrap().is_some());

        store.delete_extraction(ext_id).unwrap();
        store.delete_schema(id).unwrap();
    }

    #[test]
    fn test_extractions_newest_first_with_schema_name() {
        let store = MemoryStore::new();
        let a = store.save_schema(sample_schema("A"), None).unwrap();
        let b = store.save_schema(sample_schema("B"), None).unwrap();

        let base = Utc::now();
        for (i, schema_id) in [a, b, a].into_iter().enumerate() {
            let mut extraction =
                NewExtraction::new(schema_id, format!("doc{}.pdf", i), "mock", &json!({"i": i})).unwrap();
            extraction.created_at = base + chrono::Duration::seconds(i as i64);
            store.save_extraction(extraction).unwrap();
        }

        let all = store.list_extractions(None, 10).unwrap();
        let files: Vec<&str> = all.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(files, vec!["doc2.pdf", "doc1.pdf", "doc0.pdf"]);
        assert_eq!(all[1].schema_name, "B");

        let only_a = store.list_extractions(Some(a), 1).unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].file_name, "doc2.pdf");
        assert_eq!(only_a[0].result().unwrap(), json!({"i": 2}));

        store.save_schema(sample_schema("Renamed"), Some(a)).unwrap();
        let record = store.get_extraction(only_a[0].id).unwrap().unwrap();
        assert_eq!(record.schema_name, "Renamed");
    }

    #[test]
    fn test_extraction_for_unknown_schema_is_not_found() {
        let store = MemoryStore::new();
        let extraction = NewExtraction::new(5, "x.png", "mock", &json!({})).unwrap();
        assert!(matches!(
            store.save_extraction(extraction),
            Err(ExtractionError::NotFound(_))
        ));
        assert!(store.list_extractions(None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_reopens_and_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = MemoryStore::open(&path).unwrap();
        let id = store.save_schema(sample_schema("Persisted"), None).unwrap();
        drop(store);

        let store = MemoryStore::open(&path).unwrap();
        assert_eq!(store.get_schema(id).unwrap().unwrap().name, "Persisted");

        // block the temp file so the next write fails
        std::fs::create_dir(path.with_extension("tmp")).unwrap();
        assert!(matches!(
            store.save_schema(sample_schema("Lost"), None),
            Err(ExtractionError::Persistence(_))
        ));
        assert_eq!(store.list_schemas().unwrap().len(), 1);

        std::fs::remove_dir(path.with_extension("tmp")).unwrap();
        let next = store.save_schema(sample_schema("Second"), None).unwrap();
        assert_eq!(next, id + 1);
    }

    #[test]
    fn test_corrupt_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            MemoryStore::open(&path),
            Err(ExtractionError::Persistence(_))
        ));
    }
}
