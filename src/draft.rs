use crate::error::{ExtractionError, Result};
use crate::schema::{FieldRecord, FieldType, ParentRef, SchemaTreeNode};
use crate::store::{NewSchema, RecordId, SchemaRecord};
use crate::tree::{from_tree, to_tree, validate_schema, FieldHierarchy, IndexRule, ResolveMode};
use log::debug;
use serde::{Deserialize, Serialize};

pub const OBJECT_DESCRIPTION: &str = "Container for nested fields";

/// An in-progress schema owned by the caller.
///
/// Every edit is checked against a copy of the field list first, so a
/// rejected edit leaves the draft exactly as it was. Between edits the field
/// list always resolves strictly (no dangling or cyclic parents).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDraft {
    pub id: Option<RecordId>,
    pub name: String,
    pub description: String,
    fields: Vec<FieldRecord>,
    #[serde(default)]
    rule: IndexRule,
}

impl Default for SchemaDraft {
    fn default() -> Self {
        Self::new("", IndexRule::default())
    }
}

impl SchemaDraft {
    pub fn new(name: impl Into<String>, rule: IndexRule) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
            rule,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Starts a draft from an existing field list, rejecting it if it does not
    /// resolve.
    pub fn from_fields(name: impl Into<String>, fields: Vec<FieldRecord>, rule: IndexRule) -> Result<Self> {
        let mut draft = Self::new(name, rule);
        draft.commit(fields)?;
        Ok(draft)
    }

    /// Opens a stored schema for editing.
    pub fn from_record(record: &SchemaRecord, rule: IndexRule) -> Result<Self> {
        let mut draft = Self::from_fields(record.name.clone(), record.fields()?, rule)?;
        draft.id = Some(record.id);
        draft.description = record.description.clone();
        Ok(draft)
    }

    pub fn fields(&self) -> &[FieldRecord] {
        &self.fields
    }

    pub fn rule(&self) -> IndexRule {
        self.rule
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn commit(&mut self, candidate: Vec<FieldRecord>) -> Result<()> {
        FieldHierarchy::resolve(&candidate, self.rule, ResolveMode::Strict)?;
        self.fields = candidate;
        Ok(())
    }

    fn check_position(&self, position: usize) -> Result<&FieldRecord> {
        self.fields.get(position).ok_or_else(|| {
            ExtractionError::validation(
                format!("fields[{}]", position),
                format!("no field at this position (draft has {})", self.fields.len()),
            )
        })
    }

    fn check_new_name(&self, name: &str, except: Option<usize>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ExtractionError::validation(name, "field name must not be empty"));
        }
        let clash = self
            .fields
            .iter()
            .enumerate()
            .any(|(pos, f)| Some(pos) != except && f.name == name);
        if clash {
            return Err(ExtractionError::validation(
                name,
                "a field with this name already exists",
            ));
        }
        Ok(())
    }

    fn parent_ref_for(&self, parent: Option<usize>) -> Result<ParentRef> {
        let Some(position) = parent else {
            return Ok(ParentRef::None);
        };
        let target = self.check_position(position)?;
        if !target.field_type.is_object() {
            return Err(ExtractionError::validation(
                format!("fields[{}] ('{}')", position, target.name),
                format!("parent must be an object type, found {}", target.field_type),
            ));
        }
        Ok(ParentRef::ByName(target.name.clone()))
    }

    fn next_name(&self, prefix: &str) -> String {
        let mut n = self.fields.len() + 1;
        loop {
            let candidate = format!("{}_{}", prefix, n);
            if self.position_of(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Appends a string field named `field_{n}`; returns its position.
    pub fn add_field(&mut self, parent: Option<usize>) -> Result<usize> {
        let field = FieldRecord {
            parent_ref: self.parent_ref_for(parent)?,
            ..FieldRecord::new(self.next_name("field"), FieldType::String)
        };
        self.push_field(field)
    }

    /// Appends an empty object field named `object_{n}`; returns its position.
    pub fn add_object_field(&mut self, parent: Option<usize>) -> Result<usize> {
        let field = FieldRecord {
            parent_ref: self.parent_ref_for(parent)?,
            ..FieldRecord::new(self.next_name("object"), FieldType::Object)
                .with_description(OBJECT_DESCRIPTION)
        };
        self.push_field(field)
    }

    pub fn push_field(&mut self, field: FieldRecord) -> Result<usize> {
        self.check_new_name(&field.name, None)?;
        let mut candidate = self.fields.clone();
        candidate.push(field);
        self.commit(candidate)?;
        Ok(self.fields.len() - 1)
    }

    /// Removes a field together with all of its descendants and returns them.
    /// Index references of the remaining fields are shifted to match.
    pub fn remove_field(&mut self, position: usize) -> Result<Vec<FieldRecord>> {
        self.check_position(position)?;
        let hierarchy = FieldHierarchy::resolve(&self.fields, self.rule, ResolveMode::Strict)?;
        let mut doomed = hierarchy.subtree(position);
        doomed.sort_unstable();

        let mut removed = Vec::with_capacity(doomed.len());
        let mut candidate = Vec::with_capacity(self.fields.len() - doomed.len());
        for (pos, field) in self.fields.iter().enumerate() {
            if doomed.binary_search(&pos).is_ok() {
                removed.push(field.clone());
                continue;
            }
            let mut field = field.clone();
            if let ParentRef::ByIndex(index) = field.parent_ref {
                let shift = doomed.partition_point(|&d| d < index);
                field.parent_ref = ParentRef::ByIndex(index - shift);
            }
            candidate.push(field);
        }

        self.commit(candidate)?;
        debug!(
            "Removed {} field(s) starting at position {}",
            removed.len(),
            position
        );
        Ok(removed)
    }

    /// Renames a field and rewrites name references held by its children.
    pub fn rename_field(&mut self, position: usize, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        self.check_position(position)?;
        self.check_new_name(&new_name, Some(position))?;

        let hierarchy = FieldHierarchy::resolve(&self.fields, self.rule, ResolveMode::Strict)?;
        let children = hierarchy.children_of(position).to_vec();

        let mut candidate = self.fields.clone();
        candidate[position].name = new_name.clone();
        for child in children {
            if let ParentRef::ByName(_) = candidate[child].parent_ref {
                candidate[child].parent_ref = ParentRef::ByName(new_name.clone());
            }
        }
        self.commit(candidate)
    }

    /// Moves a field (and its subtree) under another object, or to the top
    /// level with `None`.
    pub fn reparent_field(&mut self, position: usize, new_parent: Option<usize>) -> Result<()> {
        let field = self.check_position(position)?;
        if let Some(target) = new_parent {
            let label = format!("fields[{}] ('{}')", position, field.name);
            if target == position {
                return Err(ExtractionError::validation(
                    label,
                    "a field cannot be its own parent",
                ));
            }
            self.check_position(target)?;
            let hierarchy = FieldHierarchy::resolve(&self.fields, self.rule, ResolveMode::Strict)?;
            if hierarchy.is_descendant(target, position) {
                return Err(ExtractionError::validation(
                    label,
                    "cannot move a field under one of its own descendants",
                ));
            }
        }

        let parent_ref = self.parent_ref_for(new_parent)?;
        let mut candidate = self.fields.clone();
        candidate[position].parent_ref = parent_ref;
        self.commit(candidate)
    }

    /// Changes a field's type. An object that still has children keeps its
    /// type.
    pub fn set_field_type(&mut self, position: usize, field_type: FieldType) -> Result<()> {
        let field = self.check_position(position)?;
        if field.field_type.is_object() && !field_type.is_object() {
            let hierarchy = FieldHierarchy::resolve(&self.fields, self.rule, ResolveMode::Strict)?;
            let children = hierarchy.children_of(position).len();
            if children > 0 {
                return Err(ExtractionError::validation(
                    format!("fields[{}] ('{}')", position, field.name),
                    format!(
                        "cannot change an object with {} children to {}",
                        children, field_type
                    ),
                ));
            }
        }
        let mut candidate = self.fields.clone();
        candidate[position].field_type = field_type;
        self.commit(candidate)
    }

    pub fn set_required(&mut self, position: usize, required: bool) -> Result<()> {
        self.check_position(position)?;
        self.fields[position].required = required;
        Ok(())
    }

    pub fn set_description(&mut self, position: usize, description: impl Into<String>) -> Result<()> {
        self.check_position(position)?;
        self.fields[position].description = description.into();
        Ok(())
    }

    /// Replaces the field list with the flattened form of `nodes`.
    pub fn load_tree(&mut self, nodes: &[SchemaTreeNode]) -> Result<()> {
        let candidate = from_tree(nodes)?;
        self.commit(candidate)
    }

    pub fn to_tree(&self) -> Result<Vec<SchemaTreeNode>> {
        to_tree(&self.fields, self.rule)
    }

    pub fn validate(&self) -> Result<()> {
        validate_schema(&self.fields, self.rule)
    }

    /// Save-time checks plus serialization, ready for `SchemaStore::save_schema`.
    pub fn to_new_schema(&self) -> Result<NewSchema> {
        NewSchema::from_fields(&self.name, &self.description, &self.fields, self.rule)
    }
}
