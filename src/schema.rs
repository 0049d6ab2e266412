use crate::error::{ExtractionError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Deepest nesting level a schema may use; top-level fields sit at depth 0.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[schemars(description = "Free text value")]
    String,

    #[schemars(description = "Decimal number such as an amount or a quantity")]
    Number,

    #[schemars(description = "Whole number")]
    Integer,

    #[schemars(description = "True/false flag")]
    Boolean,

    #[schemars(description = "Calendar date, emitted by the model as an ISO string")]
    Date,

    #[serde(alias = "array")]
    #[schemars(description = "Repeated entries; the model returns an array of objects")]
    List,

    #[schemars(description = "Container whose child fields reference it as their parent")]
    Object,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Integer,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::List,
        FieldType::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::List => "list",
            FieldType::Object => "object",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Object)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "integer" => Ok(FieldType::Integer),
            "boolean" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "list" | "array" => Ok(FieldType::List),
            "object" => Ok(FieldType::Object),
            other => Err(format!(
                "unknown field type '{}', expected one of string, number, integer, boolean, date, list, object",
                other
            )),
        }
    }
}

/// Pointer from a child field to the object field that contains it.
///
/// Serialized as `null`, a non-negative integer (position in the field list)
/// or a string (the parent's name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParentRef {
    #[default]
    None,
    ByIndex(usize),
    ByName(String),
}

impl ParentRef {
    pub fn is_none(&self) -> bool {
        matches!(self, ParentRef::None)
    }
}

// An empty parent name means top-level, matching `parse_flat_fields`.
fn deserialize_parent_ref<'de, D>(deserializer: D) -> std::result::Result<ParentRef, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ParentRef::deserialize(deserializer)? {
        ParentRef::ByName(name) if name.is_empty() => ParentRef::None,
        other => other,
    })
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::None => f.write_str("none"),
            ParentRef::ByIndex(i) => write!(f, "#{}", i),
            ParentRef::ByName(name) => write!(f, "'{}'", name),
        }
    }
}

/// One field of a flat schema, the canonical storage form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldRecord {
    #[schemars(description = "Key the model must use for this field. Unique within a schema.")]
    pub name: String,

    #[serde(default)]
    #[schemars(description = "What the field holds; passed to the model verbatim")]
    pub description: String,

    #[serde(alias = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    #[serde(
        default,
        deserialize_with = "deserialize_parent_ref",
        rename = "parent",
        alias = "parent_id",
        alias = "parent_field"
    )]
    #[schemars(
        description = "Containing object field: null for top-level fields, an index into the field list, or the parent's name"
    )]
    pub parent_ref: ParentRef,
}

impl FieldRecord {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            field_type,
            required: false,
            parent_ref: ParentRef::None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent_ref = ParentRef::ByName(parent.into());
        self
    }

    pub fn child_of_index(mut self, index: usize) -> Self {
        self.parent_ref = ParentRef::ByIndex(index);
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_ref.is_none()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Vec<FieldRecord>)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Nested form of a schema field. Parent linkage is containment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaTreeNode {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type", alias = "field_type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Child fields; only object nodes may have children")]
    pub children: Vec<SchemaTreeNode>,
}

impl SchemaTreeNode {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            field_type,
            required: false,
            children: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_children(mut self, children: Vec<SchemaTreeNode>) -> Self {
        self.children = children;
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Vec<SchemaTreeNode>)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// JSON Schema of the flat persisted form.
pub fn flat_json_schema() -> Result<Value> {
    Ok(serde_json::to_value(FieldRecord::generate_json_schema())?)
}

/// JSON Schema of the nested form.
pub fn tree_json_schema() -> Result<Value> {
    Ok(serde_json::to_value(SchemaTreeNode::generate_json_schema())?)
}

struct CommonAttributes {
    name: String,
    description: String,
    field_type: FieldType,
    required: bool,
}

fn describe_location(path: &str, obj: &Map<String, Value>) -> String {
    match obj.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => format!("{} ('{}')", path, name),
        _ => path.to_string(),
    }
}

fn read_common(obj: &Map<String, Value>, path: &str, type_keys: &[&str]) -> Result<CommonAttributes> {
    let location = describe_location(path, obj);

    let name = match obj.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) => {
            return Err(ExtractionError::validation(location, "'name' must not be empty"))
        }
        Some(_) => return Err(ExtractionError::validation(location, "'name' must be a string")),
        None => return Err(ExtractionError::validation(location, "missing required key 'name'")),
    };

    let raw_type = type_keys
        .iter()
        .find_map(|key| obj.get(*key))
        .ok_or_else(|| {
            ExtractionError::validation(
                location.clone(),
                format!("missing required key '{}'", type_keys[0]),
            )
        })?;
    let field_type = raw_type
        .as_str()
        .ok_or_else(|| ExtractionError::validation(location.clone(), "field type must be a string"))?
        .parse::<FieldType>()
        .map_err(|e| ExtractionError::validation(location.clone(), e))?;

    let description = match obj.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ExtractionError::validation(location, "'description' must be a string"))
        }
    };

    let required = match obj.get("required") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(ExtractionError::validation(location, "'required' must be a boolean")),
    };

    Ok(CommonAttributes {
        name,
        description,
        field_type,
        required,
    })
}

fn read_parent(obj: &Map<String, Value>, location: &str) -> Result<ParentRef> {
    let raw = ["parent", "parent_id", "parent_field"]
        .iter()
        .find_map(|key| obj.get(*key));

    match raw {
        None | Some(Value::Null) => Ok(ParentRef::None),
        Some(Value::String(s)) if s.is_empty() => Ok(ParentRef::None),
        Some(Value::String(s)) => Ok(ParentRef::ByName(s.clone())),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|i| ParentRef::ByIndex(i as usize))
            .ok_or_else(|| {
                ExtractionError::validation(
                    location,
                    format!("parent index {} must be a non-negative integer", n),
                )
            }),
        Some(other) => Err(ExtractionError::validation(
            location,
            format!("parent must be null, an index or a name, got {}", other),
        )),
    }
}

/// Parses raw JSON into a flat field list, rejecting the whole input on the
/// first malformed element.
pub fn parse_flat_fields(value: &Value) -> Result<Vec<FieldRecord>> {
    let items = value.as_array().ok_or_else(|| {
        ExtractionError::validation("fields", "expected an array of field objects")
    })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let path = format!("fields[{}]", i);
            let obj = item
                .as_object()
                .ok_or_else(|| ExtractionError::validation(path.clone(), "expected an object"))?;
            let common = read_common(obj, &path, &["field_type", "type"])?;
            let parent_ref = read_parent(obj, &describe_location(&path, obj))?;
            Ok(FieldRecord {
                name: common.name,
                description: common.description,
                field_type: common.field_type,
                required: common.required,
                parent_ref,
            })
        })
        .collect()
}

/// Parses raw JSON into nested schema nodes. Errors carry the node path,
/// e.g. `nodes[0].children[2] ('Street')`.
pub fn parse_tree_nodes(value: &Value) -> Result<Vec<SchemaTreeNode>> {
    let items = value.as_array().ok_or_else(|| {
        ExtractionError::validation("nodes", "expected an array of schema nodes")
    })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_tree_node(item, &format!("nodes[{}]", i), 0))
        .collect()
}

fn parse_tree_node(value: &Value, path: &str, depth: usize) -> Result<SchemaTreeNode> {
    let obj = value
        .as_object()
        .ok_or_else(|| ExtractionError::validation(path, "expected an object"))?;
    if depth > MAX_DEPTH {
        return Err(ExtractionError::validation(
            describe_location(path, obj),
            format!("node is nested {} levels deep, the limit is {}", depth, MAX_DEPTH),
        ));
    }
    let common = read_common(obj, path, &["type", "field_type"])?;

    let children = match obj.get("children") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, child)| {
                parse_tree_node(child, &format!("{}.children[{}]", path, i), depth + 1)
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(ExtractionError::validation(
                describe_location(path, obj),
                "'children' must be an array",
            ))
        }
    };

    Ok(SchemaTreeNode {
        name: common.name,
        description: common.description,
        field_type: common.field_type,
        required: common.required,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parent_ref_serialization_forms() {
        let fields = vec![
            FieldRecord::new("vendor", FieldType::Object),
            FieldRecord::new("name", FieldType::String).child_of("vendor"),
            FieldRecord::new("tax_id", FieldType::String).child_of_index(0),
        ];

        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value[0]["parent"], Value::Null);
        assert_eq!(value[1]["parent"], json!("vendor"));
        assert_eq!(value[2]["parent"], json!(0));

        let back: Vec<FieldRecord> = serde_json::from_value(value).unwrap();
        assert_eq!(back, fields);
    }

    #[test]
    fn test_legacy_keys_are_accepted() {
        let raw = json!([
            {"name": "items", "type": "array"},
            {"name": "box", "field_type": "object"},
            {"name": "inner", "field_type": "string", "parent_id": 1}
        ]);
        let fields: Vec<FieldRecord> = serde_json::from_value(raw).unwrap();
        assert_eq!(fields[0].field_type, FieldType::List);
        assert_eq!(fields[2].parent_ref, ParentRef::ByIndex(1));
        assert_eq!(fields[2].description, "");
        assert!(!fields[2].required);
    }

    #[test]
    fn test_parse_flat_fields_reports_offending_index() {
        let raw = json!([
            {"name": "invoice_number", "type": "string"},
            {"name": "total", "description": "no type here"}
        ]);
        let err = parse_flat_fields(&raw).unwrap_err();
        match err {
            ExtractionError::SchemaValidation { field, details } => {
                assert!(field.contains("fields[1]"));
                assert!(field.contains("total"));
                assert!(details.contains("field_type"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_flat_fields_rejects_negative_parent() {
        let raw = json!([{"name": "a", "type": "string", "parent": -1}]);
        assert!(parse_flat_fields(&raw).unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_tree_nodes_reports_nested_path() {
        let raw = json!([
            {
                "name": "Invoice",
                "type": "object",
                "children": [
                    {"name": "Number", "type": "string"},
                    {"type": "string"}
                ]
            }
        ]);
        let err = parse_tree_nodes(&raw).unwrap_err();
        assert!(err.to_string().contains("nodes[0].children[1]"));
    }

    #[test]
    fn test_parse_tree_nodes_ignores_parent_key() {
        let raw = json!([
            {
                "name": "Vendor Information",
                "type": "object",
                "parent": null,
                "children": [
                    {"name": "Vendor Name", "type": "string", "parent": "Vendor Information"}
                ]
            }
        ]);
        let nodes = parse_tree_nodes(&raw).unwrap();
        assert_eq!(nodes[0].children.len(), 1);
        assert_eq!(nodes[0].count(), 2);
    }

    #[test]
    fn test_empty_parent_name_reads_as_top_level() {
        let raw = json!([
            {"name": "total", "type": "number", "parent": ""},
            {"name": "currency", "type": "string", "parent_field": ""}
        ]);
        let derived: Vec<FieldRecord> = serde_json::from_value(raw.clone()).unwrap();
        let parsed = parse_flat_fields(&raw).unwrap();
        assert_eq!(derived, parsed);
        assert!(derived.iter().all(|f| f.parent_ref.is_none()));
    }

    fn nested_chain(levels: usize) -> Value {
        let mut node = json!({"name": format!("n{}", levels - 1), "type": "string"});
        for i in (0..levels - 1).rev() {
            node = json!({"name": format!("n{}", i), "type": "object", "children": [node]});
        }
        json!([node])
    }

    #[test]
    fn test_parse_tree_nodes_enforces_depth_limit() {
        let nodes = parse_tree_nodes(&nested_chain(MAX_DEPTH + 1)).unwrap();
        assert_eq!(nodes[0].count(), MAX_DEPTH + 1);

        let err = parse_tree_nodes(&nested_chain(MAX_DEPTH + 2)).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains(&format!("n{}", MAX_DEPTH + 1)));
    }

    #[test]
    fn test_unknown_field_type() {
        let raw = json!([{"name": "x", "type": "decimal"}]);
        let err = parse_flat_fields(&raw).unwrap_err();
        assert!(err.to_string().contains("unknown field type"));
    }

    #[test]
    fn test_schema_generation() {
        let flat = FieldRecord::schema_as_json().unwrap();
        assert!(flat.contains("field_type"));
        assert!(flat.contains("parent"));

        let nested = SchemaTreeNode::schema_as_json().unwrap();
        assert!(nested.contains("children"));

        assert_eq!(flat_json_schema().unwrap()["type"], json!("array"));
        assert!(tree_json_schema().unwrap().get("definitions").is_some());
    }
}
