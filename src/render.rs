use crate::error::Result;
use crate::schema::{FieldRecord, FieldType, ParentRef};
use crate::tree::{FieldHierarchy, IndexRule, ResolveMode};
use crate::utils::csv_escape;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const EXAMPLE_STRING: &str = "Example value";
pub const EXAMPLE_NUMBER: f64 = 123.45;
pub const EXAMPLE_INTEGER: i64 = 42;
pub const EXAMPLE_DATE: &str = "2025-03-25";

pub fn type_icon(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Object => "📦",
        FieldType::String => "📄",
        FieldType::Number | FieldType::Integer => "🔢",
        FieldType::Date => "📅",
        FieldType::List => "📋",
        FieldType::Boolean => "☑️",
    }
}

/// Markdown outline of a flat schema, one field per line, children indented
/// under their object. Fields whose parent cannot be resolved render at the
/// top level; self references and cycles are errors.
pub fn render_outline(fields: &[FieldRecord], rule: IndexRule) -> Result<String> {
    let hierarchy = FieldHierarchy::resolve(fields, rule, ResolveMode::Lenient)?;
    let mut output = String::new();
    for &root in hierarchy.roots() {
        write_outline(&hierarchy, root, 0, &mut output);
    }
    Ok(output)
}

fn write_outline(hierarchy: &FieldHierarchy<'_>, position: usize, depth: usize, output: &mut String) {
    let field = hierarchy.record(position);
    let required = if field.required { "required" } else { "optional" };

    output.push_str(&"  ".repeat(depth));
    output.push_str(&format!(
        "{} **{}** ({}, {})",
        type_icon(field.field_type),
        field.name,
        field.field_type,
        required
    ));
    if !field.description.is_empty() {
        output.push_str(&format!(": {}", field.description));
    }
    output.push('\n');

    for &child in hierarchy.children_of(position) {
        write_outline(hierarchy, child, depth + 1, output);
    }
}

/// Synthetic extraction result showing the shape the model will return.
pub fn example_payload(fields: &[FieldRecord], rule: IndexRule) -> Result<Value> {
    let hierarchy = FieldHierarchy::resolve(fields, rule, ResolveMode::Lenient)?;
    Ok(Value::Object(example_object(&hierarchy, hierarchy.roots())))
}

fn example_object(hierarchy: &FieldHierarchy<'_>, members: &[usize]) -> Map<String, Value> {
    let mut object = Map::new();
    for &position in members {
        let field = hierarchy.record(position);
        let value = match field.field_type {
            FieldType::String => json!(EXAMPLE_STRING),
            FieldType::Number => json!(EXAMPLE_NUMBER),
            FieldType::Integer => json!(EXAMPLE_INTEGER),
            FieldType::Boolean => json!(true),
            FieldType::Date => json!(EXAMPLE_DATE),
            FieldType::List => json!([{ "item": "Example item", "value": EXAMPLE_NUMBER }]),
            FieldType::Object => {
                Value::Object(example_object(hierarchy, hierarchy.children_of(position)))
            }
        };
        object.insert(field.name.clone(), value);
    }
    object
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRow {
    pub hierarchy: String,
    pub description: String,
    pub field_type: FieldType,
    pub parent: String,
    pub required: bool,
}

/// Tabular listing of a flat schema in its stored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTable {
    pub rows: Vec<FieldRow>,
}

impl FieldTable {
    pub fn from_fields(fields: &[FieldRecord]) -> Self {
        let rows = fields
            .iter()
            .map(|field| {
                let parent = match &field.parent_ref {
                    ParentRef::None => String::new(),
                    ParentRef::ByIndex(i) => fields
                        .get(*i)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| format!("Unknown ({})", i)),
                    ParentRef::ByName(name) => {
                        if fields.iter().any(|p| &p.name == name) {
                            name.clone()
                        } else {
                            format!("Unknown ({})", name)
                        }
                    }
                };
                let hierarchy = if parent.is_empty() {
                    field.name.clone()
                } else {
                    format!("→ {}", field.name)
                };
                FieldRow {
                    hierarchy,
                    description: field.description.clone(),
                    field_type: field.field_type,
                    parent,
                    required: field.required,
                }
            })
            .collect();
        Self { rows }
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str("| Field Name | Description | Type | Parent | Required |\n");
        output.push_str("|---|---|---|---|---|\n");
        for row in &self.rows {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                row.hierarchy,
                row.description.replace('|', "\\|"),
                row.field_type,
                row.parent,
                if row.required { "✓" } else { "" }
            ));
        }
        output
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Field Name,Description,Type,Parent,Required\n");
        for row in &self.rows {
            output.push_str(&format!(
                "{},{},{},{},{}\n",
                csv_escape(&row.hierarchy),
                csv_escape(&row.description),
                row.field_type,
                csv_escape(&row.parent),
                row.required
            ));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Vec<FieldRecord> {
        vec![
            FieldRecord::new("invoice_number", FieldType::String)
                .with_description("Invoice identifier")
                .required(),
            FieldRecord::new("vendor", FieldType::Object).with_description("Vendor details"),
            FieldRecord::new("name", FieldType::String).child_of_index(1),
            FieldRecord::new("address", FieldType::Object).child_of("vendor"),
            FieldRecord::new("city", FieldType::String).child_of("address"),
            FieldRecord::new("issued", FieldType::Date),
            FieldRecord::new("line_items", FieldType::List),
        ]
    }

    #[test]
    fn test_outline_indents_children() {
        let outline = render_outline(&sample_fields(), IndexRule::FullSequence).unwrap();
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(
            lines[0],
            "📄 **invoice_number** (string, required): Invoice identifier"
        );
        assert_eq!(lines[1], "📦 **vendor** (object, optional): Vendor details");
        assert_eq!(lines[2], "  📄 **name** (string, optional)");
        assert_eq!(lines[3], "  📦 **address** (object, optional)");
        assert_eq!(lines[4], "    📄 **city** (string, optional)");
        assert_eq!(lines[5], "📅 **issued** (date, optional)");
        assert_eq!(lines[6], "📋 **line_items** (list, optional)");
    }

    #[test]
    fn test_example_payload_shape() {
        let payload = example_payload(&sample_fields(), IndexRule::FullSequence).unwrap();
        assert_eq!(payload["invoice_number"], json!("Example value"));
        assert_eq!(payload["vendor"]["address"]["city"], json!("Example value"));
        assert_eq!(payload["issued"], json!("2025-03-25"));
        assert_eq!(payload["line_items"][0]["item"], json!("Example item"));

        let keys: Vec<&str> = payload
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["invoice_number", "vendor", "issued", "line_items"]);
    }

    #[test]
    fn test_empty_schema_renders_empty() {
        assert_eq!(render_outline(&[], IndexRule::FullSequence).unwrap(), "");
        assert_eq!(example_payload(&[], IndexRule::FullSequence).unwrap(), json!({}));
    }

    #[test]
    fn test_unresolvable_parent_renders_top_level() {
        let fields = vec![FieldRecord::new("stray", FieldType::Number).child_of("missing")];
        let outline = render_outline(&fields, IndexRule::FullSequence).unwrap();
        assert_eq!(outline, "🔢 **stray** (number, optional)\n");
    }

    #[test]
    fn test_self_parent_is_rejected() {
        let fields = vec![FieldRecord::new("me", FieldType::Object).child_of("me")];
        assert!(render_outline(&fields, IndexRule::FullSequence).is_err());
        assert!(example_payload(&fields, IndexRule::FullSequence).is_err());
    }

    #[test]
    fn test_field_table() {
        let mut fields = sample_fields();
        fields.push(FieldRecord::new("ghost_child", FieldType::String).child_of_index(42));
        let table = FieldTable::from_fields(&fields);

        assert_eq!(table.rows[2].hierarchy, "→ name");
        assert_eq!(table.rows[2].parent, "vendor");
        assert_eq!(table.rows[7].parent, "Unknown (42)");

        let markdown = table.to_markdown();
        assert!(markdown.contains("| invoice_number | Invoice identifier | string |  | ✓ |"));

        let csv = table.to_csv();
        assert!(csv.starts_with("Field Name,Description,Type,Parent,Required\n"));
        assert!(csv.contains("→ city,,string,address,false"));
    }
}
