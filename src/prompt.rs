use crate::error::{ExtractionError, Result};
use crate::schema::FieldRecord;
use crate::tree::{FieldHierarchy, IndexRule, ResolveMode};

pub const DEFAULT_PREAMBLE: &str = "Extract the following information from the invoice or document:";

/// Output rules appended to every extraction prompt. The fenced block here
/// is what `response::parse_model_text` looks for first.
pub const OUTPUT_CONTRACT: &str = r#"Return the extracted data as a JSON object with the field names as keys.
If a field is not found in the document, set its value to null.
For fields of type 'list', return an array of objects.
For fields of type 'object', return a nested object with the child fields.

Important: Return ONLY valid JSON in this exact format:
```json
{
  "field1": "value1",
  "field2": "value2",
  "object_field": {
    "child_field1": "value3"
  },
  "list_field": [
    { "item": "item1", "value": "10.00" },
    { "item": "item2", "value": "20.00" }
  ]
}
```

Do not include any explanations, notes, or additional text outside the JSON."#;

/// Turns a flat schema into the instruction text sent to the model.
///
/// Only top-level fields are listed. Object fields get an inline summary of
/// their direct children; deeper levels are not described.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    rule: IndexRule,
    preamble: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(IndexRule::default())
    }
}

impl PromptBuilder {
    pub fn new(rule: IndexRule) -> Self {
        Self {
            rule,
            preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }

    /// Replace the opening sentence, e.g. for receipts or contracts.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn field_lines(&self, fields: &[FieldRecord]) -> Result<Vec<String>> {
        let hierarchy = FieldHierarchy::resolve(fields, self.rule, ResolveMode::Strict)?;

        Ok(hierarchy
            .roots()
            .iter()
            .map(|&root| {
                let field = hierarchy.record(root);
                let children = hierarchy.children_of(root);
                let child_desc = if field.field_type.is_object() && !children.is_empty() {
                    let summary = children
                        .iter()
                        .map(|&c| {
                            let child = hierarchy.record(c);
                            format!(
                                "{} ({}, Type: {})",
                                child.name, child.description, child.field_type
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(" Contains fields: {}", summary)
                } else {
                    String::new()
                };
                format!(
                    "- {}: {}{} (Type: {})",
                    field.name, field.description, child_desc, field.field_type
                )
            })
            .collect())
    }

    pub fn build(&self, fields: &[FieldRecord]) -> Result<String> {
        if fields.is_empty() {
            return Err(ExtractionError::validation(
                "fields",
                "at least one field is required to build a prompt",
            ));
        }

        let lines = self.field_lines(fields)?;
        Ok(format!(
            "{}\n\n{}\n\n{}\n",
            self.preamble,
            lines.join("\n"),
            OUTPUT_CONTRACT
        ))
    }
}

pub fn build_extraction_prompt(fields: &[FieldRecord], rule: IndexRule) -> Result<String> {
    PromptBuilder::new(rule).build(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{FENCE, JSON_FENCE_OPEN};
    use crate::schema::FieldType;

    #[test]
    fn test_prompt_lists_top_level_fields_with_child_summary() {
        let fields = vec![
            FieldRecord::new("invoice_number", FieldType::String).with_description("The invoice identifier"),
            FieldRecord::new("vendor", FieldType::Object).with_description("Vendor details"),
            FieldRecord::new("name", FieldType::String)
                .with_description("Vendor name")
                .child_of("vendor"),
            FieldRecord::new("address", FieldType::Object)
                .with_description("Vendor address")
                .child_of_index(1),
            FieldRecord::new("city", FieldType::String)
                .with_description("City")
                .child_of("address"),
        ];

        let prompt = build_extraction_prompt(&fields, IndexRule::FullSequence).unwrap();
        assert!(prompt.starts_with(DEFAULT_PREAMBLE));
        assert!(prompt.contains("- invoice_number: The invoice identifier (Type: string)\n"));
        assert!(prompt.contains(
            "- vendor: Vendor details Contains fields: name (Vendor name, Type: string), address (Vendor address, Type: object) (Type: object)"
        ));
        // grandchildren are not summarized
        assert!(!prompt.contains("City"));
        assert!(prompt.ends_with(&format!("{}\n", OUTPUT_CONTRACT)));
    }

    #[test]
    fn test_object_without_children_has_no_summary() {
        let fields = vec![FieldRecord::new("meta", FieldType::Object).with_description("Misc")];
        let lines = PromptBuilder::default().field_lines(&fields).unwrap();
        assert_eq!(lines, vec!["- meta: Misc (Type: object)".to_string()]);
    }

    #[test]
    fn test_unresolved_reference_fails() {
        let fields = vec![FieldRecord::new("x", FieldType::String).child_of_index(3)];
        assert!(build_extraction_prompt(&fields, IndexRule::FullSequence)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_empty_schema_fails() {
        assert!(build_extraction_prompt(&[], IndexRule::FullSequence).is_err());
    }

    #[test]
    fn test_custom_preamble() {
        let fields = vec![FieldRecord::new("total", FieldType::Number)];
        let prompt = PromptBuilder::new(IndexRule::InsertedPrefix)
            .with_preamble("Extract the following from the receipt:")
            .build(&fields)
            .unwrap();
        assert!(prompt.starts_with("Extract the following from the receipt:\n\n- total:  (Type: number)"));
    }

    #[test]
    fn test_contract_matches_response_parser_fences() {
        assert!(OUTPUT_CONTRACT.contains(JSON_FENCE_OPEN));
        assert_eq!(OUTPUT_CONTRACT.matches(FENCE).count(), 2);
        assert!(OUTPUT_CONTRACT.contains("null"));
    }
}
