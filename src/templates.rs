use crate::error::Result;
use crate::schema::{FieldRecord, FieldType, SchemaTreeNode};
use crate::store::{NewSchema, RecordId, SchemaStore};
use crate::tree::IndexRule;
use log::info;

pub const DEFAULT_SCHEMA_NAME: &str = "Standard Invoice";
pub const DEFAULT_SCHEMA_DESCRIPTION: &str = "Default schema for extracting common invoice fields";

/// Flat fields of the built-in invoice schema. All top-level, none required.
pub fn standard_invoice_fields() -> Vec<FieldRecord> {
    [
        ("invoice_number", "The invoice identifier", FieldType::String),
        ("invoice_date", "Date the invoice was issued", FieldType::Date),
        ("due_date", "Date payment is due", FieldType::Date),
        ("vendor_name", "Name of the vendor/supplier", FieldType::String),
        ("vendor_address", "Address of the vendor", FieldType::String),
        ("customer_name", "Name of the customer", FieldType::String),
        ("customer_address", "Address of the customer", FieldType::String),
        ("line_items", "Products or services provided", FieldType::List),
        ("subtotal", "Sum of all line items before tax", FieldType::Number),
        ("tax_amount", "Tax applied to the invoice", FieldType::Number),
        ("total_amount", "Total amount due including tax", FieldType::Number),
        ("currency", "Currency used in the invoice", FieldType::String),
        ("payment_method", "Method of payment", FieldType::String),
    ]
    .into_iter()
    .map(|(name, description, field_type)| FieldRecord::new(name, field_type).with_description(description))
    .collect()
}

/// Nested starting point offered when creating a schema in tree form.
pub fn starter_tree() -> Vec<SchemaTreeNode> {
    vec![
        SchemaTreeNode::new("Invoice Details", FieldType::Object)
            .with_description("Main container for basic invoice information")
            .required()
            .with_children(vec![
                SchemaTreeNode::new("Invoice Number", FieldType::String)
                    .with_description("Unique identifier for the invoice")
                    .required(),
                SchemaTreeNode::new("Invoice Date", FieldType::Date)
                    .with_description("Date when invoice was created")
                    .required(),
            ]),
        SchemaTreeNode::new("Vendor Information", FieldType::Object)
            .with_description("Container for vendor details")
            .required()
            .with_children(vec![SchemaTreeNode::new("Vendor Name", FieldType::String)
                .with_description("Name of the vendor")
                .required()]),
    ]
}

/// Seeds an empty store with the standard invoice schema. Returns the id of
/// the created schema, or `None` when the store already had schemas.
pub fn ensure_default_schema<S: SchemaStore + ?Sized>(store: &S) -> Result<Option<RecordId>> {
    if !store.list_schemas()?.is_empty() {
        return Ok(None);
    }
    info!("Creating default invoice schema");
    let schema = NewSchema::from_fields(
        DEFAULT_SCHEMA_NAME,
        DEFAULT_SCHEMA_DESCRIPTION,
        &standard_invoice_fields(),
        IndexRule::default(),
    )?;
    store.save_schema(schema, None).map(Some)
}
