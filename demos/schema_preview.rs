use extraction_schema_builder::*;
use std::error::Error;

fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("🧩 Building a schema from the starter template...\n");

    let mut draft = SchemaDraft::new("Starter Invoice", IndexRule::default())
        .with_description("Starter template extended with line items");
    draft.load_tree(&starter_tree())?;

    let details = draft
        .position_of("Invoice Details")
        .ok_or("starter template has no 'Invoice Details'")?;
    let total = draft.add_field(Some(details))?;
    draft.rename_field(total, "Total Amount")?;
    draft.set_field_type(total, FieldType::Number)?;
    draft.set_description(total, "Amount due including tax")?;

    let items = draft.add_field(None)?;
    draft.rename_field(items, "line_items")?;
    draft.set_field_type(items, FieldType::List)?;

    let preview = preview_schema(draft.fields(), draft.rule())?;

    println!("📋 Outline:\n{}", preview.outline);
    println!("📄 Field table:\n{}", preview.table.to_markdown());
    println!(
        "🔍 Example result:\n{}\n",
        serde_json::to_string_pretty(&preview.example)?
    );
    println!("✉️  Prompt:\n{}", preview.prompt);

    println!("🌳 Nested form:");
    println!("{}\n", serde_json::to_string_pretty(&preview.tree)?);

    let sample = serde_json::json!({
        "invoice_number": "INV-2025-0042",
        "invoice_date": "2025-03-25",
        "vendor_name": "Acme Supplies",
        "vendor": { "name": "Acme Supplies", "address": { "city": "Springfield", "zip": "12345" } },
        "customer_name": "Globex",
        "payment_method": "Bank transfer",
        "notes": null,
        "line_items": [
            { "item": "Widgets", "value": 120.0 },
            { "item": "Shipping", "value": 15.5 }
        ]
    });
    let categorized = categorize_value(&sample)?;
    println!("📊 Categorized sample result:\n{}", categorized.to_markdown());
    if !categorized.duplicates.is_empty() {
        println!("🧹 Dropped duplicates: {}", categorized.duplicates.join(", "));
    }

    Ok(())
}
