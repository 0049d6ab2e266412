use dotenv::dotenv;
use extraction_schema_builder::llm::GeminiClient;
use extraction_schema_builder::*;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    let config = AppConfig::from_env()?;
    if config.model.api_key.is_none() {
        println!("⚠️  GEMINI_API_KEY is not set; requests will come back as failures.");
    }

    let doc_dir = Path::new("demos").join("documents");
    if !doc_dir.exists() {
        fs::create_dir_all(&doc_dir).await?;
        println!("⚠️  Created 'demos/documents'. Please place invoices (PDF or images) there.");
        return Ok(());
    }

    let mut dir_stream = fs::read_dir(&doc_dir).await?;
    let mut paths: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = dir_stream.next_entry().await {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ["pdf", "png", "jpg", "jpeg"].iter().any(|e| ext == *e))
        {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        println!("⚠️  No documents found in {:?}.", doc_dir);
        return Ok(());
    }

    let store = MemoryStore::open(&config.store.database_path)?;
    let schema_id = match ensure_default_schema(&store)? {
        Some(id) => id,
        None => store
            .list_schemas()?
            .first()
            .map(|s| s.id)
            .ok_or("store has no schemas")?,
    };

    let client = GeminiClient::new(config.model.clone())?;
    let pipeline = ExtractionPipeline::new(client, store, config.index_rule);

    let mut requests = Vec::new();
    for path in &paths {
        requests.push(BatchRequest::new(schema_id, vec![Document::from_path(path).await?]));
    }

    println!("☁️  Processing {} document(s) with {}...\n", requests.len(), config.model.model);
    for result in pipeline.process_batch(requests, 2).await {
        let processed = result?;
        match &processed.outcome {
            ModelOutcome::Extracted(_) => {
                println!("✅ {}", processed.file_name);
                let categorized = categorize_outcome(&processed.outcome)?;
                println!("{}", categorized.to_markdown());
            }
            ModelOutcome::Failed { error, .. } => {
                println!("❌ {}: {}", processed.file_name, error);
            }
        }
    }

    println!("🗂  Recent extractions:");
    for entry in pipeline.history(Some(schema_id), 5)? {
        println!(
            "   - #{} {} ({}, {})",
            entry.record.id,
            entry.record.file_name,
            entry.record.schema_name,
            entry.record.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}
