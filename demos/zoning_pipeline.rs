use concepta::llm::{Attachment, GeminiConfig, PipelineEvent, ZoningExtractor};
use concepta::{discrepancy_markdown, rights_markdown, unit_mix_csv, Workflow};
use dotenv::dotenv;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    let config = GeminiConfig::from_env()?;

    let mut args = std::env::args().skip(1);
    let gush = args.next().unwrap_or_else(|| "6666".to_string());
    let helka = args.next().unwrap_or_else(|| "102".to_string());

    println!("🚀 CONCEPTA pipeline for gush {} helka {}\n", gush, helka);

    let doc_dir = Path::new("demos").join("documents");
    if !doc_dir.exists() {
        fs::create_dir_all(&doc_dir).await?;
        println!("⚠️  Created 'demos/documents'. Place the TABA PDFs (and an optional reference.jpg) there.");
        return Ok(());
    }

    let mut entries = fs::read_dir(&doc_dir).await?;
    let mut pdf_paths: Vec<PathBuf> = Vec::new();
    let mut reference_path = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("pdf") => pdf_paths.push(path),
            Some("jpg" | "jpeg" | "png") => reference_path = Some(path),
            _ => {}
        }
    }
    pdf_paths.sort();

    if pdf_paths.is_empty() {
        println!("⚠️  No PDF files found in {:?}.", doc_dir);
        return Ok(());
    }

    let mut documents = Vec::new();
    for path in &pdf_paths {
        println!("📄 {}", path.display());
        documents.push(Attachment::from_path(path).await?);
    }
    println!();

    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Starting { stage } => println!("🔄 {}: starting", stage),
                PipelineEvent::PromptRendered { stage, chars } => {
                    println!("📝 {}: prompt ready ({} chars)", stage, chars)
                }
                PipelineEvent::AwaitingModel { stage, attachments } => {
                    println!("🤖 {}: waiting for the model ({} attachment(s))", stage, attachments)
                }
                PipelineEvent::ProcessingResponse { stage } => {
                    println!("⚙️  {}: parsing response", stage)
                }
                PipelineEvent::Discrepancies { stage, count } => {
                    println!("⚠️  {}: {} discrepancies", stage, count)
                }
                PipelineEvent::Success { stage } => println!("✅ {}: done", stage),
                PipelineEvent::Failed { stage, reason } => println!("❌ {}: {}", stage, reason),
            }
        }
    });

    let extractor = ZoningExtractor::from_config(config).with_progress(tx);
    let mut workflow = Workflow::new();

    let extraction = extractor.extract_rights(&gush, &helka, documents).await?;
    println!("\n{}", rights_markdown(&extraction.rights));
    println!("{}\n", extraction.report);
    workflow.record_rights(extraction.rights.clone(), Some(extraction.report.clone()))?;

    let unit_mix = extractor.generate_unit_mix(&extraction.rights).await?;
    println!("\n{}", unit_mix_csv(&unit_mix.value));
    println!("{}", discrepancy_markdown(&unit_mix.discrepancies));
    workflow.record_unit_mix(unit_mix)?;

    let massing = extractor.generate_massing(&extraction.rights).await?;
    for alt in &massing.alternatives {
        println!(
            "🏢 {} ({}): {} m, {} tower(s)",
            alt.name,
            alt.id,
            alt.height_m,
            alt.tower_count()
        );
    }
    for note in &massing.notes {
        println!("   ⚠️  {:?}", note);
    }
    workflow.record_massing_alternatives(massing.alternatives.clone())?;

    if let Some(first) = massing.alternatives.first() {
        workflow.select_massing(&first.id)?;
    }

    if let Some(path) = reference_path {
        println!("\n🎨 Reference image: {}", path.display());
        let reference = Attachment::from_path(&path).await?;
        let dna = extractor.analyze_reference(reference.clone()).await?;
        let styled = extractor
            .style_alternatives(&massing.alternatives, &dna, Some(&reference))
            .await?;
        for s in &styled {
            println!("   {}: {}", s.id, s.design_description);
        }
        workflow.record_visualization(styled)?;
        workflow.mark_exported()?;
    }

    drop(extractor);
    printer.await?;

    let out = Path::new("demos").join("documents").join("workflow.json");
    fs::write(&out, serde_json::to_string_pretty(&workflow)?).await?;
    println!("\n💾 Saved workflow ({}) to {}", workflow.stage(), out.display());

    Ok(())
}
