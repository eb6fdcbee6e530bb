//! # chatmood CLI
//!
//! Command-line interface for the chatmood library.

use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser as ClapParser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chatmood::ChatmoodError;
use chatmood::classify::{Classifier, OpenAiClassifier};
use chatmood::cli::Args;
use chatmood::config::Settings;
use chatmood::format::write_to_format;
use chatmood::pipeline::Pipeline;

#[tokio::main]
async fn main() {
    let args = <Args as ClapParser>::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("❌ Error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout only carries the run report.
fn init_tracing(verbose: bool) {
    let default = if verbose { "chatmood=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<(), ChatmoodError> {
    let total_start = Instant::now();

    // Configuration errors stop the run before any file is touched.
    let settings = args.apply(Settings::from_env()?)?;
    let filters = args.filters(&settings)?;
    let (output_path, format) = args.output_target(&settings)?;
    let sources = args.input_sources(&settings);
    let settings = Arc::new(settings);

    println!("📦 chatmood v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 WhatsApp: {}", sources.whatsapp_dir.display());
    println!("📂 Telegram: {}", sources.telegram_dir.display());
    println!("🧠 Model:    {}", settings.classifier.model);
    println!("💾 Output:   {}", output_path.display());
    println!("📄 Format:   {format}");
    if let Some(after) = filters.after {
        println!("📅 After:    {after}");
    }
    if let Some(before) = filters.before {
        println!("📅 Before:   {before}");
    }
    println!();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, abandoning pending batches");
            on_signal.cancel();
        }
    });

    let classifier: Arc<dyn Classifier> = Arc::new(OpenAiClassifier::new(
        settings.classifier.clone(),
        Arc::new(settings.vocabulary.clone()),
    ));
    let pipeline = Pipeline::new(settings.clone(), classifier).with_filters(filters);
    let output = pipeline.run(&sources, &cancel).await;

    println!("💾 Writing {format}...");
    write_to_format(&output.records, &output_path, format)?;
    println!("✅ Done! Output saved to {}", output_path.display());

    if !output.warnings.is_empty() {
        println!();
        println!("⚠️  Warnings:");
        for warning in &output.warnings {
            println!("   {warning}");
        }
    }

    println!();
    println!("📊 {}", output.summary);
    println!();
    println!("⚡ Total time: {:.2}s", total_start.elapsed().as_secs_f64());

    Ok(())
}
