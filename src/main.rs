// src/main.rs
mod budget;
mod docx;
mod extractors;
mod pipeline;
mod reconcile;
mod registry;
mod storage;
mod utils;

use clap::Parser;
use pipeline::PipelineConfig;
use std::path::PathBuf;
use utils::AppError;

/// Extracts, reconciles and publishes the budget overview table of the
/// revised estimates document
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source DOCX document
    #[arg(short, long, default_value = "data/input/A_80_400.DOCX")]
    input: PathBuf,

    /// Zero-based index of the budget table among the document's tables
    #[arg(short, long, default_value_t = 9)]
    table_index: usize,

    /// Directory for intermediate CSV and JSON files
    #[arg(long, default_value = "data/intermediate")]
    intermediate_dir: PathBuf,

    /// Directory for published JSON files
    #[arg(long, default_value = "public")]
    public_dir: PathBuf,

    /// CSV mapping table names to narrative chapter names (table6_name,doc_name)
    #[arg(long, default_value = "data/input/entity_name_mapping.csv")]
    name_map: PathBuf,

    /// JSON registry of UN entities
    #[arg(long, default_value = "data/input/2025-12-05_un-entities.json")]
    entities: PathBuf,

    /// Keep the restated "– Other" rollup rows instead of dropping them
    #[arg(long)]
    keep_other_rollup: bool,

    /// Number of hierarchy discrepancies the source is known to carry
    #[arg(long, default_value_t = reconcile::EXPECTED_KNOWN_DEFECTS)]
    expected_defects: usize,

    /// Treat integrity-check findings as fatal
    #[arg(long)]
    strict: bool,

    /// Skip entity narrative extraction
    #[arg(long)]
    skip_details: bool,

    /// Reuse the raw table CSV from a previous run
    #[arg(long)]
    from_raw: bool,
}

impl From<Args> for PipelineConfig {
    fn from(args: Args) -> Self {
        Self {
            input: args.input,
            table_index: args.table_index,
            intermediate_dir: args.intermediate_dir,
            public_dir: args.public_dir,
            name_map: args.name_map,
            entities: args.entities,
            keep_other_rollup: args.keep_other_rollup,
            expected_defects: args.expected_defects,
            strict: args.strict,
            skip_details: args.skip_details,
            from_raw: args.from_raw,
        }
    }
}

fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    if !args.from_raw && !args.input.exists() {
        let err = AppError::Config(format!("Input document {} not found", args.input.display()));
        tracing::error!("{}", err);
        return Err(err);
    }

    // 3. Run the stages
    let config = PipelineConfig::from(args);
    // An Err returned from main only prints its Debug form
    let summary = pipeline::run(&config).inspect_err(|e| tracing::error!("{}", e))?;

    tracing::info!(
        "Processing finished. Rows: {}, resolved defects: {}, integrity findings: {}, entity chapters: {}",
        summary.rows,
        summary.resolved_defects,
        summary.integrity_findings,
        summary
            .entity_chapters
            .map(|n| n.to_string())
            .unwrap_or_else(|| "skipped".to_string())
    );

    Ok(())
}
