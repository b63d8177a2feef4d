//! CLI tool for extracting shipping-guide data from PDFs as JSON

use clap::Parser;
use rayon::prelude::*;
use serde_json::json;
use shipping_guide::{extract_guide_with_config, ExtractionConfig, GuideError};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "guide2json")]
#[command(about = "Extract header fields and line items from shipping-guide PDFs")]
struct Cli {
    /// PDF files to process
    #[arg(required = true)]
    pdfs: Vec<PathBuf>,

    /// JSON file overriding extraction tolerances
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// One JSON object per line instead of pretty output
    #[arg(long)]
    compact: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<ExtractionConfig, GuideError> {
    match path {
        Some(path) => ExtractionConfig::from_json(&fs::read_to_string(path)?),
        None => Ok(ExtractionConfig::default()),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let results: Vec<_> = cli
        .pdfs
        .par_iter()
        .map(|path| (path, extract_guide_with_config(path, &config)))
        .collect();

    let mut failed = 0;
    for (path, result) in results {
        let value = match result {
            Ok(guide) => json!({ "file": path.display().to_string(), "guide": guide }),
            Err(e) => {
                log::warn!("{}: {}", path.display(), e);
                failed += 1;
                json!({ "file": path.display().to_string(), "error": e.to_string() })
            }
        };
        let out = if cli.compact {
            serde_json::to_string(&value)
        } else {
            serde_json::to_string_pretty(&value)
        };
        match out {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }

    if failed > 0 {
        process::exit(1);
    }
}
