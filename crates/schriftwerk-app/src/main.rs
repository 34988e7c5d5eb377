// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Schriftwerk — rebuild searchable page layouts from scanned PDFs via hOCR.
//
// Entry point. Initialises logging, loads the pipeline config, and runs either
// a PDF reconstruction or a plain batch transcription of image files.
//
//   schriftwerk reconstruct <input.pdf> [output-dir]
//   schriftwerk batch <image> [<image> ...]
//
// The config file path is taken from SCHRIFTWERK_CONFIG when set.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schriftwerk_core::PipelineConfig;
use schriftwerk_core::error::Result;

use services::pipeline::{Pipeline, PipelineReport};

const CONFIG_ENV: &str = "SCHRIFTWERK_CONFIG";

#[derive(Parser)]
#[command(name = "schriftwerk")]
#[command(about = "Rebuild searchable page layouts from scanned PDFs via hOCR")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// OCR every page image of a PDF and write one text PDF per image
    Reconstruct {
        /// Scanned PDF to read page images from
        input: PathBuf,

        /// Output directory (overrides the configured one)
        output_dir: Option<PathBuf>,
    },
    /// OCR image files and print the recognised text
    Batch {
        /// Image files to send to the OCR service
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn load_config() -> Result<PipelineConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            tracing::info!(path = ?path, "Loading config");
            PipelineConfig::load(PathBuf::from(path))
        }
        None => Ok(PipelineConfig::default()),
    }
}

async fn run(command: Command) -> Result<PipelineReport> {
    let mut config = load_config()?;
    match command {
        Command::Reconstruct { input, output_dir } => {
            if let Some(dir) = output_dir {
                config.output.output_dir = dir;
            }
            let pipeline = Pipeline::from_config(config)?;
            pipeline.reconstruct_pdf(&input).await
        }
        Command::Batch { files } => {
            let pipeline = Pipeline::from_config(config)?;
            Ok(pipeline.transcribe_files(files).await)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("Schriftwerk starting");

    match run(cli.command).await {
        Ok(report) => {
            println!("{report}");
            if report.summary().failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "run aborted");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
