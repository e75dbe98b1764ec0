//! receipt-crew command-line binary.
//!
//! # Environment Variables
//!
//! - `GOOGLE_API_KEY` / `GEMINI_API_KEY`: Gemini API key
//! - `RECEIPT_CREW_PDF_DIR`, `RECEIPT_CREW_WORKDIR`, `RECEIPT_CREW_MODEL`,
//!   `RECEIPT_CREW_TEMPERATURE`: configuration overrides
//! - `RUST_LOG`: tracing filter
//!
//! # Usage
//!
//! ```bash
//! receipt-crew process --dir ./receipt_pdfs
//! receipt-crew summary
//! receipt-crew lint-manifest requirements.txt --json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use receipt_crew::manifest::{lint, Manifest};
use receipt_crew::receipts::{troubleshooting, ProcessingReport, ReceiptProcessingCrew, TotalsSource};
use receipt_crew::utilities::config::ReceiptConfig;
use receipt_crew::utilities::printer::{rule, Printer, PrinterColor};

#[derive(Parser)]
#[command(name = "receipt-crew")]
#[command(about = "Extract and aggregate receipt totals with a Gemini-backed agent crew")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction and aggregation agents over a directory of PDFs
    Process {
        /// Directory containing receipt PDFs
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Gemini model name
        #[arg(short, long)]
        model: Option<String>,
        /// Suppress agent progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the spending summary from existing output files
    Summary {
        /// Directory holding the extracted and aggregated JSON files
        #[arg(short, long)]
        workdir: Option<PathBuf>,
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Check a requirements manifest for malformed or conflicting pins
    LintManifest {
        /// Path to the manifest
        path: PathBuf,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,receipt_crew=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Process { quiet: false, .. });
    init_tracing(verbose);

    let result = match cli.command {
        Commands::Process {
            dir,
            config,
            model,
            quiet,
        } => run_process(dir, config, model, quiet).await,
        Commands::Summary { workdir, config } => run_summary(workdir, config),
        Commands::LintManifest { path, json } => run_lint(&path, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_process(
    dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    model: Option<String>,
    quiet: bool,
) -> Result<ExitCode> {
    let mut config =
        ReceiptConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = dir {
        config.pdf_directory = dir;
    }
    if let Some(model) = model {
        config.model = model;
    }
    if quiet {
        config.verbose = false;
    }
    config.validate().context("invalid configuration")?;
    config
        .ensure_pdf_directory()
        .context("failed to prepare the PDF directory")?;

    let printer = Printer::new();
    let pdf_dir = config.pdf_directory.to_string_lossy().into_owned();
    let crew = ReceiptProcessingCrew::from_config(config.clone());

    let output = match crew.process_receipts(&pdf_dir).await {
        Ok(output) => output,
        Err(e) => {
            printer.print(&format!("Error processing receipts: {}", e), PrinterColor::Red);
            println!();
            println!("{}", troubleshooting());
            return Ok(ExitCode::FAILURE);
        }
    };

    println!();
    printer.print(&rule('=', 60), PrinterColor::BoldGreen);
    printer.print("FINAL RESULTS FROM GEMINI AGENTS:", PrinterColor::BoldGreen);
    printer.print(&rule('=', 60), PrinterColor::BoldGreen);
    println!("{}", output);
    tracing::debug!(
        total_tokens = output.token_usage.total_tokens,
        requests = output.token_usage.successful_requests,
        "crew finished"
    );

    print_report(&ProcessingReport::load(&config.working_dir, &config), &printer);
    Ok(ExitCode::SUCCESS)
}

/// Configuration for `summary`: same layering as `process`, with `--workdir`
/// replacing the configured working directory.
fn summary_config(workdir: Option<PathBuf>, config_path: Option<&Path>) -> Result<ReceiptConfig> {
    let mut config = ReceiptConfig::load(config_path).context("failed to load configuration")?;
    if let Some(workdir) = workdir {
        config.working_dir = workdir;
    }
    Ok(config)
}

fn run_summary(workdir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let config = summary_config(workdir, config_path.as_deref())?;
    let report = ProcessingReport::load(&config.working_dir, &config);
    print_report(&report, &Printer::new());

    if report.source == TotalsSource::Unavailable {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &ProcessingReport, printer: &Printer) {
    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }

    match report.render_extracted() {
        Some(extracted) => {
            println!();
            printer.print("Extracted Data (Agent 1 Output):", PrinterColor::BoldCyan);
            println!("{}", extracted);
        }
        None => printer.print(
            &format!("{} not found", report.extracted_path.display()),
            PrinterColor::Red,
        ),
    }

    match report.source {
        TotalsSource::Unavailable => printer.print(
            &format!("{} not found", report.aggregated_path.display()),
            PrinterColor::Red,
        ),
        source => {
            println!();
            let heading = if source == TotalsSource::AggregatedFile {
                "Aggregated Data (Agent 2 Output):"
            } else {
                "Aggregated Data (recomputed from extracted receipts):"
            };
            printer.print(heading, PrinterColor::BoldCyan);
            println!("{}", report.render_totals());
            println!();
            println!("{}", report.render_summary());
        }
    }
}

fn run_lint(path: &Path, json: bool) -> Result<ExitCode> {
    let manifest = Manifest::from_path(path)?;
    let report = lint(&manifest);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize lint report")?
        );
    } else {
        println!("{}", report);
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_reads_configured_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            format!(
                "working_dir: {}\nextracted_file: march.json\naggregated_file: march_totals.json\n",
                dir.path().display()
            ),
        )
        .unwrap();
        std::fs::write(dir.path().join("march_totals.json"), r#"{"Cafe": 4.5}"#).unwrap();

        let config = summary_config(None, Some(&config_path)).unwrap();
        assert_eq!(config.aggregated_file, "march_totals.json");

        let report = ProcessingReport::load(&config.working_dir, &config);
        assert_eq!(report.source, TotalsSource::AggregatedFile);
        assert_eq!(report.total_spending(), 4.5);
    }

    #[test]
    fn test_summary_workdir_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config = summary_config(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.working_dir, dir.path());
        assert_eq!(config.extracted_file, "extracted_receipts.json");
    }

    #[test]
    fn test_cli_parses_summary_flags() {
        let cli = Cli::try_parse_from(["receipt-crew", "summary", "--config", "c.yaml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Summary { workdir: None, config: Some(ref p) } if p == Path::new("c.yaml")
        ));
    }
}
