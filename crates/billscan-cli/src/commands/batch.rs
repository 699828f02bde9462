//! Batch command - ingest many receipt images.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::stream::{self, StreamExt};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use billscan_core::{IngestReport, Pipeline};

use super::ingest::{OutputFormat, format_report};
use super::{load_config, open_pipeline};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of receipts processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    report: Option<IngestReport>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_receipt_image(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let (pipeline, _store) = open_pipeline(&config).await?;
    let pipeline = Arc::new(pipeline);

    let mut pending = stream::iter(files)
        .map(|path| {
            let pipeline = Arc::clone(&pipeline);
            async move { process_single_file(&pipeline, path).await }
        })
        .buffer_unordered(args.jobs.max(1));

    let mut results = Vec::new();
    while let Some(result) = pending.next().await {
        overall_pb.inc(1);

        if let Some(error_msg) = &result.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), error_msg);
            } else {
                overall_pb.abandon();
                error!("Failed to process {}: {}", result.path.display(), error_msg);
                anyhow::bail!("Processing failed: {}", error_msg);
            }
        }
        results.push(result);
    }

    overall_pb.finish_with_message("Complete");
    results.sort_by(|a, b| a.path.cmp(&b.path));

    let successful: Vec<_> = results.iter().filter(|r| r.report.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Some(report) = &result.report {
                let output_name = result
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("receipt");
                let output_path =
                    output_dir.join(format!("{}.{}", output_name, args.format.extension()));

                fs::write(&output_path, format_report(report, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let awaiting = successful
        .iter()
        .filter(|r| r.report.as_ref().is_some_and(IngestReport::needs_captcha))
        .count();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} awaiting captcha",
        style(successful.len()).green(),
        style(failed.len()).red(),
        style(awaiting).yellow()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn is_receipt_image(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(
        ext.to_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "tiff" | "tif" | "bmp"
    )
}

async fn process_single_file(pipeline: &Pipeline, path: PathBuf) -> ProcessResult {
    let file_start = Instant::now();

    let outcome = match tokio::fs::read(&path).await {
        Ok(bytes) => pipeline.ingest(bytes).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let processing_time_ms = file_start.elapsed().as_millis() as u64;
    match outcome {
        Ok(report) => ProcessResult {
            path,
            report: Some(report),
            error: None,
            processing_time_ms,
        },
        Err(error) => ProcessResult {
            path,
            report: None,
            error: Some(error),
            processing_time_ms,
        },
    }
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "stage",
        "gst_number",
        "store_name",
        "date",
        "total_amount",
        "items",
        "parse_path",
        "captcha_ref",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let elapsed = result.processing_time_ms.to_string();

        if let Some(report) = &result.report {
            let invoice = &report.invoice;
            wtr.write_record([
                filename,
                "success",
                &enum_label(&report.stage)?,
                invoice.registration_number.as_deref().unwrap_or(""),
                invoice.store_name.as_deref().unwrap_or(""),
                &invoice.date.map(|d| d.to_string()).unwrap_or_default(),
                &invoice
                    .total_amount
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
                &invoice.items.len().to_string(),
                &enum_label(&report.parse_path)?,
                report
                    .captcha
                    .as_ref()
                    .map(|c| c.image_ref.as_str())
                    .unwrap_or(""),
                &elapsed,
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                &elapsed,
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// The serde name of a unit enum variant, e.g. `awaiting_captcha`.
fn enum_label<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billscan_core::{ExtractedInvoice, ParsePath, Stage};

    #[test]
    fn test_is_receipt_image() {
        assert!(is_receipt_image(Path::new("bills/a.JPG")));
        assert!(is_receipt_image(Path::new("b.webp")));
        assert!(!is_receipt_image(Path::new("c.pdf")));
        assert!(!is_receipt_image(Path::new("README")));
    }

    #[test]
    fn test_summary_marks_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let results = vec![
            ProcessResult {
                path: PathBuf::from("a.png"),
                report: Some(IngestReport {
                    stage: Stage::AwaitingCaptcha,
                    invoice: ExtractedInvoice {
                        registration_number: Some("27AAPFU0939F1ZV".to_string()),
                        ..ExtractedInvoice::default()
                    },
                    parse_path: ParsePath::Fenced,
                    captcha: None,
                    warnings: Vec::new(),
                }),
                error: None,
                processing_time_ms: 12,
            },
            ProcessResult {
                path: PathBuf::from("b.png"),
                report: None,
                error: Some("Text extraction failed".to_string()),
                processing_time_ms: 3,
            },
        ];

        write_summary(&path, &results).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a.png,success,awaiting_captcha,27AAPFU0939F1ZV"));
        assert!(lines[1].contains(",fenced,"));
        assert!(lines[2].ends_with("3,Text extraction failed"));
    }
}
