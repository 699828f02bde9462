//! Ingest command - extract and structure a single receipt.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use billscan_core::invoice::rules::amounts::format_amount;
use billscan_core::{IngestReport, PipelineWarning};

use super::{load_config, open_pipeline};

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Receipt image (or a text file with --text)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Treat the input as already extracted text and skip OCR
    #[arg(long)]
    text: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output (one row per item)
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: IngestArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let (pipeline, _store) = open_pipeline(&config).await?;

    let report = if args.text {
        pb.set_message("Structuring text...");
        let text = fs::read_to_string(&args.input)?;
        pipeline.ingest_text(&text).await
    } else {
        pb.set_message("Running OCR...");
        let bytes = fs::read(&args.input)?;
        pipeline.ingest(bytes).await?
    };

    pb.finish_and_clear();

    let output = format_report(&report, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    print_next_steps(&report, &config.storage.uploads_dir);
    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Tell the user how to finish verification, on stderr so stdout stays parseable.
pub fn print_next_steps(report: &IngestReport, uploads_dir: &std::path::Path) {
    for warning in &report.warnings {
        if let PipelineWarning::BrokerUnavailable { reason } = warning {
            eprintln!(
                "{} GST number found but the registry captcha is unavailable: {}",
                style("!").yellow(),
                reason
            );
            eprintln!("  Retry later with 'billscan captcha'.");
        }
    }

    if let (Some(challenge), Some(number)) = (&report.captcha, &report.invoice.registration_number) {
        eprintln!(
            "{} Solve the captcha at {}",
            style("ℹ").blue(),
            uploads_dir.join(&challenge.image_ref).display()
        );
        eprintln!(
            "  then run: billscan verify {} --captcha <digits> --token {} --invoice <saved JSON>",
            number, challenge.session_token
        );
    }
}

pub fn format_report(report: &IngestReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_csv(report: &IngestReport) -> anyhow::Result<String> {
    let invoice = &report.invoice;
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "gst_number",
        "store_name",
        "date",
        "total_amount",
        "item",
        "price",
        "category",
    ])?;

    let number = invoice.registration_number.as_deref().unwrap_or_default();
    let store = invoice.store_name.as_deref().unwrap_or_default();
    let date = invoice.date.map(|d| d.to_string()).unwrap_or_default();
    let total = invoice.total_amount.map(|t| t.to_string()).unwrap_or_default();

    if invoice.items.is_empty() {
        wtr.write_record([number, store, &date, &total, "", "", ""])?;
    }
    for item in &invoice.items {
        wtr.write_record([
            number,
            store,
            &date,
            &total,
            &item.name,
            &item.price.to_string(),
            item.category.as_str(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(report: &IngestReport) -> String {
    let invoice = &report.invoice;
    let mut output = String::new();

    output.push_str(&format!(
        "Store: {}\n",
        invoice.store_name.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!(
        "GSTIN: {}\n",
        invoice.registration_number.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!(
        "Date: {}\n",
        invoice.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
    ));
    if let Some(address) = &invoice.address {
        output.push_str(&format!("Address: {}\n", address));
    }
    output.push('\n');

    if !invoice.items.is_empty() {
        output.push_str("Items:\n");
        for item in &invoice.items {
            output.push_str(&format!(
                "  {:<32} {:>12}  {}\n",
                item.name,
                format_amount(item.price),
                item.category
            ));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "Total: {}\n",
        invoice
            .total_amount
            .map(format_amount)
            .unwrap_or_else(|| "-".to_string())
    ));
    output.push_str(&format!("Stage: {:?} (parsed via {:?})\n", report.stage, report.parse_path));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use billscan_core::{Category, ExtractedInvoice, LineItem, ParsePath, Stage};
    use rust_decimal::Decimal;

    fn report() -> IngestReport {
        IngestReport {
            stage: Stage::Structured,
            invoice: ExtractedInvoice {
                store_name: Some("Fresh Mart".to_string()),
                total_amount: Some(Decimal::new(123450, 2)),
                items: vec![
                    LineItem::new("Milk", Decimal::new(60, 0), Category::Food),
                    LineItem::new("Cable", Decimal::new(117450, 2), Category::Electronics),
                ],
                ..ExtractedInvoice::default()
            },
            parse_path: ParsePath::Direct,
            captcha: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_format_csv_row_per_item() {
        let csv = format_report(&report(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with("Cable,1174.50,Electronics"));
    }

    #[test]
    fn test_format_text_uses_indian_grouping() {
        let text = format_report(&report(), OutputFormat::Text).unwrap();
        assert!(text.contains("Total: 1,234.50"));
        assert!(text.contains("GSTIN: -"));
    }
}
