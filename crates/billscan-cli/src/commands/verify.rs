//! Verify command - confirm a GST number with the registry and save the expense.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use serde_json::Value;
use tracing::info;

use billscan_core::{ExpenseStore, ExtractedInvoice, VerifyRequest};

use super::{load_config, open_pipeline};

/// Arguments for the verify command.
#[derive(Args)]
pub struct VerifyArgs {
    /// GST registration number to verify
    gstin: String,

    /// The six digits shown in the captcha image
    #[arg(long)]
    captcha: String,

    /// Captcha session token printed by `ingest` or `captcha`
    #[arg(long)]
    token: String,

    /// Saved ingest output (or a bare invoice JSON) to store as an expense
    #[arg(long)]
    invoice: Option<PathBuf>,

    /// User the records belong to
    #[arg(short, long, default_value = "local")]
    user: String,
}

pub async fn run(args: VerifyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (pipeline, store) = open_pipeline(&config).await?;

    if store.find_user(&args.user).await?.is_none() {
        anyhow::bail!(
            "Unknown user '{}'. Register it first with 'billscan user add {}'.",
            args.user,
            args.user
        );
    }

    let invoice = args.invoice.as_deref().map(read_invoice).transpose()?;
    let request = VerifyRequest {
        registration_number: args.gstin,
        captcha_text: args.captcha,
        session_token: args.token,
        invoice,
    };

    let outcome = pipeline
        .verify(&args.user, &request)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!(expense_saved = outcome.expense_saved(), "Verification complete");
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.expense_saved() {
        eprintln!("{} Expense saved for {}", style("✓").green(), args.user);
    } else {
        eprintln!(
            "{} GST number verified; no invoice given, only the registry record was saved",
            style("✓").green()
        );
    }
    if outcome.location.is_none() {
        eprintln!("{} Address could not be geocoded", style("!").yellow());
    }

    Ok(())
}

/// Read an invoice from a saved ingest report or a bare invoice file.
fn read_invoice(path: &Path) -> anyhow::Result<ExtractedInvoice> {
    let content = fs::read_to_string(path)?;
    invoice_from_json(&content)
        .map_err(|e| anyhow::anyhow!("Invalid invoice file {}: {}", path.display(), e))
}

fn invoice_from_json(content: &str) -> serde_json::Result<ExtractedInvoice> {
    let mut value: Value = serde_json::from_str(content)?;
    if let Some(invoice) = value.get_mut("invoice") {
        return serde_json::from_value(invoice.take());
    }
    serde_json::from_value(value)
}
