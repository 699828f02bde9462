//! Captcha command - fetch a fresh registry challenge.

use clap::Args;
use console::style;
use tracing::debug;

use billscan_core::registry::purge_expired;

use super::{load_config, open_pipeline};

/// Arguments for the captcha command.
#[derive(Args)]
pub struct CaptchaArgs {
    /// Print the challenge as JSON instead of instructions
    #[arg(long)]
    json: bool,
}

pub async fn run(args: CaptchaArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let purged = purge_expired(&config.storage.uploads_dir, config.storage.captcha_ttl()).await?;
    debug!("Purged {} expired captcha images", purged);

    let (pipeline, _store) = open_pipeline(&config).await?;
    let challenge = pipeline.refresh_captcha().await?;
    let image_path = config.storage.uploads_dir.join(&challenge.image_ref);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "image": image_path,
                "session_token": challenge.session_token,
            }))?
        );
    } else {
        println!(
            "{} Captcha saved to {}",
            style("✓").green(),
            image_path.display()
        );
        println!("Session token: {}", challenge.session_token);
        println!();
        println!("Run 'billscan verify <GSTIN> --captcha <digits> --token <token>' to continue.");
    }

    Ok(())
}
