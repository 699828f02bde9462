//! CLI application for receipt ingestion and GST verification.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, captcha, config, ingest, serve, user, verify};

/// billscan - Turn receipt photos into verified expense records
#[derive(Parser)]
#[command(name = "billscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and structure a single receipt
    Ingest(ingest::IngestArgs),

    /// Extract and structure many receipts
    Batch(batch::BatchArgs),

    /// Verify a GST number with a solved captcha and save the expense
    Verify(verify::VerifyArgs),

    /// Fetch a fresh registry captcha
    Captcha(captcha::CaptchaArgs),

    /// Run the HTTP API
    Serve(serve::ServeArgs),

    /// Manage users of the local store
    User(user::UserArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Ingest(args) => ingest::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Verify(args) => verify::run(args, config_path).await,
        Commands::Captcha(args) => captcha::run(args, config_path).await,
        Commands::Serve(args) => serve::run(args, config_path).await,
        Commands::User(args) => user::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
