//! User command - manage users of the local JSON-lines store.

use clap::{Args, Subcommand};
use console::style;

use billscan_core::{ExpenseStore, UserProfile};

use super::{load_config, open_store};

/// Arguments for the user command.
#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a user id
    Add {
        /// User id (sent as x-user-id to the HTTP API)
        id: String,

        /// Contact email
        #[arg(long)]
        email: Option<String>,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Show a user and their saved expenses
    Show {
        /// User id
        id: String,
    },
}

pub async fn run(args: UserArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;

    match args.command {
        UserCommand::Add { id, email, name } => {
            let id = id.trim().to_string();
            if id.is_empty() {
                anyhow::bail!("User id must not be empty");
            }
            let user = UserProfile { id, email, name };
            store.add_user(&user).await?;
            println!(
                "{} Added user {} to {}",
                style("✓").green(),
                user.id,
                store.dir().display()
            );
        }
        UserCommand::Show { id } => {
            let Some(user) = store.find_user(&id).await? else {
                anyhow::bail!("Unknown user '{}'", id);
            };
            let expenses: Vec<_> = store
                .expenses()
                .await?
                .into_iter()
                .filter(|e| e.user_id == user.id)
                .collect();

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "user": user,
                    "expenses": expenses,
                }))?
            );
        }
    }

    Ok(())
}
