use acctwatch::classify;
use acctwatch::config::Config;
use acctwatch::feeds::{self, FeedSource, HttpFeedSource, PostTally};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "acctwatch")]
#[command(about = "Fetch and classify posts from tracked accounts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.acctwatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server base URL, overriding the config file
    #[arg(short, long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracked accounts
    Accounts,
    /// Print one account's posts as JSON
    Posts { account: String },
    /// Fetch every account's posts and tally them as they arrive
    All,
    /// Show which camps a piece of text mentions
    Classify { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.server.base_url = base_url;
    }
    acctwatch::logging::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Classify { text } => {
            let found: Vec<&str> = classify::categories(text.as_str())
                .iter()
                .map(|c| c.label())
                .collect();
            if found.is_empty() {
                println!("none");
            } else {
                println!("{}", found.join(", "));
            }
        }
        Commands::Accounts => {
            let source = HttpFeedSource::from_config(&config)?;
            for account in source.accounts().await? {
                println!("{}", account);
            }
        }
        Commands::Posts { account } => {
            let source = HttpFeedSource::from_config(&config)?;
            let posts = feeds::fetch_posts_for_account(&source, &account).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&posts).context("Failed to render posts")?
            );
        }
        Commands::All => {
            let source = HttpFeedSource::from_config(&config)?;
            let summary = feeds::fetch_all_accounts(
                &source,
                &config.fetch_options(),
                |account, posts| {
                    let tally = PostTally::from_posts(&posts);
                    println!(
                        "{:<20} {:>5} posts  {:>4} left  {:>4} right",
                        account, tally.total, tally.left, tally.right
                    );
                },
                || println!("---"),
            )
            .await?;

            println!(
                "{} accounts, {} loaded, {} failed",
                summary.accounts,
                summary.loaded,
                summary.failed.len()
            );
            for account in &summary.failed {
                println!("  failed: {}", account);
            }
        }
    }

    Ok(())
}
