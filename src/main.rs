// Command-line entry point.
// Refreshes the webmention cache and prints grouped or per-page results as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use webmention_cache::config::{TOKEN_ENV_VAR, parse_duration};
use webmention_cache::{Options, Webmentions};

#[derive(Debug, Parser)]
#[command(name = "webmention-cache", version, about)]
struct Cli {
    /// JSON file with plugin options.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Site domain, e.g. https://example.com.
    #[arg(long, global = true, env = "WEBMENTION_DOMAIN")]
    domain: Option<String>,

    /// Cache key.
    #[arg(long, global = true)]
    key: Option<String>,

    /// Refresh window, e.g. 23h.
    #[arg(long, global = true)]
    duration: Option<String>,

    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the webmentions for one page.
    Get {
        url: String,
        /// Only include these wm-property values.
        #[arg(long = "type")]
        types: Vec<String>,
    },
    /// Print every webmention grouped by target URL.
    Grouped,
    /// Refresh the cache and print how many webmentions it holds.
    Fetch,
    /// Delete the cached feed.
    Clear,
}

fn init_logging(json: bool) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    let fmt_layer = if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer().compact().with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")
}

fn load_options(cli: &Cli) -> Result<Options> {
    let mut options = match &cli.config {
        Some(path) => Options::from_file(path)
            .with_context(|| format!("failed to read options from {}", path.display()))?,
        None => Options::default(),
    };

    if let Some(domain) = &cli.domain {
        options.domain = Some(domain.clone());
    }
    if let Some(key) = &cli.key {
        options.key = key.clone();
    }
    if let Some(duration) = &cli.duration {
        options.duration = parse_duration(duration)?;
    }
    if let Some(dir) = &cli.cache_dir {
        options.cache_dir = Some(dir.clone());
    }

    Ok(options.with_token(dotenvy::var(TOKEN_ENV_VAR).ok()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    let webmentions = Webmentions::from_options(load_options(&cli)?)?;

    match &cli.command {
        Command::Get { url, types } => {
            let types = (!types.is_empty()).then_some(types.as_slice());
            let mentions = webmentions.get(url, types).await?;
            println!("{}", serde_json::to_string_pretty(&mentions)?);
        }
        Command::Grouped => {
            let index = webmentions.grouped().await;
            println!("{}", serde_json::to_string_pretty(&index)?);
        }
        Command::Fetch => {
            let feed = webmentions.fetch().await;
            println!("{}", feed.len());
        }
        Command::Clear => {
            if let Err(err) = webmentions.store().clear(&webmentions.settings().key) {
                warn!(error = %err, "could not clear webmention cache");
            }
        }
    }

    Ok(())
}
