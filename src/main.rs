// fetchstate demo consumer.
// Fetches each URL through one shared cache and prints every state transition.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fetchstate::{
    CacheBackend, Config, FetchController, FetchError, HttpTransport, Result, build_cache,
};
use serde_json::{Value, json};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fetchstate", version, about = "Fetch JSON resources through a shared cache")]
struct Cli {
    /// URLs to fetch, in order. Repeat one to see it served from the cache.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Persist the cache on disk instead of keeping it in memory
    #[arg(long)]
    durable: bool,

    /// Root directory for the durable cache
    #[arg(long, env = "FETCHSTATE_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let mut config = Config::from_env()?;
    if cli.durable {
        config.backend = CacheBackend::Durable;
    }
    if let Some(dir) = &cli.store_dir {
        config.store_dir = Some(dir.clone());
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout = Some(Duration::from_secs(secs));
    }

    let cache = build_cache::<Value>(&config)?;
    let transport = Arc::new(HttpTransport::from_config(&config)?);

    for url in &cli.urls {
        let mut controller = FetchController::new(Arc::clone(&cache), transport.clone());
        let mut transitions = controller.subscribe();

        controller.set_identifier(Some(url.as_str()));
        let terminal = controller.wait_terminal().await;
        controller.dispose();

        while let Some(state) = transitions.recv().await {
            println!("{}", json!({ "url": url, "state": state }));
        }
        info!(url = %url, state = terminal.as_ref().map_or("cancelled", |s| s.label()), "done");
    }

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate(),
        "cache statistics"
    );

    Ok(())
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| FetchError::Other(e.to_string()))?;
    Ok(())
}
