//! prompt-cache-points: replay requests through the breakpoint planner.
//!
//! Each request file is treated as the next turn of one conversation, so
//! history reuse across turns shows up in the output. One JSON summary line
//! is printed per request.

use clap::Parser;
use serde_json::json;
use tracing::info;

use prompt_cache_points::config::{Cli, Config};
use prompt_cache_points::{CachePointManager, Request};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging. Logs go to stderr, results to stdout.
    let filter = if cli.verbose {
        "prompt_cache_points=debug"
    } else {
        "prompt_cache_points=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("prompt-cache-points v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;

    info!(
        max_cache_points = config.cache.max_cache_points,
        min_cache_tokens = config.cache.min_cache_tokens,
        refresh_point_min_tokens = config.cache.refresh_point_min_tokens,
        placement = ?config.provider.placement,
        store = ?config.store.backend,
        "Configuration loaded"
    );

    let manager = CachePointManager::from_config(&config).await?;

    for path in &cli.requests {
        let data = std::fs::read_to_string(path)?;
        let mut request: Request = serde_json::from_str(&data)?;

        let outcome = manager.configure_cache_points(&mut request).await?;

        let line = json!({
            "file": path.display().to_string(),
            "outcome": outcome,
            "tools_cache": request.tools_cache(),
        });
        println!("{line}");
    }

    let stats = manager.stats();
    info!(
        requests = stats.requests,
        history_hits = stats.history_hits,
        history_misses = stats.history_misses,
        store_errors = stats.store_errors,
        breakpoints_placed = stats.breakpoints_placed,
        "Done"
    );

    Ok(())
}
