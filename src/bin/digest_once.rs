//! One-shot run: prints the categorized JSON for a run label and exits.
//!
//! Usage: `digest_once [morning|afternoon|evening] [lookback_hours]`

use anyhow::{Context, Result};

use nfl_status_digest::config::DigestConfig;
use nfl_status_digest::{init_tracing, Aggregator};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let run = args.next().unwrap_or_else(|| "morning".to_string());
    let lookback = match args.next() {
        Some(h) => Some(
            h.parse::<u32>()
                .with_context(|| format!("lookback must be whole hours, got {h:?}"))?,
        ),
        None => None,
    };

    let cfg = DigestConfig::load_default().context("loading digest config")?;
    let aggregator = Aggregator::from_config(&cfg)?;
    let results = aggregator.get_categorized_results(lookback, &run).await;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
