//! Reconciliation dry-run tool.
//!
//! Replays recorded fixtures against a snapshot of games and bets,
//! running one full pass with the in-memory stores, and prints the
//! resulting report as JSON. Nothing is persisted; useful for tuning
//! thresholds against production snapshots.
//!
//! Environment:
//! - GAMES_FILE    JSON array of internal games (required)
//! - FIXTURES_FILE JSON array of external fixtures (required)
//! - BETS_FILE     JSON array of bets (optional)

use std::env;
use std::fs;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing::info;

use matchsync::store::{MemoryBetStore, MemoryGameStore};
use matchsync::{
    Bet, ExternalFixture, InternalGame, ReconcilerConfig, ReconciliationRunner, StaticFixtureFeed,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let games: Vec<InternalGame> = load(&env::var("GAMES_FILE").context("GAMES_FILE not set")?)?;
    let fixtures: Vec<ExternalFixture> =
        load(&env::var("FIXTURES_FILE").context("FIXTURES_FILE not set")?)?;
    let bets: Vec<Bet> = match env::var("BETS_FILE") {
        Ok(path) => load(&path)?,
        Err(_) => Vec::new(),
    };

    info!(
        games = games.len(),
        fixtures = fixtures.len(),
        bets = bets.len(),
        "starting dry run"
    );

    let runner = ReconciliationRunner::new(
        StaticFixtureFeed::new(fixtures),
        MemoryGameStore::new(games),
        MemoryBetStore::new(bets),
        ReconcilerConfig::from_env(),
    );

    let report = runner.run_pass().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
}
