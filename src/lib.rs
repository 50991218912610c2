//! Matchsync - live-game reconciliation for prediction leagues.
//!
//! This crate provides:
//! - Team-name normalization and fuzzy matching with alias handling
//! - Candidate-game search across three strategies (live pool, stored
//!   external-id binding, scored full-pool fallback)
//! - A gated decision engine that maps external fixture reports onto
//!   internal game transitions without ever regressing or finishing a
//!   game on weak evidence
//! - A reconciliation runner that drives one pass end to end: feed
//!   fetch, matching, updates, bet point recalculation, and a sweep for
//!   long-stale live games
//!
//! The persistence layer and the concrete HTTP feed client live with the
//! embedding application; they plug in through the `store::GameStore`,
//! `store::BetStore` and `feed::ExternalFixtureFeed` traits.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod matching;
pub mod runner;
pub mod store;
pub mod types;

pub use config::ReconcilerConfig;
pub use engine::ReconciliationDecisionEngine;
pub use error::ReconcileError;
pub use feed::{parse_fixture_status, ExternalFixtureFeed, StaticFixtureFeed};
pub use matching::candidates::{CandidateGameFinder, CandidateSearch};
pub use matching::{competition_similarity, find_best_match, normalize, similarity};
pub use runner::ReconciliationRunner;
pub use store::{calculate_bet_points, BetStore, GameStore, GameUpdate};
pub use types::*;
