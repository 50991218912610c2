//! Persistence-side collaborator traits.
//!
//! The relational schema and ORM belong to the surrounding application;
//! the engine only reads games and requests field updates through these
//! seams. In-memory implementations double as the reference semantics and
//! back the runner tests.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::types::{Bet, DecidedBy, GameStatus, InternalGame, ScoringRules};

/// Field patch for one game. `None` leaves a field untouched; the nested
/// options allow explicitly nulling a nullable column.
#[derive(Debug, Clone, Default)]
pub struct GameUpdate {
    pub status: Option<GameStatus>,
    pub external_id: Option<Option<i64>>,
    pub external_status: Option<Option<String>>,
    pub live_score: Option<(u32, u32)>,
    pub clear_live_score: bool,
    pub final_score: Option<(u32, u32)>,
    pub clear_final_score: bool,
    pub elapsed_min: Option<Option<u32>>,
    pub decided_by: Option<DecidedBy>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Read/write access to internal game records.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// All games currently LIVE
    async fn find_live_games(&self) -> Result<Vec<InternalGame>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<InternalGame>>;

    async fn update(&self, id: &str, update: GameUpdate) -> Result<()>;
}

/// Read/write access to bets, for point recalculation on finish.
#[async_trait]
pub trait BetStore: Send + Sync {
    async fn find_bets_for_game(&self, game_id: &str) -> Result<Vec<Bet>>;

    async fn update_points(&self, bet_id: &str, points: i32) -> Result<()>;
}

/// Points for one bet against the actual final score, using the
/// competition's scoring system. Pure table lookup, specified by the
/// surrounding codebase; the engine calls it once per bet on finish.
pub fn calculate_bet_points(bet: &Bet, actual: (u32, u32), scoring: &ScoringRules) -> i32 {
    let (home, away) = actual;
    if bet.predicted_home == home && bet.predicted_away == away {
        return scoring.exact;
    }
    let predicted_outcome = outcome(bet.predicted_home, bet.predicted_away);
    if predicted_outcome == outcome(home, away) {
        return scoring.correct_outcome;
    }
    scoring.wrong
}

fn outcome(home: u32, away: u32) -> i8 {
    match home.cmp(&away) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Less => -1,
    }
}

/// In-memory game store.
#[derive(Debug, Default)]
pub struct MemoryGameStore {
    games: RwLock<HashMap<String, InternalGame>>,
}

impl MemoryGameStore {
    pub fn new(games: Vec<InternalGame>) -> Self {
        Self {
            games: RwLock::new(games.into_iter().map(|g| (g.id.clone(), g)).collect()),
        }
    }

    /// Direct snapshot accessor for assertions.
    pub fn get(&self, id: &str) -> Option<InternalGame> {
        self.games.read().get(id).cloned()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn find_live_games(&self) -> Result<Vec<InternalGame>> {
        let mut live: Vec<InternalGame> = self
            .games
            .read()
            .values()
            .filter(|g| g.status == GameStatus::Live)
            .cloned()
            .collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(live)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<InternalGame>> {
        Ok(self.games.read().get(id).cloned())
    }

    async fn update(&self, id: &str, update: GameUpdate) -> Result<()> {
        let mut games = self.games.write();
        let game = games
            .get_mut(id)
            .ok_or_else(|| anyhow!("game {} not found", id))?;

        if let Some(status) = update.status {
            game.status = status;
        }
        if let Some(external_id) = update.external_id {
            game.external_id = external_id;
        }
        if let Some(external_status) = update.external_status {
            game.external_status = external_status;
        }
        if let Some((home, away)) = update.live_score {
            game.home_score_live = Some(home);
            game.away_score_live = Some(away);
        }
        if update.clear_live_score {
            game.home_score_live = None;
            game.away_score_live = None;
        }
        if let Some((home, away)) = update.final_score {
            game.home_score_final = Some(home);
            game.away_score_final = Some(away);
        }
        if update.clear_final_score {
            game.home_score_final = None;
            game.away_score_final = None;
        }
        if let Some(elapsed) = update.elapsed_min {
            game.elapsed_min = elapsed;
        }
        if let Some(decided_by) = update.decided_by {
            game.decided_by = Some(decided_by);
        }
        if let Some(at) = update.last_synced_at {
            game.last_synced_at = Some(at);
        }
        Ok(())
    }
}

/// In-memory bet store.
#[derive(Debug, Default)]
pub struct MemoryBetStore {
    bets: RwLock<HashMap<String, Bet>>,
}

impl MemoryBetStore {
    pub fn new(bets: Vec<Bet>) -> Self {
        Self {
            bets: RwLock::new(bets.into_iter().map(|b| (b.id.clone(), b)).collect()),
        }
    }

    pub fn get(&self, id: &str) -> Option<Bet> {
        self.bets.read().get(id).cloned()
    }
}

#[async_trait]
impl BetStore for MemoryBetStore {
    async fn find_bets_for_game(&self, game_id: &str) -> Result<Vec<Bet>> {
        let mut bets: Vec<Bet> = self
            .bets
            .read()
            .values()
            .filter(|b| b.game_id == game_id)
            .cloned()
            .collect();
        bets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(bets)
    }

    async fn update_points(&self, bet_id: &str, points: i32) -> Result<()> {
        let mut bets = self.bets.write();
        let bet = bets
            .get_mut(bet_id)
            .ok_or_else(|| anyhow!("bet {} not found", bet_id))?;
        bet.points = Some(points);
        Ok(())
    }
}
