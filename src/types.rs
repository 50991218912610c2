//! Core data model for the reconciliation engine.
//!
//! This module provides:
//! - Transient feed-side records (`ExternalFixture`, `FixtureStatus`)
//! - Persistence-side projections (`InternalGame`, `GameStatus`, `TeamCandidate`)
//! - Match evaluation types (`ConfidenceTier`, `MatchCandidate`)
//! - Engine output (`ReconciliationDecision`, `SkipReason`)
//! - Pass summary (`SyncReport`)
//!
//! Tiers and decisions are closed enums so gate logic is exhaustively
//! checked by the compiler instead of string comparisons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status code reported by the external feed for a single fixture.
///
/// Parsed from the feed's short codes (see `feed::parse_fixture_status`).
/// The variants are deliberately coarser than the feed vocabulary: the
/// engine only cares about not-started / live / half-time / finished and
/// how a finished game was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureStatus {
    /// Not started yet, or TBD
    NotStarted,
    /// Postponed by the organizer
    Postponed,
    /// Cancelled or abandoned
    Cancelled,
    /// In progress (either half, extra time, shoot-out, interrupted)
    Live,
    /// Half-time break
    HalfTime,
    /// Finished in regulation time
    Finished,
    /// Finished after extra time
    FinishedExtraTime,
    /// Finished on penalties
    FinishedPenalties,
    /// Unrecognized feed code
    Unknown,
}

impl FixtureStatus {
    /// True for any in-progress state, including half-time.
    pub fn is_live(self) -> bool {
        matches!(self, FixtureStatus::Live | FixtureStatus::HalfTime)
    }

    /// True for any completed state.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            FixtureStatus::Finished
                | FixtureStatus::FinishedExtraTime
                | FixtureStatus::FinishedPenalties
        )
    }

    /// How a finished fixture was decided, if it is finished at all.
    pub fn decided_by(self) -> Option<DecidedBy> {
        match self {
            FixtureStatus::Finished => Some(DecidedBy::Regulation),
            FixtureStatus::FinishedExtraTime => Some(DecidedBy::ExtraTime),
            FixtureStatus::FinishedPenalties => Some(DecidedBy::Penalties),
            _ => None,
        }
    }
}

/// Marker for how a final score came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Regulation,
    ExtraTime,
    Penalties,
}

/// One external-feed record describing a single real-world match.
///
/// Read once per sync pass and never persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalFixture {
    /// Feed-side match identifier
    pub external_id: i64,
    pub home_name: String,
    pub away_name: String,
    /// Kickoff timestamp, when the feed provides one
    pub kickoff: Option<DateTime<Utc>>,
    /// Competition label, when the feed provides one
    pub competition: Option<String>,
    pub status: FixtureStatus,
    /// Raw status code as received, mirrored into the game on update
    pub status_code: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    /// Elapsed-minute marker for live fixtures
    pub elapsed_min: Option<u32>,
}

/// Internal game lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Upcoming,
    Live,
    Finished,
    Cancelled,
    Rescheduled,
}

/// Read-only team projection used for matching only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCandidate {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
}

/// Points awarded per bet outcome, carried from the game's competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Predicted score exactly right
    pub exact: i32,
    /// Predicted the right outcome (win/draw/loss) but not the score
    pub correct_outcome: i32,
    pub wrong: i32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            exact: 3,
            correct_outcome: 1,
            wrong: 0,
        }
    }
}

/// Internal game record as the reconciliation engine sees it.
///
/// Owned by the persistence layer; this crate only reads it and requests
/// updates through `store::GameStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalGame {
    pub id: String,
    pub home_team: TeamCandidate,
    pub away_team: TeamCandidate,
    pub scheduled_at: DateTime<Utc>,
    pub competition: String,
    /// Sport discriminator on the competition (e.g. "soccer")
    pub sport: String,
    pub status: GameStatus,
    /// Back-reference to a verified feed fixture, if any
    pub external_id: Option<i64>,
    /// Mirror of the feed's last raw status code
    pub external_status: Option<String>,
    pub home_score_live: Option<u32>,
    pub away_score_live: Option<u32>,
    pub home_score_final: Option<u32>,
    pub away_score_final: Option<u32>,
    pub elapsed_min: Option<u32>,
    /// How the final score came about, set on finish
    pub decided_by: Option<DecidedBy>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Scoring system of the game's competition
    pub scoring: ScoringRules,
}

/// A single user prediction on a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub game_id: String,
    pub predicted_home: u32,
    pub predicted_away: u32,
    pub points: Option<i32>,
}

/// How much evidence supports a proposed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

/// Which candidate-search strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// Both teams matched strongly inside the currently-LIVE pool
    LivePoolMatch,
    /// Stored external-id binding, re-verified
    ExternalId,
    /// Scored search over the full in-flight pool
    FullPool,
}

/// How an individual team name was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactNormalized,
    Fuzzy,
}

/// Best internal team for one external name.
#[derive(Debug, Clone)]
pub struct TeamMatch {
    pub team: TeamCandidate,
    pub score: f64,
    pub method: MatchMethod,
}

/// One fixture's best internal game, produced transiently per evaluation.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub game: InternalGame,
    pub tier: ConfidenceTier,
    pub strategy: MatchStrategy,
    /// Weaker of the two team-name scores
    pub team_score: f64,
    /// Competition-name similarity against the fixture (0.0 when the
    /// fixture carries no competition label)
    pub competition_score: f64,
    /// |fixture kickoff - game schedule| in minutes, when the kickoff is known
    pub date_diff_min: Option<i64>,
}

impl MatchCandidate {
    /// Loose competition corroboration: exact or substring containment
    /// after normalization (score >= 0.8 on the competition scale).
    pub fn competition_loosely_matches(&self) -> bool {
        self.competition_score >= 0.8
    }
}

/// Why the engine refused to touch a game for a given fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Internal game already FINISHED; immutable to the engine
    AlreadyFinished,
    /// Internal game cancelled or rescheduled; not syncable
    GameNotSyncable,
    /// Fixture reports not-started/postponed/TBD
    FixtureNotStarted,
    /// Feed status code was unrecognized
    UnknownFixtureStatus,
    /// LOW tier asked for a finish transition
    LowConfidenceFinish,
    /// LOW tier with more than the allowed date drift
    LowConfidenceDateDrift,
    /// LOW tier without loose competition corroboration
    LowConfidenceCompetition,
    /// Finish requested without scores to finalize with
    MissingFinalScore,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::AlreadyFinished => "game already finished",
            SkipReason::GameNotSyncable => "game cancelled or rescheduled",
            SkipReason::FixtureNotStarted => "fixture not started",
            SkipReason::UnknownFixtureStatus => "unknown fixture status",
            SkipReason::LowConfidenceFinish => "low confidence: finish requested",
            SkipReason::LowConfidenceDateDrift => "low confidence: date drift too large",
            SkipReason::LowConfidenceCompetition => "low confidence: competition mismatch",
            SkipReason::MissingFinalScore => "finish requested without final score",
        };
        f.write_str(s)
    }
}

/// Engine output for one (fixture, candidate) pair. Consumed immediately
/// by the runner, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationDecision {
    Skip {
        reason: SkipReason,
    },
    ApplyLiveUpdate {
        status: GameStatus,
        /// Both scores or nothing; a feed without scores still refreshes
        /// the clock and status mirror
        live_score: Option<(u32, u32)>,
        /// `Some(None)` nulls the marker (half-time), `None` leaves it alone
        elapsed_min: Option<Option<u32>>,
        external_status: String,
    },
    ApplyFinish {
        home_score: u32,
        away_score: u32,
        decided_by: DecidedBy,
        external_status: String,
    },
}

/// A stored external-id binding that no longer verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleBinding {
    pub game_id: String,
    pub external_id: i64,
    /// True when the game was finalized under the bad binding and must be
    /// reset to UPCOMING with its scores cleared
    pub reset_to_upcoming: bool,
    pub reason: String,
}

/// A candidate that existed but was not applied, kept for observability
/// and fallback disambiguation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedUpdate {
    pub fixture_id: i64,
    pub game_id: Option<String>,
    pub reason: String,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Ids of games that received any write this pass
    pub updated_games: Vec<String>,
    pub matched_count: u32,
    pub rejected_count: u32,
    pub unmatched_count: u32,
    /// Detail rows for rejected and stale-binding outcomes
    pub rejections: Vec<RejectedUpdate>,
}
