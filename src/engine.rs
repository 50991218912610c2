//! Reconciliation decision engine.
//!
//! A pure state machine over one (fixture, candidate) pair. Gates run in a
//! fixed order and any failing gate yields a `Skip`; the surviving update
//! is clamped so that status can only move forward and a FINISHED
//! transition needs independent corroboration regardless of tier.
//!
//! Invariants enforced here:
//! - FINISHED games are immutable
//! - LIVE never regresses to UPCOMING
//! - LOW confidence never finishes a game and never writes under date or
//!   competition disagreement
//! - half-time is never read as finished, and nulls the elapsed marker

use tracing::debug;

use crate::config::ReconcilerConfig;
use crate::types::{
    ConfidenceTier, ExternalFixture, FixtureStatus, GameStatus, MatchCandidate,
    ReconciliationDecision, SkipReason,
};

pub struct ReconciliationDecisionEngine<'a> {
    cfg: &'a ReconcilerConfig,
}

impl<'a> ReconciliationDecisionEngine<'a> {
    pub fn new(cfg: &'a ReconcilerConfig) -> Self {
        Self { cfg }
    }

    /// Decide what, if anything, to write for this fixture/candidate pair.
    pub fn decide(
        &self,
        fixture: &ExternalFixture,
        candidate: &MatchCandidate,
    ) -> ReconciliationDecision {
        let game = &candidate.game;

        // Gate 1: a finished game is immutable to the engine
        match game.status {
            GameStatus::Finished => return skip(SkipReason::AlreadyFinished),
            GameStatus::Cancelled | GameStatus::Rescheduled => {
                return skip(SkipReason::GameNotSyncable)
            }
            GameStatus::Upcoming | GameStatus::Live => {}
        }

        // Gate 2: never move a game anywhere on a not-started signal alone
        match fixture.status {
            FixtureStatus::NotStarted | FixtureStatus::Postponed | FixtureStatus::Cancelled => {
                return skip(SkipReason::FixtureNotStarted)
            }
            FixtureStatus::Unknown => return skip(SkipReason::UnknownFixtureStatus),
            _ => {}
        }

        // Gate 3: map the fixture status to a target. Gate 2 already
        // rejected every not-started signal, so a LIVE game can never be
        // regressed to UPCOMING from here on.
        let mut target = if fixture.status.is_finished() {
            GameStatus::Finished
        } else {
            GameStatus::Live
        };

        let date_ok_for_low = candidate
            .date_diff_min
            .map(|d| d <= self.cfg.low_tier_max_drift_min)
            .unwrap_or(false);

        // Gate 4: LOW confidence may refresh a live score at best
        if candidate.tier == ConfidenceTier::Low {
            if target == GameStatus::Finished {
                return skip(SkipReason::LowConfidenceFinish);
            }
            if !date_ok_for_low {
                return skip(SkipReason::LowConfidenceDateDrift);
            }
            if !candidate.competition_loosely_matches() {
                return skip(SkipReason::LowConfidenceCompetition);
            }
        }

        // Gate 5: finishing needs corroboration regardless of tier; on
        // weak evidence the status target is clamped back and only the
        // live fields refresh
        if target == GameStatus::Finished {
            let date_ok = candidate
                .date_diff_min
                .map(|d| d <= self.cfg.finish_max_drift_min)
                .unwrap_or(false);
            if !(candidate.competition_loosely_matches() && date_ok) {
                debug!(
                    fixture_id = fixture.external_id,
                    game_id = %game.id,
                    competition_score = candidate.competition_score,
                    date_diff_min = ?candidate.date_diff_min,
                    "finish-safety clamp: keeping current status"
                );
                target = game.status;
            }
        }

        if target == GameStatus::Finished {
            return match (fixture.home_score, fixture.away_score) {
                (Some(home), Some(away)) => ReconciliationDecision::ApplyFinish {
                    home_score: home,
                    away_score: away,
                    decided_by: fixture
                        .status
                        .decided_by()
                        .unwrap_or(crate::types::DecidedBy::Regulation),
                    external_status: fixture.status_code.clone(),
                },
                _ => skip(SkipReason::MissingFinalScore),
            };
        }

        // Live refresh: scores and clock resync every pass even when
        // unchanged, so downstream display stays current. Half-time nulls
        // the elapsed marker instead of freezing a stale minute count.
        let elapsed = if fixture.status == FixtureStatus::HalfTime {
            Some(None)
        } else {
            fixture.elapsed_min.map(Some)
        };
        ReconciliationDecision::ApplyLiveUpdate {
            status: target,
            live_score: fixture.home_score.zip(fixture.away_score),
            elapsed_min: elapsed,
            external_status: fixture.status_code.clone(),
        }
    }
}

fn skip(reason: SkipReason) -> ReconciliationDecision {
    ReconciliationDecision::Skip { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DecidedBy, InternalGame, MatchStrategy, ScoringRules, TeamCandidate,
    };
    use chrono::{TimeZone, Utc};

    fn make_game(status: GameStatus) -> InternalGame {
        InternalGame {
            id: "g1".to_string(),
            home_team: TeamCandidate {
                id: "t1".to_string(),
                name: "Manchester United".to_string(),
                short_name: None,
            },
            away_team: TeamCandidate {
                id: "t2".to_string(),
                name: "Liverpool".to_string(),
                short_name: None,
            },
            scheduled_at: Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
            competition: "Premier League".to_string(),
            sport: "soccer".to_string(),
            status,
            external_id: Some(42),
            external_status: None,
            home_score_live: Some(0),
            away_score_live: Some(0),
            home_score_final: None,
            away_score_final: None,
            elapsed_min: Some(40),
            decided_by: None,
            last_synced_at: None,
            scoring: ScoringRules::default(),
        }
    }

    fn make_candidate(
        status: GameStatus,
        tier: ConfidenceTier,
        competition_score: f64,
        date_diff_min: Option<i64>,
    ) -> MatchCandidate {
        MatchCandidate {
            game: make_game(status),
            tier,
            strategy: MatchStrategy::FullPool,
            team_score: 0.95,
            competition_score,
            date_diff_min,
        }
    }

    fn make_fixture(status: FixtureStatus, code: &str) -> ExternalFixture {
        ExternalFixture {
            external_id: 42,
            home_name: "Man Utd".to_string(),
            away_name: "Liverpool FC".to_string(),
            kickoff: Some(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()),
            competition: Some("Premier League".to_string()),
            status,
            status_code: code.to_string(),
            home_score: Some(1),
            away_score: Some(0),
            elapsed_min: Some(55),
        }
    }

    #[test]
    fn test_finished_game_is_immutable() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Finished, ConfidenceTier::High, 1.0, Some(0));
        let fixture = make_fixture(FixtureStatus::Live, "2H");

        assert_eq!(
            engine.decide(&fixture, &candidate),
            ReconciliationDecision::Skip {
                reason: SkipReason::AlreadyFinished
            }
        );
    }

    #[test]
    fn test_not_started_never_regresses_live_game() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::High, 1.0, Some(0));
        let fixture = make_fixture(FixtureStatus::NotStarted, "NS");

        assert_eq!(
            engine.decide(&fixture, &candidate),
            ReconciliationDecision::Skip {
                reason: SkipReason::FixtureNotStarted
            }
        );
    }

    #[test]
    fn test_live_update_refreshes_scores_and_clock() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::High, 1.0, Some(0));
        let fixture = make_fixture(FixtureStatus::Live, "2H");

        match engine.decide(&fixture, &candidate) {
            ReconciliationDecision::ApplyLiveUpdate {
                status,
                live_score,
                elapsed_min,
                external_status,
            } => {
                assert_eq!(status, GameStatus::Live);
                assert_eq!(live_score, Some((1, 0)));
                assert_eq!(elapsed_min, Some(Some(55)));
                assert_eq!(external_status, "2H");
            }
            other => panic!("expected live update, got {other:?}"),
        }
    }

    #[test]
    fn test_half_time_nulls_elapsed_and_never_finishes() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::High, 1.0, Some(0));
        let fixture = make_fixture(FixtureStatus::HalfTime, "HT");

        match engine.decide(&fixture, &candidate) {
            ReconciliationDecision::ApplyLiveUpdate {
                status, elapsed_min, ..
            } => {
                assert_eq!(status, GameStatus::Live);
                assert_eq!(elapsed_min, Some(None));
            }
            other => panic!("expected live update, got {other:?}"),
        }
    }

    #[test]
    fn test_verified_finish_carries_decided_by() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::High, 1.0, Some(10));
        let fixture = make_fixture(FixtureStatus::FinishedExtraTime, "AET");

        match engine.decide(&fixture, &candidate) {
            ReconciliationDecision::ApplyFinish {
                home_score,
                away_score,
                decided_by,
                ..
            } => {
                assert_eq!((home_score, away_score), (1, 0));
                assert_eq!(decided_by, DecidedBy::ExtraTime);
            }
            other => panic!("expected finish, got {other:?}"),
        }
    }

    #[test]
    fn test_finish_safety_clamps_on_competition_mismatch() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        // MEDIUM candidate, mismatched competition, 3 days of drift:
        // must never finish, even on a finished status report
        let candidate = make_candidate(
            GameStatus::Live,
            ConfidenceTier::Medium,
            0.0,
            Some(3 * 24 * 60),
        );
        let fixture = make_fixture(FixtureStatus::Finished, "FT");

        match engine.decide(&fixture, &candidate) {
            ReconciliationDecision::ApplyLiveUpdate { status, .. } => {
                assert_eq!(status, GameStatus::Live);
            }
            other => panic!("expected clamped live update, got {other:?}"),
        }
    }

    #[test]
    fn test_low_tier_never_finishes() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::Low, 1.0, Some(0));
        let fixture = make_fixture(FixtureStatus::Finished, "FT");

        assert_eq!(
            engine.decide(&fixture, &candidate),
            ReconciliationDecision::Skip {
                reason: SkipReason::LowConfidenceFinish
            }
        );
    }

    #[test]
    fn test_low_tier_rejects_date_drift() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::Low, 1.0, Some(90));
        let fixture = make_fixture(FixtureStatus::Live, "1H");

        assert_eq!(
            engine.decide(&fixture, &candidate),
            ReconciliationDecision::Skip {
                reason: SkipReason::LowConfidenceDateDrift
            }
        );
    }

    #[test]
    fn test_low_tier_rejects_competition_mismatch() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::Low, 0.5, Some(10));
        let fixture = make_fixture(FixtureStatus::Live, "1H");

        assert_eq!(
            engine.decide(&fixture, &candidate),
            ReconciliationDecision::Skip {
                reason: SkipReason::LowConfidenceCompetition
            }
        );
    }

    #[test]
    fn test_finish_without_scores_is_skipped() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::High, 1.0, Some(0));
        let mut fixture = make_fixture(FixtureStatus::Finished, "FT");
        fixture.home_score = None;

        assert_eq!(
            engine.decide(&fixture, &candidate),
            ReconciliationDecision::Skip {
                reason: SkipReason::MissingFinalScore
            }
        );
    }

    #[test]
    fn test_idempotent_on_unchanged_fixture() {
        let cfg = ReconcilerConfig::default();
        let engine = ReconciliationDecisionEngine::new(&cfg);
        let candidate = make_candidate(GameStatus::Live, ConfidenceTier::High, 1.0, Some(0));
        let fixture = make_fixture(FixtureStatus::Live, "2H");

        let first = engine.decide(&fixture, &candidate);
        let second = engine.decide(&fixture, &candidate);
        assert_eq!(first, second);
    }
}
