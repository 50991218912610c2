//! Candidate-game search for one external fixture.
//!
//! Three strategies, tried in priority order, first success wins:
//! 1. strict matching inside the currently-LIVE pool
//! 2. stored external-id binding with mandatory re-verification
//! 3. scored matching over the full in-flight pool
//!
//! A failed re-verification of a stored binding is reported as a
//! `StaleBinding` so the runner can clear it; the fixture then still falls
//! through to the scored search on its own evidence.

use tracing::debug;

use super::{competition_similarity, find_best_match};
use crate::config::ReconcilerConfig;
use crate::types::{
    ConfidenceTier, ExternalFixture, GameStatus, InternalGame, MatchCandidate, MatchStrategy,
    StaleBinding, TeamCandidate,
};

/// Outcome of candidate search for one fixture.
#[derive(Debug, Clone, Default)]
pub struct CandidateSearch {
    pub candidate: Option<MatchCandidate>,
    pub stale_binding: Option<StaleBinding>,
}

pub struct CandidateGameFinder<'a> {
    cfg: &'a ReconcilerConfig,
}

impl<'a> CandidateGameFinder<'a> {
    pub fn new(cfg: &'a ReconcilerConfig) -> Self {
        Self { cfg }
    }

    /// Produce the best internal game for `fixture` from `pool`.
    ///
    /// `hint` is a game id remembered from a previous pass; it only widens
    /// the external-id strategy's candidate set and goes through the same
    /// verification as a stored binding.
    pub fn find(
        &self,
        fixture: &ExternalFixture,
        pool: &[InternalGame],
        hint: Option<&str>,
    ) -> CandidateSearch {
        let mut search = CandidateSearch::default();

        if let Some(candidate) = self.live_pool_match(fixture, pool) {
            search.candidate = Some(candidate);
            return search;
        }

        match self.external_id_match(fixture, pool, hint) {
            IdLookup::Verified(candidate) => {
                search.candidate = Some(candidate);
                return search;
            }
            IdLookup::Stale(binding) => {
                search.stale_binding = Some(binding);
            }
            IdLookup::NoBinding => {}
        }

        search.candidate = self.full_pool_match(fixture, pool);
        search
    }

    /// Strategy 1: both team names must match strongly and resolve to the
    /// two teams of the same currently-LIVE game. A game already known to
    /// be LIVE is overwhelmingly likely to be the right target for a
    /// same-day live fixture, so the bar is on name precision, not on
    /// date or competition corroboration.
    fn live_pool_match(
        &self,
        fixture: &ExternalFixture,
        pool: &[InternalGame],
    ) -> Option<MatchCandidate> {
        let live: Vec<&InternalGame> = pool
            .iter()
            .filter(|g| g.status == GameStatus::Live)
            .collect();
        if live.is_empty() {
            return None;
        }

        let teams: Vec<TeamCandidate> = live
            .iter()
            .flat_map(|g| [g.home_team.clone(), g.away_team.clone()])
            .collect();

        let threshold = self.cfg.strong_match_threshold;
        let home = find_best_match(&fixture.home_name, &teams, threshold)?;
        let away = find_best_match(&fixture.away_name, &teams, threshold)?;
        if home.score < threshold || away.score < threshold || home.team.id == away.team.id {
            return None;
        }

        // First game whose two teams are exactly the resolved pair
        let game = live.iter().find(|g| {
            let ids = [g.home_team.id.as_str(), g.away_team.id.as_str()];
            ids.contains(&home.team.id.as_str()) && ids.contains(&away.team.id.as_str())
        })?;

        debug!(
            fixture_id = fixture.external_id,
            game_id = %game.id,
            home_score = home.score,
            away_score = away.score,
            "live-pool match"
        );

        Some(self.candidate(
            fixture,
            game,
            ConfidenceTier::High,
            MatchStrategy::LivePoolMatch,
            home.score.min(away.score),
        ))
    }

    /// Strategy 2: a stored external-id binding (or a cached hint from an
    /// earlier pass) is a candidate, but only after independent
    /// re-verification of names, competition and date. Verification
    /// failure means the binding is stale and must be cleared, not kept.
    fn external_id_match(
        &self,
        fixture: &ExternalFixture,
        pool: &[InternalGame],
        hint: Option<&str>,
    ) -> IdLookup {
        let bound = pool
            .iter()
            .find(|g| g.external_id == Some(fixture.external_id))
            .or_else(|| hint.and_then(|id| pool.iter().find(|g| g.id == id)));
        let game = match bound {
            Some(g) => g,
            None => return IdLookup::NoBinding,
        };
        // A hint is only advisory; nothing to clear if it fails to verify
        let stored = game.external_id == Some(fixture.external_id);

        let stale = |reason: &str| {
            if stored {
                IdLookup::Stale(StaleBinding {
                    game_id: game.id.clone(),
                    external_id: fixture.external_id,
                    reset_to_upcoming: game.status == GameStatus::Finished
                        && game.external_status.is_some(),
                    reason: reason.to_string(),
                })
            } else {
                IdLookup::NoBinding
            }
        };

        let team_score = match self.both_teams_match(fixture, game, self.cfg.acceptance_floor) {
            Some(score) => score,
            None => return stale("team names no longer verify"),
        };

        let competition_score = self.fixture_competition_score(fixture, game);
        if competition_score < 0.8 {
            return stale("competition name no longer verifies");
        }

        let date_diff = date_diff_min(fixture, game);
        let tier = match date_diff {
            Some(diff) if diff > self.cfg.id_binding_window_days * 24 * 60 => {
                return stale("kickoff drifted outside the binding window");
            }
            Some(diff) if diff <= self.cfg.id_high_confidence_min => ConfidenceTier::High,
            // Unknown kickoff cannot corroborate beyond MEDIUM
            _ => ConfidenceTier::Medium,
        };

        IdLookup::Verified(self.candidate(
            fixture,
            game,
            tier,
            MatchStrategy::ExternalId,
            team_score,
        ))
    }

    /// Strategy 3: scored fallback over the whole in-flight pool. Both
    /// names must match strongly; remaining games are ranked by
    /// competition similarity first, date proximity second, and the top
    /// candidate is tiered by how well those corroborate.
    fn full_pool_match(
        &self,
        fixture: &ExternalFixture,
        pool: &[InternalGame],
    ) -> Option<MatchCandidate> {
        let teams: Vec<TeamCandidate> = pool
            .iter()
            .flat_map(|g| [g.home_team.clone(), g.away_team.clone()])
            .collect();

        let threshold = self.cfg.strong_match_threshold;
        let home = find_best_match(&fixture.home_name, &teams, threshold)?;
        let away = find_best_match(&fixture.away_name, &teams, threshold)?;
        if home.score < threshold || away.score < threshold || home.team.id == away.team.id {
            return None;
        }

        let mut ranked: Vec<(&InternalGame, f64, Option<i64>)> = pool
            .iter()
            .filter(|g| {
                let ids = [g.home_team.id.as_str(), g.away_team.id.as_str()];
                ids.contains(&home.team.id.as_str()) && ids.contains(&away.team.id.as_str())
            })
            .map(|g| {
                (
                    g,
                    self.fixture_competition_score(fixture, g),
                    date_diff_min(fixture, g),
                )
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.2.unwrap_or(i64::MAX).cmp(&b.2.unwrap_or(i64::MAX)))
        });

        let (game, competition_score, date_diff) = ranked.into_iter().next()?;
        // An unknown kickoff cannot corroborate any tier here
        let diff = date_diff?;

        let tier = if diff <= self.cfg.medium_date_window_min
            && competition_score >= self.cfg.medium_competition_score
        {
            ConfidenceTier::Medium
        } else if (diff <= self.cfg.low_date_window_min
            && competition_score >= self.cfg.low_competition_score_far)
            || (diff <= self.cfg.medium_date_window_min
                && competition_score >= self.cfg.low_competition_score_near)
        {
            ConfidenceTier::Low
        } else {
            return None;
        };

        Some(self.candidate(
            fixture,
            game,
            tier,
            MatchStrategy::FullPool,
            home.score.min(away.score),
        ))
    }

    /// Match both fixture names against one game's pair of teams,
    /// requiring them to resolve to distinct teams. Returns the weaker of
    /// the two scores.
    fn both_teams_match(
        &self,
        fixture: &ExternalFixture,
        game: &InternalGame,
        floor: f64,
    ) -> Option<f64> {
        let teams = [game.home_team.clone(), game.away_team.clone()];
        let home = find_best_match(&fixture.home_name, &teams, floor)?;
        let away = find_best_match(&fixture.away_name, &teams, floor)?;
        if home.team.id == away.team.id {
            return None;
        }
        Some(home.score.min(away.score))
    }

    fn fixture_competition_score(&self, fixture: &ExternalFixture, game: &InternalGame) -> f64 {
        fixture
            .competition
            .as_deref()
            .map(|c| competition_similarity(c, &game.competition))
            .unwrap_or(0.0)
    }

    fn candidate(
        &self,
        fixture: &ExternalFixture,
        game: &InternalGame,
        tier: ConfidenceTier,
        strategy: MatchStrategy,
        team_score: f64,
    ) -> MatchCandidate {
        MatchCandidate {
            game: game.clone(),
            tier,
            strategy,
            team_score,
            competition_score: self.fixture_competition_score(fixture, game),
            date_diff_min: date_diff_min(fixture, game),
        }
    }
}

enum IdLookup {
    Verified(MatchCandidate),
    Stale(StaleBinding),
    NoBinding,
}

fn date_diff_min(fixture: &ExternalFixture, game: &InternalGame) -> Option<i64> {
    fixture
        .kickoff
        .map(|k| (k - game.scheduled_at).num_minutes().abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FixtureStatus, ScoringRules};
    use chrono::{Duration, TimeZone, Utc};

    fn team(id: &str, name: &str) -> TeamCandidate {
        TeamCandidate {
            id: id.to_string(),
            name: name.to_string(),
            short_name: None,
        }
    }

    fn make_game(id: &str, home: &str, away: &str, status: GameStatus) -> InternalGame {
        InternalGame {
            id: id.to_string(),
            home_team: team(&format!("{id}-h"), home),
            away_team: team(&format!("{id}-a"), away),
            scheduled_at: Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
            competition: "Premier League".to_string(),
            sport: "soccer".to_string(),
            status,
            external_id: None,
            external_status: None,
            home_score_live: None,
            away_score_live: None,
            home_score_final: None,
            away_score_final: None,
            elapsed_min: None,
            decided_by: None,
            last_synced_at: None,
            scoring: ScoringRules::default(),
        }
    }

    fn make_fixture(id: i64, home: &str, away: &str, status: FixtureStatus) -> ExternalFixture {
        ExternalFixture {
            external_id: id,
            home_name: home.to_string(),
            away_name: away.to_string(),
            kickoff: Some(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()),
            competition: Some("Premier League".to_string()),
            status,
            status_code: "LIVE".to_string(),
            home_score: Some(1),
            away_score: Some(0),
            elapsed_min: Some(55),
        }
    }

    #[test]
    fn test_live_pool_match_fires_for_live_game() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let pool = vec![
            make_game("a", "Manchester United", "Liverpool", GameStatus::Live),
            make_game("b", "Arsenal", "Chelsea", GameStatus::Live),
        ];
        let fixture = make_fixture(77, "Man Utd", "Liverpool FC", FixtureStatus::Live);

        let search = finder.find(&fixture, &pool, None);
        let candidate = search.candidate.expect("live-pool candidate");
        assert_eq!(candidate.game.id, "a");
        assert_eq!(candidate.tier, ConfidenceTier::High);
        assert_eq!(candidate.strategy, MatchStrategy::LivePoolMatch);
        assert!(candidate.team_score >= 0.9);
    }

    #[test]
    fn test_live_pool_requires_same_game() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        // The two fixture teams exist, but in different internal games
        let pool = vec![
            make_game("a", "Manchester United", "Arsenal", GameStatus::Live),
            make_game("b", "Chelsea", "Liverpool", GameStatus::Live),
        ];
        let mut fixture = make_fixture(77, "Manchester United", "Liverpool", FixtureStatus::Live);
        fixture.competition = None;
        fixture.kickoff = None;

        let search = finder.find(&fixture, &pool, None);
        assert!(search.candidate.is_none());
    }

    #[test]
    fn test_external_id_verified_high_within_an_hour() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let mut game = make_game("a", "Manchester United", "Liverpool", GameStatus::Upcoming);
        game.external_id = Some(42);
        let pool = vec![game];
        let fixture = make_fixture(42, "Manchester United", "Liverpool", FixtureStatus::Live);

        let search = finder.find(&fixture, &pool, None);
        let candidate = search.candidate.expect("verified binding");
        assert_eq!(candidate.tier, ConfidenceTier::High);
        assert_eq!(candidate.strategy, MatchStrategy::ExternalId);
        assert!(search.stale_binding.is_none());
    }

    #[test]
    fn test_external_id_medium_beyond_an_hour() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let mut game = make_game("a", "Manchester United", "Liverpool", GameStatus::Upcoming);
        game.external_id = Some(42);
        let pool = vec![game];
        let mut fixture = make_fixture(42, "Manchester United", "Liverpool", FixtureStatus::Live);
        fixture.kickoff = Some(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap() + Duration::hours(5));

        let search = finder.find(&fixture, &pool, None);
        assert_eq!(search.candidate.unwrap().tier, ConfidenceTier::Medium);
    }

    #[test]
    fn test_external_id_stale_on_date_drift() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let mut game = make_game("a", "Manchester United", "Liverpool", GameStatus::Upcoming);
        game.external_id = Some(42);
        let pool = vec![game];
        let mut fixture = make_fixture(42, "Manchester United", "Liverpool", FixtureStatus::Live);
        fixture.kickoff = Some(Utc.with_ymd_and_hms(2024, 3, 20, 15, 0, 0).unwrap());

        let search = finder.find(&fixture, &pool, None);
        let stale = search.stale_binding.expect("stale binding");
        assert_eq!(stale.game_id, "a");
        assert_eq!(stale.external_id, 42);
        assert!(!stale.reset_to_upcoming);
    }

    #[test]
    fn test_external_id_stale_on_competition_mismatch_flags_reset() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let mut game = make_game("a", "Manchester United", "Liverpool", GameStatus::Finished);
        game.external_id = Some(42);
        game.external_status = Some("FT".to_string());
        let pool = vec![game];
        let mut fixture = make_fixture(42, "Manchester United", "Liverpool", FixtureStatus::Live);
        fixture.competition = Some("Championship".to_string());

        let search = finder.find(&fixture, &pool, None);
        let stale = search.stale_binding.expect("stale binding");
        assert!(stale.reset_to_upcoming);
    }

    #[test]
    fn test_full_pool_medium_with_close_date_and_competition() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        // Not LIVE, so strategy 1 cannot fire
        let pool = vec![make_game("a", "Manchester United", "Liverpool", GameStatus::Upcoming)];
        let fixture = make_fixture(99, "Manchester United", "Liverpool", FixtureStatus::Live);

        let search = finder.find(&fixture, &pool, None);
        let candidate = search.candidate.expect("full-pool candidate");
        assert_eq!(candidate.tier, ConfidenceTier::Medium);
        assert_eq!(candidate.strategy, MatchStrategy::FullPool);
    }

    #[test]
    fn test_full_pool_low_with_wide_date_and_exact_competition() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let pool = vec![make_game("a", "Manchester United", "Liverpool", GameStatus::Upcoming)];
        let mut fixture = make_fixture(99, "Manchester United", "Liverpool", FixtureStatus::Live);
        fixture.kickoff = Some(Utc.with_ymd_and_hms(2024, 3, 1, 16, 30, 0).unwrap());

        let search = finder.find(&fixture, &pool, None);
        assert_eq!(search.candidate.unwrap().tier, ConfidenceTier::Low);
    }

    #[test]
    fn test_full_pool_rejects_unknown_kickoff() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let pool = vec![make_game("a", "Manchester United", "Liverpool", GameStatus::Upcoming)];
        let mut fixture = make_fixture(99, "Manchester United", "Liverpool", FixtureStatus::Live);
        fixture.kickoff = None;

        let search = finder.find(&fixture, &pool, None);
        assert!(search.candidate.is_none());
    }

    #[test]
    fn test_unmatched_fixture_yields_nothing() {
        let cfg = ReconcilerConfig::default();
        let finder = CandidateGameFinder::new(&cfg);
        let pool = vec![make_game("a", "Manchester United", "Liverpool", GameStatus::Live)];
        let fixture = make_fixture(99, "Rapid Wien", "Sturm Graz", FixtureStatus::Live);

        let search = finder.find(&fixture, &pool, None);
        assert!(search.candidate.is_none());
        assert!(search.stale_binding.is_none());
    }
}
