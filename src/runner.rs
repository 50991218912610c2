//! Reconciliation pass orchestration.
//!
//! One `run_pass` call: load the LIVE pool, fetch external fixtures
//! (by-id lookups first, they are more reliable than range queries), run
//! candidate search and the decision engine per fixture in feed order,
//! apply accepted updates, recalculate points on verified finishes, and
//! sweep long-stale LIVE games that no fixture matched at all.
//!
//! Fixtures are processed strictly one at a time so later fixtures see
//! the claims made by earlier ones. Overlapping passes are refused via a
//! single-flight guard; callers schedule passes, they do not parallelize
//! them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::BoundedCache;
use crate::config::ReconcilerConfig;
use crate::engine::ReconciliationDecisionEngine;
use crate::error::ReconcileError;
use crate::feed::ExternalFixtureFeed;
use crate::matching::candidates::CandidateGameFinder;
use crate::store::{calculate_bet_points, BetStore, GameStore, GameUpdate};
use crate::types::{
    ConfidenceTier, DecidedBy, ExternalFixture, GameStatus, InternalGame, MatchCandidate,
    MatchStrategy, ReconciliationDecision, RejectedUpdate, StaleBinding, SyncReport,
};

pub struct ReconciliationRunner<F, G, B> {
    feed: F,
    games: G,
    bets: B,
    cfg: ReconcilerConfig,
    /// fixture external id -> game id remembered from earlier passes
    hints: Mutex<BoundedCache<i64, String>>,
    running: AtomicBool,
}

impl<F, G, B> ReconciliationRunner<F, G, B>
where
    F: ExternalFixtureFeed,
    G: GameStore,
    B: BetStore,
{
    pub fn new(feed: F, games: G, bets: B, cfg: ReconcilerConfig) -> Self {
        let hints = Mutex::new(BoundedCache::new(cfg.hint_cache_capacity));
        Self {
            feed,
            games,
            bets,
            cfg,
            hints,
            running: AtomicBool::new(false),
        }
    }

    /// Run one reconciliation pass against the current wall clock.
    pub async fn run_pass(&self) -> Result<SyncReport, ReconcileError> {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one reconciliation pass as of `now`. Split out so passes can be
    /// replayed against recorded data.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<SyncReport, ReconcileError> {
        let _guard = PassGuard::acquire(&self.running).ok_or(ReconcileError::SyncInProgress)?;

        let live = self.games.find_live_games().await?;
        if live.is_empty() {
            // Quota conservation: no live games means no feed calls at all
            info!("no live games; skipping external feed");
            return Ok(SyncReport::default());
        }
        info!(live_games = live.len(), feed = self.feed.feed_name(), "starting sync pass");

        let (fixtures, all_feed_calls_failed) = self.collect_fixtures(&live, now).await;
        let mut report = SyncReport::default();
        if all_feed_calls_failed {
            // Total feed unavailability: empty-effect pass, no sweep --
            // absence of fixtures is not evidence that games ended
            warn!("external feed unavailable; pass has no effect");
            return Ok(report);
        }

        let finder = CandidateGameFinder::new(&self.cfg);
        let engine = ReconciliationDecisionEngine::new(&self.cfg);
        let mut claimed: HashSet<String> = HashSet::new();
        // Games some fixture resolved to (or wrote to), applied or not;
        // only games outside this set qualify for the auto-finish sweep
        let mut fixture_touched: HashSet<String> = HashSet::new();

        for fixture in fixtures {
            let pool: Vec<InternalGame> = live
                .iter()
                .filter(|g| !claimed.contains(&g.id))
                .cloned()
                .collect();
            if pool.is_empty() {
                break;
            }

            let hint = self.hints.lock().get(&fixture.external_id).cloned();
            let search = finder.find(&fixture, &pool, hint.as_deref());

            if let Some(stale) = search.stale_binding {
                self.clear_stale_binding(&stale, now).await;
                self.hints.lock().remove(&fixture.external_id);
                fixture_touched.insert(stale.game_id.clone());
                report.rejections.push(RejectedUpdate {
                    fixture_id: fixture.external_id,
                    game_id: Some(stale.game_id),
                    reason: format!("stale binding: {}", stale.reason),
                });
            }

            let candidate = match search.candidate {
                Some(c) => {
                    fixture_touched.insert(c.game.id.clone());
                    c
                }
                None => {
                    debug!(
                        fixture_id = fixture.external_id,
                        home = %fixture.home_name,
                        away = %fixture.away_name,
                        "fixture unmatched"
                    );
                    report.unmatched_count += 1;
                    continue;
                }
            };

            match engine.decide(&fixture, &candidate) {
                ReconciliationDecision::Skip { reason } => {
                    debug!(
                        fixture_id = fixture.external_id,
                        game_id = %candidate.game.id,
                        %reason,
                        "update rejected"
                    );
                    report.rejected_count += 1;
                    report.rejections.push(RejectedUpdate {
                        fixture_id: fixture.external_id,
                        game_id: Some(candidate.game.id.clone()),
                        reason: reason.to_string(),
                    });
                }
                ReconciliationDecision::ApplyLiveUpdate {
                    status,
                    live_score,
                    elapsed_min,
                    external_status,
                } => {
                    let update = GameUpdate {
                        status: Some(status),
                        external_id: self.binding_patch(&fixture, &candidate),
                        external_status: Some(Some(external_status)),
                        live_score,
                        elapsed_min,
                        last_synced_at: Some(now),
                        ..Default::default()
                    };
                    self.apply(&fixture, &candidate, update, &mut report, &mut claimed, None)
                        .await;
                }
                ReconciliationDecision::ApplyFinish {
                    home_score,
                    away_score,
                    decided_by,
                    external_status,
                } => {
                    let update = GameUpdate {
                        status: Some(GameStatus::Finished),
                        external_id: self.binding_patch(&fixture, &candidate),
                        external_status: Some(Some(external_status)),
                        live_score: Some((home_score, away_score)),
                        final_score: Some((home_score, away_score)),
                        elapsed_min: Some(None),
                        decided_by: Some(decided_by),
                        last_synced_at: Some(now),
                        ..Default::default()
                    };
                    self.apply(
                        &fixture,
                        &candidate,
                        update,
                        &mut report,
                        &mut claimed,
                        Some((home_score, away_score)),
                    )
                    .await;
                }
            }
        }

        self.auto_finish_sweep(&live, &fixture_touched, now, &mut report)
            .await;

        info!(
            matched = report.matched_count,
            rejected = report.rejected_count,
            unmatched = report.unmatched_count,
            updated = report.updated_games.len(),
            "sync pass complete"
        );
        Ok(report)
    }

    /// Gather fixtures for this pass: direct by-id lookups for bound
    /// games first, then the live board, then today's finished fixtures.
    /// Returns the de-duplicated list and whether every call failed.
    async fn collect_fixtures(
        &self,
        live: &[InternalGame],
        now: DateTime<Utc>,
    ) -> (Vec<ExternalFixture>, bool) {
        let mut fixtures: Vec<ExternalFixture> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut calls: u32 = 0;
        let mut failures: u32 = 0;

        for game in live {
            let Some(external_id) = game.external_id else {
                continue;
            };
            calls += 1;
            match self.feed.get_fixture_by_id(external_id).await {
                Ok(Some(fixture)) => {
                    if seen.insert(fixture.external_id) {
                        fixtures.push(fixture);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    failures += 1;
                    warn!(external_id, error = %e, "fixture lookup failed");
                }
            }
        }

        calls += 1;
        match self.feed.get_live_fixtures().await {
            Ok(batch) => {
                for fixture in batch {
                    if seen.insert(fixture.external_id) {
                        fixtures.push(fixture);
                    }
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, "live fixtures fetch failed");
            }
        }

        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        calls += 1;
        match self.feed.get_fixtures_by_date_range(day_start, now).await {
            Ok(batch) => {
                for fixture in batch.into_iter().filter(|f| f.status.is_finished()) {
                    if seen.insert(fixture.external_id) {
                        fixtures.push(fixture);
                    }
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, "date-range fetch failed");
            }
        }

        (fixtures, failures == calls)
    }

    /// Bind the fixture's external id only on positively verified
    /// evidence: an already-verified stored binding, or at least MEDIUM
    /// confidence with loose competition agreement.
    fn binding_patch(
        &self,
        fixture: &ExternalFixture,
        candidate: &MatchCandidate,
    ) -> Option<Option<i64>> {
        let verified = candidate.strategy == MatchStrategy::ExternalId
            || (candidate.tier >= ConfidenceTier::Medium
                && candidate.competition_loosely_matches());
        verified.then_some(Some(fixture.external_id))
    }

    async fn apply(
        &self,
        fixture: &ExternalFixture,
        candidate: &MatchCandidate,
        update: GameUpdate,
        report: &mut SyncReport,
        claimed: &mut HashSet<String>,
        finish: Option<(u32, u32)>,
    ) {
        let game = &candidate.game;
        match self.games.update(&game.id, update).await {
            Ok(()) => {
                info!(
                    fixture_id = fixture.external_id,
                    game_id = %game.id,
                    tier = ?candidate.tier,
                    strategy = ?candidate.strategy,
                    finished = finish.is_some(),
                    "update applied"
                );
                report.matched_count += 1;
                report.updated_games.push(game.id.clone());
                claimed.insert(game.id.clone());
                self.hints.lock().put(fixture.external_id, game.id.clone());
                if let Some(final_score) = finish {
                    self.recalculate_points(game, final_score).await;
                }
            }
            Err(e) => {
                // One bad write must not block the remaining fixtures
                warn!(
                    fixture_id = fixture.external_id,
                    game_id = %game.id,
                    error = %e,
                    "persistence failure; skipping fixture"
                );
                report.rejected_count += 1;
                report.rejections.push(RejectedUpdate {
                    fixture_id: fixture.external_id,
                    game_id: Some(game.id.clone()),
                    reason: format!("persistence failure: {e}"),
                });
            }
        }
    }

    /// Clear a binding that no longer verifies. A game wrongly finalized
    /// under the bad binding is reset to UPCOMING with its scores cleared.
    async fn clear_stale_binding(&self, stale: &StaleBinding, now: DateTime<Utc>) {
        warn!(
            game_id = %stale.game_id,
            external_id = stale.external_id,
            reset = stale.reset_to_upcoming,
            reason = %stale.reason,
            "clearing stale external-id binding"
        );
        let mut update = GameUpdate {
            external_id: Some(None),
            external_status: Some(None),
            last_synced_at: Some(now),
            ..Default::default()
        };
        if stale.reset_to_upcoming {
            update.status = Some(GameStatus::Upcoming);
            update.clear_live_score = true;
            update.clear_final_score = true;
            update.elapsed_min = Some(None);
        }
        if let Err(e) = self.games.update(&stale.game_id, update).await {
            warn!(game_id = %stale.game_id, error = %e, "failed to clear stale binding");
        }
    }

    /// Finalize LIVE games that have been running far past any plausible
    /// match length and that no fixture resolved to this pass, using their
    /// last known live score. A game whose match was rejected by a gate
    /// (or whose write failed) is evidence the match is still in play and
    /// is left alone.
    async fn auto_finish_sweep(
        &self,
        live: &[InternalGame],
        fixture_touched: &HashSet<String>,
        now: DateTime<Utc>,
        report: &mut SyncReport,
    ) {
        let cutoff = chrono::Duration::from_std(self.cfg.auto_finish_after)
            .unwrap_or_else(|_| chrono::Duration::hours(3));
        for game in live {
            if fixture_touched.contains(&game.id) || now - game.scheduled_at < cutoff {
                continue;
            }
            let final_score = (
                game.home_score_live.unwrap_or(0),
                game.away_score_live.unwrap_or(0),
            );
            info!(
                game_id = %game.id,
                home = final_score.0,
                away = final_score.1,
                "auto-finishing stale live game"
            );
            let update = GameUpdate {
                status: Some(GameStatus::Finished),
                final_score: Some(final_score),
                elapsed_min: Some(None),
                decided_by: Some(DecidedBy::Regulation),
                last_synced_at: Some(now),
                ..Default::default()
            };
            match self.games.update(&game.id, update).await {
                Ok(()) => {
                    report.updated_games.push(game.id.clone());
                    self.recalculate_points(game, final_score).await;
                }
                Err(e) => {
                    warn!(game_id = %game.id, error = %e, "auto-finish failed");
                }
            }
        }
    }

    /// Recalculate points for every bet on a finalized game using the
    /// competition's scoring system. Failures are logged per bet and do
    /// not abort the pass.
    async fn recalculate_points(&self, game: &InternalGame, final_score: (u32, u32)) {
        let bets = match self.bets.find_bets_for_game(&game.id).await {
            Ok(bets) => bets,
            Err(e) => {
                warn!(game_id = %game.id, error = %e, "failed to load bets");
                return;
            }
        };
        debug!(game_id = %game.id, bets = bets.len(), "recalculating points");
        for bet in bets {
            let points = calculate_bet_points(&bet, final_score, &game.scoring);
            if let Err(e) = self.bets.update_points(&bet.id, points).await {
                warn!(bet_id = %bet.id, error = %e, "failed to write points");
            }
        }
    }
}

/// Single-flight guard: at most one pass at a time per runner.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
