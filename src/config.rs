//! Reconciler configuration.
//!
//! All thresholds and windows the matching pipeline and decision engine
//! use. The values are empirically chosen in production, not derived, so
//! every one of them is tunable here and via environment variables.

use std::env;
use std::time::Duration;

/// Tunable thresholds for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Minimum team-name score for any match to be returned at all.
    /// Only rejects true garbage; real gating happens via tiers.
    pub acceptance_floor: f64,
    /// Team-name score required by the live-pool and full-pool strategies
    pub strong_match_threshold: f64,
    /// Date window for MEDIUM acceptance in the full-pool strategy
    pub medium_date_window_min: i64,
    /// Date window for LOW acceptance with strict competition agreement
    pub low_date_window_min: i64,
    /// Competition score required for MEDIUM in the full-pool strategy
    pub medium_competition_score: f64,
    /// Competition score required for LOW inside the wide date window
    pub low_competition_score_far: f64,
    /// Competition score required for LOW inside the narrow date window
    pub low_competition_score_near: f64,
    /// Maximum kickoff drift before a stored external-id binding is stale
    pub id_binding_window_days: i64,
    /// Drift below which an id-verified match counts as HIGH confidence
    pub id_high_confidence_min: i64,
    /// Maximum date drift a LOW-tier update may carry
    pub low_tier_max_drift_min: i64,
    /// Maximum date drift for any FINISHED transition
    pub finish_max_drift_min: i64,
    /// LIVE games older than this with no fixture match are auto-finished
    pub auto_finish_after: Duration,
    /// Capacity of the fixture-id -> game-id hint cache
    pub hint_cache_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            acceptance_floor: 0.3,
            strong_match_threshold: 0.9,
            medium_date_window_min: 30,
            low_date_window_min: 120,
            medium_competition_score: 0.7,
            low_competition_score_far: 0.9,
            low_competition_score_near: 0.6,
            id_binding_window_days: 7,
            id_high_confidence_min: 60,
            low_tier_max_drift_min: 60,
            finish_max_drift_min: 30,
            auto_finish_after: Duration::from_secs(3 * 3600),
            hint_cache_capacity: 1000,
        }
    }
}

impl ReconcilerConfig {
    /// Create config from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            acceptance_floor: env_f64("RECONCILER_ACCEPTANCE_FLOOR", defaults.acceptance_floor),
            strong_match_threshold: env_f64(
                "RECONCILER_STRONG_MATCH_THRESHOLD",
                defaults.strong_match_threshold,
            ),
            medium_date_window_min: env_i64(
                "RECONCILER_MEDIUM_DATE_WINDOW_MIN",
                defaults.medium_date_window_min,
            ),
            low_date_window_min: env_i64(
                "RECONCILER_LOW_DATE_WINDOW_MIN",
                defaults.low_date_window_min,
            ),
            medium_competition_score: env_f64(
                "RECONCILER_MEDIUM_COMPETITION_SCORE",
                defaults.medium_competition_score,
            ),
            low_competition_score_far: env_f64(
                "RECONCILER_LOW_COMPETITION_SCORE_FAR",
                defaults.low_competition_score_far,
            ),
            low_competition_score_near: env_f64(
                "RECONCILER_LOW_COMPETITION_SCORE_NEAR",
                defaults.low_competition_score_near,
            ),
            id_binding_window_days: env_i64(
                "RECONCILER_ID_BINDING_WINDOW_DAYS",
                defaults.id_binding_window_days,
            ),
            id_high_confidence_min: env_i64(
                "RECONCILER_ID_HIGH_CONFIDENCE_MIN",
                defaults.id_high_confidence_min,
            ),
            low_tier_max_drift_min: env_i64(
                "RECONCILER_LOW_TIER_MAX_DRIFT_MIN",
                defaults.low_tier_max_drift_min,
            ),
            finish_max_drift_min: env_i64(
                "RECONCILER_FINISH_MAX_DRIFT_MIN",
                defaults.finish_max_drift_min,
            ),
            auto_finish_after: Duration::from_secs(
                env_i64(
                    "RECONCILER_AUTO_FINISH_AFTER_SECS",
                    defaults.auto_finish_after.as_secs() as i64,
                ) as u64,
            ),
            hint_cache_capacity: env_i64(
                "RECONCILER_HINT_CACHE_CAPACITY",
                defaults.hint_cache_capacity as i64,
            ) as usize,
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_production_constants() {
        let cfg = ReconcilerConfig::default();
        assert_eq!(cfg.acceptance_floor, 0.3);
        assert_eq!(cfg.strong_match_threshold, 0.9);
        assert_eq!(cfg.medium_date_window_min, 30);
        assert_eq!(cfg.low_date_window_min, 120);
        assert_eq!(cfg.id_binding_window_days, 7);
        assert_eq!(cfg.finish_max_drift_min, 30);
        assert_eq!(cfg.auto_finish_after, Duration::from_secs(10_800));
        assert_eq!(cfg.hint_cache_capacity, 1000);
    }

    #[test]
    fn test_from_env_falls_back_to_defaults() {
        // No RECONCILER_* variables set in the test environment
        let cfg = ReconcilerConfig::from_env();
        assert_eq!(cfg.strong_match_threshold, 0.9);
        assert_eq!(cfg.hint_cache_capacity, 1000);
    }
}
