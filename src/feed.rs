//! External fixture feed abstraction.
//!
//! Defines the `ExternalFixtureFeed` trait the runner consumes. Concrete
//! HTTP clients live with the embedding application; this crate ships a
//! deterministic in-memory feed for tests and local runs, plus the parser
//! for the feed's short status codes.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{ExternalFixture, FixtureStatus};

/// Source of external fixture records.
///
/// Any call may fail on network errors; the runner treats a failed call as
/// "zero fixtures from this call" and continues.
#[async_trait]
pub trait ExternalFixtureFeed: Send + Sync {
    /// Fixtures currently in progress
    async fn get_live_fixtures(&self) -> Result<Vec<ExternalFixture>>;

    /// Fixtures kicking off (or finished) inside the window
    async fn get_fixtures_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalFixture>>;

    /// Direct lookup by the feed's match id. More reliable than date-range
    /// queries; preferred when a game already stores a binding.
    async fn get_fixture_by_id(&self, external_id: i64) -> Result<Option<ExternalFixture>>;

    /// Feed name for logging and debugging
    fn feed_name(&self) -> &str;
}

/// Parse a feed short status code into a `FixtureStatus`.
///
/// Codes follow the common live-score vocabulary. Unrecognized codes map
/// to `Unknown` and are skipped downstream, never treated as finished.
pub fn parse_fixture_status(code: &str) -> FixtureStatus {
    match code.trim().to_uppercase().as_str() {
        "NS" | "TBD" => FixtureStatus::NotStarted,
        "PST" => FixtureStatus::Postponed,
        "CANC" | "ABD" | "AWD" | "WO" => FixtureStatus::Cancelled,
        "1H" | "2H" | "ET" | "P" | "BT" | "SUSP" | "INT" | "LIVE" => FixtureStatus::Live,
        "HT" => FixtureStatus::HalfTime,
        "FT" => FixtureStatus::Finished,
        "AET" => FixtureStatus::FinishedExtraTime,
        "PEN" => FixtureStatus::FinishedPenalties,
        _ => FixtureStatus::Unknown,
    }
}

/// In-memory feed with canned fixtures.
///
/// The reference implementation of the trait; used by runner tests and
/// handy for dry runs against recorded data.
#[derive(Debug, Clone, Default)]
pub struct StaticFixtureFeed {
    fixtures: Vec<ExternalFixture>,
}

impl StaticFixtureFeed {
    pub fn new(fixtures: Vec<ExternalFixture>) -> Self {
        Self { fixtures }
    }
}

#[async_trait]
impl ExternalFixtureFeed for StaticFixtureFeed {
    async fn get_live_fixtures(&self) -> Result<Vec<ExternalFixture>> {
        Ok(self
            .fixtures
            .iter()
            .filter(|f| f.status.is_live())
            .cloned()
            .collect())
    }

    async fn get_fixtures_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalFixture>> {
        Ok(self
            .fixtures
            .iter()
            .filter(|f| f.kickoff.map(|k| k >= from && k <= to).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn get_fixture_by_id(&self, external_id: i64) -> Result<Option<ExternalFixture>> {
        Ok(self
            .fixtures
            .iter()
            .find(|f| f.external_id == external_id)
            .cloned())
    }

    fn feed_name(&self) -> &str {
        "static"
    }
}
