//! Fixed-Value Stats Adapter
//!
//! Implements the `SiteStatsSource` port without a database. Serves the
//! `--dry-run` mode and lets tests drive the collector and HTTP endpoint with
//! known counts or a known failure.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{SiteStats, SiteStatsSource};
use crate::error::{Error, Result};

#[derive(Debug)]
enum Outcome {
    Stats(SiteStats),
    Fail(String),
}

/// Returns the same counts (or the same failure) on every sample.
#[derive(Debug)]
pub struct FixedStatsSource {
    outcome: Outcome,
    samples: AtomicU64,
}

impl FixedStatsSource {
    /// Always report `stats`.
    pub fn new(stats: SiteStats) -> Self {
        Self {
            outcome: Outcome::Stats(stats),
            samples: AtomicU64::new(0),
        }
    }

    /// Always report zero for every count.
    pub fn zeros() -> Self {
        Self::new(SiteStats::default())
    }

    /// Always fail as if the query against `table` had failed.
    pub fn failing(table: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail(table.into()),
            samples: AtomicU64::new(0),
        }
    }

    /// Number of times `sample` has been called.
    pub fn sample_count(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SiteStatsSource for FixedStatsSource {
    async fn sample(&self) -> Result<SiteStats> {
        self.samples.fetch_add(1, Ordering::Relaxed);
        match &self.outcome {
            Outcome::Stats(stats) => {
                debug!(?stats, "Serving fixed site stats");
                Ok(*stats)
            }
            Outcome::Fail(table) => Err(Error::DatabaseQueryFailed {
                table: table.clone(),
                source: sqlx::Error::Protocol(format!("simulated failure on {}", table)),
            }),
        }
    }

    fn describe_target(&self) -> String {
        "fixed".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_fixed_values_every_time() {
        let source = FixedStatsSource::new(SiteStats::new(3.0, 5.0, 10.0));

        assert_eq!(source.sample().await.unwrap(), SiteStats::new(3.0, 5.0, 10.0));
        assert_eq!(source.sample().await.unwrap(), SiteStats::new(3.0, 5.0, 10.0));
        assert_eq!(source.sample_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_source() {
        let source = FixedStatsSource::failing("wp_users");
        let err = source.sample().await.unwrap_err();

        assert_matches!(&err, Error::DatabaseQueryFailed { table, .. } if table == "wp_users");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_zeros() {
        let source = FixedStatsSource::zeros();
        assert_eq!(source.sample().await.unwrap(), SiteStats::default());
    }
}
