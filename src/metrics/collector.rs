//! WordPress Collector
//!
//! Turns one `SiteStats` sample into three unlabeled counter families.
//! Descriptors are fixed at construction; values are read fresh from the
//! stats source on every collection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Opts};
use tracing::{debug, instrument};

use super::registry::ScrapeCollector;
use crate::domain::ports::SiteStatsSource;
use crate::error::{Error, Result};

// =============================================================================
// Descriptors
// =============================================================================

/// Name and help text of one exported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
}

pub const NUM_POSTS: MetricDescriptor = MetricDescriptor {
    name: "wp_num_posts_metric",
    help: "Shows the number of total posts in the WordPress site",
};

pub const NUM_COMMENTS: MetricDescriptor = MetricDescriptor {
    name: "wp_num_comments_metric",
    help: "Shows the number of total comments in the WordPress site",
};

pub const NUM_USERS: MetricDescriptor = MetricDescriptor {
    name: "wp_num_users_metric",
    help: "Shows the number of registered users in the WordPress site",
};

impl MetricDescriptor {
    /// Prometheus descriptor, no labels.
    pub fn desc(&self) -> Result<Desc> {
        Ok(Desc::new(
            self.name.to_string(),
            self.help.to_string(),
            Vec::new(),
            HashMap::new(),
        )?)
    }

    /// A single-sample counter family carrying `value`.
    fn counter_family(&self, value: f64) -> Result<Vec<MetricFamily>> {
        if value.is_nan() || value < 0.0 {
            return Err(Error::Internal(format!(
                "{} sampled a negative or NaN count: {}",
                self.name, value
            )));
        }

        let counter = Counter::with_opts(Opts::new(self.name, self.help))?;
        counter.inc_by(value);
        Ok(counter.collect())
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Exposes post, comment and user counts of one WordPress site.
pub struct WordPressCollector {
    source: Arc<dyn SiteStatsSource>,
    descriptors: [MetricDescriptor; 3],
}

impl WordPressCollector {
    pub fn new(source: Arc<dyn SiteStatsSource>) -> Self {
        Self {
            source,
            descriptors: [NUM_POSTS, NUM_COMMENTS, NUM_USERS],
        }
    }

    pub fn descriptors(&self) -> &[MetricDescriptor; 3] {
        &self.descriptors
    }
}

impl std::fmt::Debug for WordPressCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPressCollector")
            .field("target", &self.source.describe_target())
            .finish()
    }
}

#[async_trait]
impl ScrapeCollector for WordPressCollector {
    fn describe(&self) -> Result<Vec<Desc>> {
        self.descriptors.iter().map(MetricDescriptor::desc).collect()
    }

    #[instrument(skip(self), fields(source = %self.source.describe_target()))]
    async fn collect(&self) -> Result<Vec<MetricFamily>> {
        let stats = self.source.sample().await?;
        debug!(
            posts = stats.posts,
            comments = stats.comments,
            users = stats.users,
            phase = "Emitting",
            "Sampled site stats"
        );

        let [posts, comments, users] = &self.descriptors;
        let mut families = Vec::with_capacity(3);
        families.extend(posts.counter_family(stats.posts)?);
        families.extend(comments.counter_family(stats.comments)?);
        families.extend(users.counter_family(stats.users)?);
        Ok(families)
    }
}
