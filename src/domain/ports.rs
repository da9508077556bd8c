//! Domain Ports (Port/Adapter Pattern)
//!
//! The collector depends only on [`SiteStatsSource`]; the MySQL adapter and
//! the fixed-value adapter implement it.
//!
//! ```text
//! ┌───────────────────────┐        ┌──────────────────────────────┐
//! │  WordPressCollector   │───────▶│   SiteStatsSource (port)     │
//! └───────────────────────┘        └──────────────────────────────┘
//!                                        ▲                ▲
//!                                        │                │
//!                              MySqlStatsSource   FixedStatsSource
//! ```

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Point-in-time counts read from one WordPress database.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SiteStats {
    /// Rows in `{prefix}posts` with `post_type = 'post'`, excluding auto-drafts
    pub posts: f64,
    /// Rows in `{prefix}comments`
    pub comments: f64,
    /// Rows in `{prefix}users`
    pub users: f64,
}

impl SiteStats {
    pub fn new(posts: f64, comments: f64, users: f64) -> Self {
        Self {
            posts,
            comments,
            users,
        }
    }
}

// =============================================================================
// Ports
// =============================================================================

/// Source of site counts, sampled once per scrape.
///
/// Implementations must not cache between calls: every call is a fresh
/// read of the backing store.
#[async_trait]
pub trait SiteStatsSource: Send + Sync {
    /// Read the current counts.
    async fn sample(&self) -> Result<SiteStats>;

    /// Human-readable description of what is being sampled, for logs.
    fn describe_target(&self) -> String;
}
