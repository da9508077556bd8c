//! WordPress Exporter
//!
//! Exposes point-in-time counts of a WordPress site (posts, comments, users)
//! as Prometheus counters. Each scrape opens a fresh MySQL connection, runs
//! three count queries and renders the result in the text exposition format.
//!
//! # Architecture
//!
//! ```text
//! Config Resolver ──▶ WordPressCollector ──▶ MetricsRegistry ──▶ GET /metrics
//!  (flags or          (SiteStatsSource        (explicit, no        (hyper)
//!   wp-config.php)      port: MySQL)           global state)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - `SiteStatsSource` implementations (MySQL, fixed values)
//! - [`config`] - Connection parameters from flags or wp-config.php
//! - [`domain`] - Ports and value objects
//! - [`error`] - Error types
//! - [`metrics`] - Collector and registry
//! - [`server`] - HTTP endpoint and scrape failure policy

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod server;

// Re-export commonly used types
pub use config::{ConfigSource, ConnectionParams, FlagParams};
pub use domain::{SiteStats, SiteStatsSource};
pub use error::{Error, Result};
pub use metrics::{MetricsRegistry, WordPressCollector};
pub use server::{MetricsServer, MetricsState, ScrapeErrorPolicy};
