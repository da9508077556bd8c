//! Metrics module
//!
//! The WordPress collector and the registry the HTTP endpoint renders.

mod collector;
pub mod registry;

pub use collector::{MetricDescriptor, WordPressCollector, NUM_COMMENTS, NUM_POSTS, NUM_USERS};
pub use registry::{encode, MetricsRegistry, ScrapeCollector};
