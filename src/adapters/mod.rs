//! Infrastructure Adapters
//!
//! Implementations of the `SiteStatsSource` port.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           SiteStatsSource (port)            │
//! └─────────────────────────────────────────────┘
//!                      ▲
//!          ┌───────────┴────────────┐
//!  MySqlStatsSource         FixedStatsSource
//!  (one connection/scrape)  (dry-run, tests)
//! ```

mod fixed;
pub mod mysql;

pub use fixed::FixedStatsSource;
pub use mysql::{DbEndpoint, MySqlStatsSource, SiteQueries};
