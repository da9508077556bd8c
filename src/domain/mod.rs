//! Domain Layer
//!
//! - **Ports** (`ports.rs`) - the `SiteStatsSource` abstraction and the
//!   `SiteStats` value object it produces

pub mod ports;

pub use ports::{SiteStats, SiteStatsSource};
