//! Metrics Registry
//!
//! An explicit registry value, created once at startup and handed to the HTTP
//! layer. Scrape collectors are async and are run on every gather; the
//! exporter's own instrumentation lives in an inner `prometheus::Registry`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::error::{Error, Result};

const SCRAPES_TOTAL: &str = "wordpress_exporter_scrapes_total";
const SCRAPE_DURATION: &str = "wordpress_exporter_scrape_duration_seconds";

/// A collector sampled on every scrape.
#[async_trait]
pub trait ScrapeCollector: Send + Sync {
    /// Descriptors of every metric this collector may emit. Must not do I/O.
    fn describe(&self) -> Result<Vec<Desc>>;

    /// Produce fresh metric families.
    async fn collect(&self) -> Result<Vec<MetricFamily>>;
}

/// Registry of scrape collectors plus exporter self-metrics.
pub struct MetricsRegistry {
    collectors: Vec<Arc<dyn ScrapeCollector>>,
    names: HashSet<String>,
    internal: Registry,
    scrapes: CounterVec,
    duration: Histogram,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names.iter().collect();
        names.sort();
        f.debug_struct("MetricsRegistry")
            .field("collectors", &self.collectors.len())
            .field("names", &names)
            .finish()
    }
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let internal = Registry::new();

        let scrapes = CounterVec::new(
            Opts::new(SCRAPES_TOTAL, "Total number of scrapes by result"),
            &["result"],
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            SCRAPE_DURATION,
            "Time spent collecting WordPress metrics",
        ))?;

        internal.register(Box::new(scrapes.clone()))?;
        internal.register(Box::new(duration.clone()))?;

        let names = [SCRAPES_TOTAL, SCRAPE_DURATION]
            .iter()
            .map(|n| n.to_string())
            .collect();

        Ok(Self {
            collectors: Vec::new(),
            names,
            internal,
            scrapes,
            duration,
        })
    }

    /// Register a collector after checking its descriptors.
    ///
    /// A metric name already owned by another collector is rejected and
    /// nothing is registered.
    pub fn register(&mut self, collector: Arc<dyn ScrapeCollector>) -> Result<()> {
        let descs = collector.describe()?;

        let mut incoming = HashSet::new();
        for desc in &descs {
            if self.names.contains(&desc.fq_name) || !incoming.insert(desc.fq_name.clone()) {
                return Err(Error::MetricsRegistration(format!(
                    "duplicate metric name: {}",
                    desc.fq_name
                )));
            }
        }

        debug!(metrics = ?incoming, "Registered scrape collector");
        self.names.extend(incoming);
        self.collectors.push(collector);
        Ok(())
    }

    /// Number of registered scrape collectors.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run every collector and append the self-metrics.
    ///
    /// Fails on the first collector error; no partial result is returned.
    pub async fn gather(&self) -> Result<Vec<MetricFamily>> {
        let start = Instant::now();
        let mut families = Vec::new();

        for collector in &self.collectors {
            match collector.collect().await {
                Ok(collected) => families.extend(collected),
                Err(e) => {
                    self.duration.observe(start.elapsed().as_secs_f64());
                    self.scrapes.with_label_values(&["error"]).inc();
                    warn!(error = %e, "Scrape failed");
                    return Err(e);
                }
            }
        }

        self.duration.observe(start.elapsed().as_secs_f64());
        self.scrapes.with_label_values(&["success"]).inc();

        families.extend(self.internal.gather());
        Ok(families)
    }

    /// Gather and encode in the text exposition format.
    pub async fn render(&self) -> Result<(Vec<u8>, String)> {
        let families = self.gather().await?;
        encode(&families)
    }
}

/// Encode metric families in the text exposition format.
///
/// Returns the body and its content type.
pub fn encode(families: &[MetricFamily]) -> Result<(Vec<u8>, String)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
