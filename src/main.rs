//! WordPress Exporter
//!
//! Prometheus exporter for the post, comment and user counts of a WordPress
//! site.
//!
//! ```text
//! ┌──────────────┐    ┌────────────────────┐    ┌────────────────┐
//! │    Config    │───▶│ WordPressCollector │───▶│  GET /metrics  │
//! │   Resolver   │    │ (MySQL per scrape) │    │    (:8888)     │
//! └──────────────┘    └────────────────────┘    └────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wordpress_exporter::adapters::{FixedStatsSource, MySqlStatsSource};
use wordpress_exporter::config::{self, ConfigSource, FlagParams, DEFAULT_HOST, DEFAULT_PORT};
use wordpress_exporter::domain::SiteStatsSource;
use wordpress_exporter::error::{Error, Result};
use wordpress_exporter::metrics::{MetricsRegistry, WordPressCollector};
use wordpress_exporter::server::{
    MetricsServer, MetricsState, ScrapeErrorPolicy, DEFAULT_LISTEN_ADDR,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// WordPress Exporter - post, comment and user counts as Prometheus metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the wp-config.php of the site to monitor; overrides the DB flags
    #[arg(long, env = "WP_CONFIG_PATH", default_value = "")]
    wpconfig: String,

    /// Hostname or address of the DB server
    #[arg(long, env = "WP_DB_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// DB server port
    #[arg(long, env = "WP_DB_PORT", default_value = DEFAULT_PORT)]
    port: String,

    /// DB name (required without --wpconfig)
    #[arg(long, env = "WP_DB_NAME", default_value = "")]
    db: String,

    /// DB user for connection (required without --wpconfig)
    #[arg(long, env = "WP_DB_USER", default_value = "")]
    user: String,

    /// DB password for connection
    #[arg(long, env = "WP_DB_PASSWORD", default_value = "", hide_env_values = true)]
    pass: String,

    /// Table prefix for WordPress tables
    #[arg(long, env = "WP_TABLE_PREFIX", default_value = config::DEFAULT_TABLE_PREFIX)]
    tableprefix: String,

    /// Metrics server bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    listen_addr: String,

    /// What to do when a scrape hits a database error
    #[arg(long, env = "ON_SCRAPE_ERROR", value_enum, default_value_t = ScrapeErrorPolicy::Exit)]
    on_scrape_error: ScrapeErrorPolicy,

    /// Serve zero counts without touching the database
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn config_source(&self) -> ConfigSource {
        let flags = FlagParams {
            host: self.host.clone(),
            port: self.port.clone(),
            database: self.db.clone(),
            user: self.user.clone(),
            password: self.pass.clone(),
            table_prefix: self.tableprefix.clone(),
        };
        ConfigSource::select(Some(PathBuf::from(&self.wpconfig)), flags)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting WordPress exporter");

    let params = config::resolve(args.config_source())?;

    let source: Arc<dyn SiteStatsSource> = if args.dry_run {
        warn!("Dry-run mode: serving zero counts, database is never contacted");
        Arc::new(FixedStatsSource::zeros())
    } else {
        Arc::new(MySqlStatsSource::new(Arc::new(params))?)
    };

    let mut registry = MetricsRegistry::new()?;
    registry.register(Arc::new(WordPressCollector::new(source)))?;

    let (state, mut fatal_rx) = MetricsState::new(registry, args.on_scrape_error);
    let server = MetricsServer::bind(&args.listen_addr, state).await?;
    info!(
        "Beginning to serve on {} (scrape error policy: {:?})",
        server.local_addr()?,
        args.on_scrape_error
    );

    let shutdown = CancellationToken::new();
    let mut server_task = tokio::spawn(server.run(shutdown.clone()));

    let outcome = tokio::select! {
        Some(e) = fatal_rx.recv() => Err(e),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received interrupt, shutting down");
            Ok(())
        }
        joined = &mut server_task => {
            return joined
                .map_err(|e| Error::Internal(format!("metrics server task failed: {}", e)))?;
        }
    };

    shutdown.cancel();
    if let Err(e) = server_task.await {
        warn!("Metrics server task did not stop cleanly: {}", e);
    }

    outcome
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "sqlx=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
