//! MySQL Stats Adapter
//!
//! Implements the `SiteStatsSource` port by counting rows in a WordPress
//! database. Every call to [`MySqlStatsSource::sample`] opens its own
//! connection, runs three count queries in sequence and closes the connection
//! again. Nothing is pooled or cached between scrapes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, instrument, warn};

use crate::config::ConnectionParams;
use crate::domain::ports::{SiteStats, SiteStatsSource};
use crate::error::{Error, Result};

/// Port used when `host` carries none.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

// =============================================================================
// Queries
// =============================================================================

/// The three count queries for one table prefix.
///
/// The prefix is concatenated into the SQL text as-is. It is expected to come
/// from the operator's own flags or wp-config.php and is not escaped; do not
/// feed it from an untrusted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteQueries {
    prefix: String,
    pub users: String,
    pub comments: String,
    pub posts: String,
}

impl SiteQueries {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            users: format!("select count(*) as num_users from {}users", prefix),
            comments: format!("select count(*) as num_comments from {}comments", prefix),
            posts: format!(
                "select count(*) as num_posts from {}posts \
                 WHERE post_type='post' AND post_status!='auto-draft'",
                prefix
            ),
        }
    }

    /// Full table name for a suffix, e.g. `wp_` + `posts`.
    pub fn table(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    /// Run users, comments and posts in that order on one connection.
    async fn run(&self, conn: &mut MySqlConnection) -> Result<SiteStats> {
        debug!(phase = "QueryingUsers", "Counting users");
        let users = self.count(conn, "users", &self.users).await?;

        debug!(phase = "QueryingComments", "Counting comments");
        let comments = self.count(conn, "comments", &self.comments).await?;

        debug!(phase = "QueryingPosts", "Counting posts");
        let posts = self.count(conn, "posts", &self.posts).await?;

        Ok(SiteStats {
            posts,
            comments,
            users,
        })
    }

    async fn count(&self, conn: &mut MySqlConnection, suffix: &str, sql: &str) -> Result<f64> {
        let n = sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|source| Error::DatabaseQueryFailed {
                table: self.table(suffix),
                source,
            })?;
        Ok(n as f64)
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// Where the MySQL server is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbEndpoint {
    Tcp { host: String, port: u16 },
    Socket(PathBuf),
}

impl DbEndpoint {
    /// Parse a WordPress-style `DB_HOST` value.
    ///
    /// Accepts `host`, `host:port`, `[v6addr]:port` and `host:/path/to.sock`.
    pub fn parse(addr: &str) -> Result<Self> {
        if let Some((_, rest)) = addr.split_once(':') {
            if rest.starts_with('/') {
                return Ok(DbEndpoint::Socket(PathBuf::from(rest)));
            }
        }

        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) if !host.ends_with(':') => {
                let port = port.parse::<u16>().map_err(|_| {
                    Error::Config(format!("invalid port '{}' in database host '{}'", port, addr))
                })?;
                (host, port)
            }
            _ => (addr, DEFAULT_MYSQL_PORT),
        };

        let host = host.trim_start_matches('[').trim_end_matches(']');
        let host = if host.is_empty() { "localhost" } else { host };

        Ok(DbEndpoint::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Samples site counts from MySQL, one connection per call.
pub struct MySqlStatsSource {
    params: Arc<ConnectionParams>,
    options: MySqlConnectOptions,
    queries: SiteQueries,
}

impl MySqlStatsSource {
    /// Build the adapter. The database address is parsed here, so a malformed
    /// host or port fails at startup instead of on every scrape.
    pub fn new(params: Arc<ConnectionParams>) -> Result<Self> {
        let options = connect_options(&params)?;
        let queries = SiteQueries::new(&params.table_prefix);
        Ok(Self {
            params,
            options,
            queries,
        })
    }

    pub fn queries(&self) -> &SiteQueries {
        &self.queries
    }

    /// Connection options for the configured server.
    pub fn connect_options(&self) -> &MySqlConnectOptions {
        &self.options
    }
}

fn connect_options(params: &ConnectionParams) -> Result<MySqlConnectOptions> {
    let options = MySqlConnectOptions::new()
        .username(&params.user)
        .password(&params.password)
        .database(&params.database);

    Ok(match DbEndpoint::parse(&params.host)? {
        DbEndpoint::Tcp { host, port } => options.host(&host).port(port),
        DbEndpoint::Socket(path) => options.socket(path),
    })
}

impl std::fmt::Debug for MySqlStatsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlStatsSource")
            .field("params", &self.params)
            .finish()
    }
}

#[async_trait]
impl SiteStatsSource for MySqlStatsSource {
    #[instrument(skip(self), fields(db = %self.describe_target()))]
    async fn sample(&self) -> Result<SiteStats> {
        debug!(phase = "Connecting", "Opening database connection");
        let mut conn = self
            .options
            .connect()
            .await
            .map_err(Error::DatabaseConnectionFailed)?;

        let result = self.queries.run(&mut conn).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close database connection cleanly");
        }

        result
    }

    fn describe_target(&self) -> String {
        format!(
            "mysql://{}@{}/{}",
            self.params.user, self.params.host, self.params.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn params(host: &str) -> Arc<ConnectionParams> {
        Arc::new(ConnectionParams {
            host: host.to_string(),
            database: "blog".to_string(),
            user: "root".to_string(),
            password: "secret".to_string(),
            table_prefix: "wp_".to_string(),
        })
    }

    #[test]
    fn test_default_prefix_queries() {
        let q = SiteQueries::new("wp_");
        assert_eq!(q.users, "select count(*) as num_users from wp_users");
        assert_eq!(q.comments, "select count(*) as num_comments from wp_comments");
        assert_eq!(
            q.posts,
            "select count(*) as num_posts from wp_posts WHERE post_type='post' AND post_status!='auto-draft'"
        );
    }

    #[test]
    fn test_posts_query_filters_type_and_auto_drafts() {
        let q = SiteQueries::new("blog2_");
        assert!(q.posts.contains("post_type='post'"));
        assert!(q.posts.contains("post_status!='auto-draft'"));
        assert!(!q.users.contains("WHERE"));
        assert!(!q.comments.contains("WHERE"));
    }

    #[test]
    fn test_empty_prefix() {
        let q = SiteQueries::new("");
        assert_eq!(q.users, "select count(*) as num_users from users");
        assert_eq!(q.table("posts"), "posts");
    }

    proptest! {
        /// Property: table name is prefix + suffix with nothing in between.
        #[test]
        fn prop_prefix_concatenated_verbatim(prefix in "[A-Za-z0-9_]{0,16}") {
            let q = SiteQueries::new(&prefix);
            let users_from = format!(" from {}users", prefix);
            let comments_from = format!(" from {}comments", prefix);
            let posts_from = format!(" from {}posts ", prefix);
            prop_assert!(q.users.ends_with(&users_from));
            prop_assert!(q.comments.ends_with(&comments_from));
            prop_assert!(q.posts.contains(&posts_from));
            prop_assert_eq!(q.table("users"), format!("{}users", prefix));
        }
    }

    #[test]
    fn test_endpoint_host_and_port() {
        assert_eq!(
            DbEndpoint::parse("127.0.0.1:3306").unwrap(),
            DbEndpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port: 3306
            }
        );
        assert_eq!(
            DbEndpoint::parse("db.example.com:3307").unwrap(),
            DbEndpoint::Tcp {
                host: "db.example.com".to_string(),
                port: 3307
            }
        );
    }

    #[test]
    fn test_endpoint_default_port() {
        assert_eq!(
            DbEndpoint::parse("localhost").unwrap(),
            DbEndpoint::Tcp {
                host: "localhost".to_string(),
                port: DEFAULT_MYSQL_PORT
            }
        );
    }

    #[test]
    fn test_endpoint_socket() {
        assert_eq!(
            DbEndpoint::parse("localhost:/var/run/mysqld/mysqld.sock").unwrap(),
            DbEndpoint::Socket(PathBuf::from("/var/run/mysqld/mysqld.sock"))
        );
    }

    #[test]
    fn test_endpoint_ipv6() {
        assert_eq!(
            DbEndpoint::parse("[::1]:3306").unwrap(),
            DbEndpoint::Tcp {
                host: "::1".to_string(),
                port: 3306
            }
        );
    }

    #[test]
    fn test_endpoint_bad_port() {
        assert_matches!(DbEndpoint::parse("localhost:mysql"), Err(Error::Config(_)));
    }

    #[test]
    fn test_new_rejects_malformed_port() {
        for host in ["localhost:notaport", "127.0.0.1:abc", "127.0.0.1:99999", "localhost:"] {
            assert_matches!(
                MySqlStatsSource::new(params(host)),
                Err(Error::Config(_)),
                "host {:?} should be rejected",
                host
            );
        }
    }

    #[test]
    fn test_new_accepts_socket_host() {
        let source = MySqlStatsSource::new(params("localhost:/run/mysqld/mysqld.sock")).unwrap();
        assert_eq!(source.queries().table("posts"), "wp_posts");
    }

    #[test]
    fn test_describe_target_omits_password() {
        let source = MySqlStatsSource::new(params("127.0.0.1:3306")).unwrap();
        let target = source.describe_target();
        assert_eq!(target, "mysql://root@127.0.0.1:3306/blog");
        assert!(!format!("{:?}", source).contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_connection_failure() {
        // Port 1 on loopback refuses immediately.
        let source = MySqlStatsSource::new(params("127.0.0.1:1")).unwrap();
        let result = source.sample().await;
        assert_matches!(result, Err(Error::DatabaseConnectionFailed(_)));
    }
}
