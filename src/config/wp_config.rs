//! wp-config.php credential extraction
//!
//! Pulls `DB_HOST`, `DB_NAME`, `DB_USER`, `DB_PASSWORD` and `$table_prefix`
//! out of a WordPress config file with fixed-shape patterns:
//!
//! ```text
//! define('DB_NAME', 'blog');
//! $table_prefix  = 'wp_';
//! ```
//!
//! Single or double quotes are accepted. The matching is deliberately narrow:
//! escaped quotes inside values, definitions split across lines, whitespace
//! between `define(` and the key (as in `define( 'DB_NAME', ... )`, the
//! spacing of recent WordPress releases), and commented-out definitions that
//! still look like `define(...)` are not understood. The first textual match
//! wins.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{ConfigField, ConnectionParams};
use crate::error::{Error, Result};

/// File name looked up inside the configured directory.
pub const WP_CONFIG_FILE: &str = "wp-config.php";

static PATTERNS: Lazy<Vec<(ConfigField, Regex)>> = Lazy::new(|| {
    ConfigField::ALL
        .iter()
        .map(|field| {
            let pattern = match field {
                ConfigField::TablePrefix => r#"\$table_prefix.*?=.*?['"](.*?)['"];"#.to_string(),
                key => format!(
                    r#"define\(['"]{}['"].*?,.*?['"](.*?)['"].*?\);"#,
                    regex::escape(key.as_str())
                ),
            };
            let re = Regex::new(&pattern).expect("wp-config pattern is a valid regex");
            (*field, re)
        })
        .collect()
});

/// Path of `wp-config.php` inside `dir`.
pub fn config_file_path(dir: &Path) -> PathBuf {
    dir.join(WP_CONFIG_FILE)
}

/// Extract one field's value from config text.
pub fn extract(text: &str, field: ConfigField) -> Result<String> {
    PATTERNS
        .iter()
        .find(|(f, _)| *f == field)
        .and_then(|(_, re)| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(Error::MissingConfigField { field })
}

/// Parse connection parameters out of config text.
pub fn parse(text: &str) -> Result<ConnectionParams> {
    Ok(ConnectionParams {
        host: extract(text, ConfigField::DbHost)?,
        database: extract(text, ConfigField::DbName)?,
        user: extract(text, ConfigField::DbUser)?,
        password: extract(text, ConfigField::DbPassword)?,
        table_prefix: extract(text, ConfigField::TablePrefix)?,
    })
}

/// Read `wp-config.php` from `dir` and parse it.
pub fn load(dir: &Path) -> Result<ConnectionParams> {
    let path = config_file_path(dir);
    let bytes = std::fs::read(&path).map_err(|source| Error::ConfigFileUnreadable {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read wp-config.php");

    parse(&String::from_utf8_lossy(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    const SAMPLE: &str = r#"<?php
/** The name of the database for WordPress */
define('DB_NAME','blog');
define('DB_USER','root');
define('DB_PASSWORD','secret');
define('DB_HOST','127.0.0.1');
define('DB_CHARSET', 'utf8mb4');

$table_prefix  = 'wp_';

require_once ABSPATH . 'wp-settings.php';
"#;

    fn write_fixture(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wordpress-exporter-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(WP_CONFIG_FILE), contents).unwrap();
        dir
    }

    #[test]
    fn test_parse_sample() {
        let params = parse(SAMPLE).unwrap();
        assert_eq!(
            params,
            ConnectionParams {
                host: "127.0.0.1".to_string(),
                database: "blog".to_string(),
                user: "root".to_string(),
                password: "secret".to_string(),
                table_prefix: "wp_".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_double_quotes_and_spacing() {
        let text = r#"
define("DB_NAME",  "shop" );
define("DB_USER",   "shopper");
define('DB_PASSWORD', "p@ss:word");
define("DB_HOST", 'localhost:/var/run/mysqld/mysqld.sock');
$table_prefix = "shop_";
"#;
        let params = parse(text).unwrap();
        assert_eq!(params.database, "shop");
        assert_eq!(params.user, "shopper");
        assert_eq!(params.password, "p@ss:word");
        assert_eq!(params.host, "localhost:/var/run/mysqld/mysqld.sock");
        assert_eq!(params.table_prefix, "shop_");
    }

    #[test]
    fn test_space_after_define_paren_is_not_matched() {
        let text = SAMPLE.replace("define('DB_NAME','blog');", "define( 'DB_NAME', 'blog' );");
        assert_matches!(
            parse(&text),
            Err(Error::MissingConfigField {
                field: ConfigField::DbName
            })
        );
    }

    #[test]
    fn test_empty_password_is_allowed() {
        let text = SAMPLE.replace("define('DB_PASSWORD','secret');", "define('DB_PASSWORD','');");
        let params = parse(&text).unwrap();
        assert_eq!(params.password, "");
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        let lines = [
            (ConfigField::DbHost, "define('DB_HOST','127.0.0.1');"),
            (ConfigField::DbName, "define('DB_NAME','blog');"),
            (ConfigField::DbUser, "define('DB_USER','root');"),
            (ConfigField::DbPassword, "define('DB_PASSWORD','secret');"),
            (ConfigField::TablePrefix, "$table_prefix  = 'wp_';"),
        ];

        for (field, line) in lines {
            let text = SAMPLE.replace(line, "");
            let result = parse(&text);
            assert_matches!(
                result,
                Err(Error::MissingConfigField { field: missing }) if missing == field,
                "removing {} should report it",
                field
            );
        }
    }

    #[test]
    fn test_first_missing_field_wins() {
        let result = parse("$table_prefix = 'wp_';");
        assert_matches!(
            result,
            Err(Error::MissingConfigField {
                field: ConfigField::DbHost
            })
        );
    }

    #[test]
    fn test_definition_split_across_lines_is_not_matched() {
        let text = SAMPLE.replace("define('DB_USER','root');", "define('DB_USER',\n'root');");
        assert_matches!(
            parse(&text),
            Err(Error::MissingConfigField {
                field: ConfigField::DbUser
            })
        );
    }

    #[test]
    fn test_config_file_path() {
        assert_eq!(
            config_file_path(Path::new("/var/www/html")),
            PathBuf::from("/var/www/html/wp-config.php")
        );
        assert_eq!(
            config_file_path(Path::new("/var/www/html/")),
            PathBuf::from("/var/www/html/wp-config.php")
        );
    }

    #[test]
    fn test_load_from_directory() {
        let dir = write_fixture("load", SAMPLE);
        let params = load(&dir).unwrap();
        assert_eq!(params.database, "blog");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let dir = std::env::temp_dir().join("wordpress-exporter-empty-dir-missing");
        let err = load(&dir).unwrap_err();
        assert_matches!(&err, Error::ConfigFileUnreadable { path, .. } if path.ends_with(WP_CONFIG_FILE));
    }

    fn value_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_.:@/-]{0,24}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: extraction recovers the written values and is repeatable.
        #[test]
        fn prop_extraction_is_idempotent(
            host in value_strategy(),
            name in value_strategy(),
            user in value_strategy(),
            pass in value_strategy(),
            prefix in value_strategy(),
        ) {
            let text = format!(
                "define('DB_NAME', '{name}');\ndefine('DB_USER', '{user}');\n\
                 define('DB_PASSWORD', '{pass}');\ndefine('DB_HOST', '{host}');\n\
                 $table_prefix = '{prefix}';\n"
            );

            let first = parse(&text)?;
            let second = parse(&text)?;
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.host, host);
            prop_assert_eq!(first.database, name);
            prop_assert_eq!(first.user, user);
            prop_assert_eq!(first.password, pass);
            prop_assert_eq!(first.table_prefix, prefix);
        }
    }
}
