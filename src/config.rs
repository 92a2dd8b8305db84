// Runtime configuration. Every value can come from a flag or the matching
// environment variable; store credentials are never compiled in.

use crate::error::ConfigError;
use crate::loader::DEFAULT_BATCH_SIZE;
use crate::parser::{ParseOptions, SplitMode};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "gtfs-sync", version, about = "GTFS schedule loader and read API")]
pub struct Config {
    /// Base URL of the PostgREST / Supabase project
    #[arg(long, env = "SUPABASE_URL", value_name = "URL")]
    pub store_url: Option<String>,

    /// API key sent as `apikey` and bearer token
    #[arg(long, env = "SUPABASE_ANON_KEY", value_name = "KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// Keep tables in process memory instead of a remote store
    #[arg(long)]
    pub memory_store: bool,

    /// GTFS static zip to load
    #[arg(long, env = "GTFS_FEED_URL", value_name = "URL")]
    pub feed_url: String,

    /// Records per insert call
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Seconds between scheduled refreshes, 0 disables them
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value_t = 21600)]
    pub refresh_interval_secs: u64,

    /// Timeout for the feed download and for each store request
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Honour quoted fields instead of splitting on every comma
    #[arg(long, env = "CSV_QUOTING")]
    pub csv_quoting: bool,

    /// Fail a table whose header does not match the expected columns
    #[arg(long, env = "VALIDATE_HEADERS")]
    pub validate_headers: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "BATCH_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "FETCH_TIMEOUT_SECS",
                reason: "must be at least 1".to_string(),
            });
        }
        if !is_http_url(&self.feed_url) {
            return Err(ConfigError::Invalid {
                name: "GTFS_FEED_URL",
                reason: format!("'{}' is not an http(s) URL", self.feed_url),
            });
        }
        if !self.memory_store {
            match self.store_url.as_deref() {
                None | Some("") => return Err(ConfigError::Missing("SUPABASE_URL")),
                Some(url) if !is_http_url(url) => {
                    return Err(ConfigError::Invalid {
                        name: "SUPABASE_URL",
                        reason: format!("'{}' is not an http(s) URL", url),
                    });
                }
                Some(_) => {}
            }
            if self.store_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Missing("SUPABASE_ANON_KEY"));
            }
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            split: if self.csv_quoting {
                SplitMode::Csv
            } else {
                SplitMode::Naive
            },
            validate_headers: self.validate_headers,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    /// Parses `argv` with every env binding removed, so variables exported by
    /// the calling shell cannot leak in.
    fn parse_argv(argv: &[&str]) -> Config {
        let matches = Config::command()
            .mut_args(|arg| arg.env(None::<&'static str>))
            .try_get_matches_from(argv.iter().copied())
            .unwrap();
        Config::from_arg_matches(&matches).unwrap()
    }

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["gtfs-sync", "--feed-url", "https://example.org/gtfs.zip"];
        argv.extend_from_slice(args);
        parse_argv(&argv)
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = parse(&["--memory-store"]);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.port, 8080);
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(21600)));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.parse_options(), ParseOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn remote_store_needs_credentials() {
        let config = parse(&[]);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("SUPABASE_URL"))));

        let config = parse(&["--store-url", "https://db.example.org"]);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("SUPABASE_ANON_KEY"))));

        let config = parse(&["--store-url", "https://db.example.org", "--store-key", "k"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_batch_size_and_bad_urls() {
        let config = parse(&["--memory-store", "--batch-size", "0"]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { name: "BATCH_SIZE", .. })));

        let config = parse_argv(&["gtfs-sync", "--memory-store", "--feed-url", "ftp://x"]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { name: "GTFS_FEED_URL", .. })));
    }

    #[test]
    fn env_bindings_can_be_stripped() {
        let command = Config::command().mut_args(|arg| arg.env(None::<&'static str>));
        assert!(command.get_arguments().all(|arg| arg.get_env().is_none()));
        assert!(Config::command().get_arguments().any(|arg| arg.get_env().is_some()));
    }

    #[test]
    fn strict_parsing_flags_and_disabled_schedule() {
        let config = parse(&[
            "--memory-store",
            "--csv-quoting",
            "--validate-headers",
            "--refresh-interval-secs",
            "0",
        ]);
        assert_eq!(
            config.parse_options(),
            ParseOptions {
                split: SplitMode::Csv,
                validate_headers: true,
            }
        );
        assert_eq!(config.refresh_interval(), None);
    }
}
