//! Shared logging configuration and initialization.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{non_empty_var, parse_bool, ServerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Reads `SCREENER_LOG_LEVEL`, `SCREENER_LOG_FORMAT` and `SCREENER_LOG_TARGET`,
/// keeping the default for anything unset or unrecognized.
pub fn logging_config_from_env() -> LoggingConfig {
    let defaults = LoggingConfig::default();

    LoggingConfig {
        level: non_empty_var("SCREENER_LOG_LEVEL").unwrap_or(defaults.level),
        format: non_empty_var("SCREENER_LOG_FORMAT")
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or(defaults.format),
        include_target: non_empty_var("SCREENER_LOG_TARGET")
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(defaults.include_target),
    }
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

impl LoggingConfig {
    /// The configured filter, or `info` when the level string does not parse.
    /// The flag reports whether the fallback was taken.
    fn env_filter(&self) -> (EnvFilter, bool) {
        match EnvFilter::try_new(&self.level) {
            Ok(filter) => (filter, false),
            Err(_) => (EnvFilter::new("info"), true),
        }
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let (env_filter, level_rejected) = config.env_filter();
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target);

    match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(fmt.with_ansi(false).json().finish())?
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(fmt.pretty().finish())?,
    }

    if level_rejected {
        warn!(
            component = "observability",
            event = "logging.level_rejected",
            level = %config.level,
            fallback = "info"
        );
    }

    Ok(())
}

pub fn log_app_start(logging: &LoggingConfig, server: &ServerConfig) {
    info!(
        component = "screener_server",
        event = "app.start",
        log_level = %logging.level,
        log_format = ?logging.format,
        include_target = logging.include_target,
        default_page_size = server.default_page_size,
        portfolio_path = %server.portfolio_path.display()
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "screener_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        route = "/screener"
    );
}

/// `records` is the (stocks, experts) snapshot size the server starts with.
pub fn log_source_selected(source: &str, reason: Option<&str>, records: (usize, usize)) {
    let (stocks, experts) = records;
    match reason {
        Some(reason) => info!(
            component = "screener_server",
            event = "source.selected",
            source,
            reason,
            stocks,
            experts
        ),
        None => info!(
            component = "screener_server",
            event = "source.selected",
            source,
            stocks,
            experts
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env::with_env_vars;

    #[test]
    fn defaults_when_env_missing() {
        let cfg = with_env_vars(
            &[
                ("SCREENER_LOG_LEVEL", None),
                ("SCREENER_LOG_FORMAT", None),
                ("SCREENER_LOG_TARGET", None),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn parses_json_and_level_and_target_from_env() {
        let cfg = with_env_vars(
            &[
                ("SCREENER_LOG_LEVEL", Some("screener=debug,tower_http=warn")),
                ("SCREENER_LOG_FORMAT", Some("JSON")),
                ("SCREENER_LOG_TARGET", Some("off")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg.level, "screener=debug,tower_http=warn");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn invalid_format_or_target_falls_back_to_defaults() {
        let cfg = with_env_vars(
            &[
                ("SCREENER_LOG_LEVEL", Some("  ")),
                ("SCREENER_LOG_FORMAT", Some("yaml")),
                ("SCREENER_LOG_TARGET", Some("maybe")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg.level, "info");
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert!(cfg.include_target);
    }

    #[test]
    fn unparseable_level_falls_back_to_info_filter() {
        let rejected = LoggingConfig {
            level: "screener=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert!(rejected.env_filter().1);

        let accepted = LoggingConfig {
            level: "screener=debug".to_string(),
            ..LoggingConfig::default()
        };
        assert!(!accepted.env_filter().1);
    }
}
