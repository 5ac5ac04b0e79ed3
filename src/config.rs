//! Server configuration read from `SCREENER_*` environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::pipeline::{sanitize_page_size, DEFAULT_PAGE_SIZE};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PORTFOLIO_PATH: &str = "data/portfolios.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// JSON universe file; demo data when absent.
    pub data_path: Option<PathBuf>,
    pub portfolio_path: PathBuf,
    pub default_page_size: usize,
    pub force_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_path: None,
            portfolio_path: PathBuf::from(DEFAULT_PORTFOLIO_PATH),
            default_page_size: DEFAULT_PAGE_SIZE,
            force_demo: false,
        }
    }
}

/// Unset, blank or unparseable variables keep their defaults.
pub fn server_config_from_env() -> ServerConfig {
    let mut config = ServerConfig::default();

    if let Some(addr) = non_empty_var("SCREENER_ADDR").and_then(|raw| raw.parse().ok()) {
        config.addr = addr;
    }

    config.data_path = non_empty_var("SCREENER_DATA_PATH").map(PathBuf::from);

    if let Some(path) = non_empty_var("SCREENER_PORTFOLIO_PATH") {
        config.portfolio_path = PathBuf::from(path);
    }

    if let Some(page_size) =
        non_empty_var("SCREENER_DEFAULT_PAGE_SIZE").and_then(|raw| raw.parse::<f64>().ok())
    {
        config.default_page_size = sanitize_page_size(page_size);
    }

    if let Some(force_demo) = non_empty_var("SCREENER_USE_DEMO").and_then(|raw| parse_bool(&raw)) {
        config.force_demo = force_demo;
    }

    config
}

pub(crate) fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
