//! Saved portfolios: named, immutable ticker snapshots kept in one JSON file.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub name: String,
    pub tickers: Vec<String>,
    pub created_ts_utc: i64,
}

/// Request body for a new portfolio; validated by [`PortfolioStore::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPortfolio {
    pub name: String,
    pub tickers: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("portfolio name must not be empty")]
    EmptyName,
    #[error("portfolio must contain at least one ticker")]
    NoTickers,
    #[error("a portfolio named {0:?} already exists")]
    DuplicateName(String),
    #[error("portfolio store I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("portfolio store {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PortfolioError {
    /// Whether the caller sent something the store refused, as opposed to a storage fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptyName | Self::NoTickers | Self::DuplicateName(_)
        )
    }
}

/// Append-only portfolio collection persisted as a whole on every save.
#[derive(Debug)]
pub struct PortfolioStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PortfolioStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every saved portfolio in save order. A missing file is an empty collection.
    pub fn load_all(&self) -> Result<Vec<Portfolio>, PortfolioError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&raw).map_err(|source| PortfolioError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, request: NewPortfolio) -> Result<Portfolio, PortfolioError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(PortfolioError::EmptyName);
        }
        let tickers = normalize_tickers(&request.tickers);
        if tickers.is_empty() {
            return Err(PortfolioError::NoTickers);
        }

        let _guard = self
            .write_lock
            .lock()
            .expect("portfolio write lock should not be poisoned");

        let mut portfolios = self.load_all()?;
        let folded = name.to_lowercase();
        if portfolios
            .iter()
            .any(|existing| existing.name.to_lowercase() == folded)
        {
            return Err(PortfolioError::DuplicateName(name));
        }

        let portfolio = Portfolio {
            name,
            tickers,
            created_ts_utc: Utc::now().timestamp(),
        };
        portfolios.push(portfolio.clone());
        self.write_all(&portfolios)?;

        info!(
            component = "portfolio",
            event = "portfolio.saved",
            name = %portfolio.name,
            tickers = portfolio.tickers.len(),
            total_portfolios = portfolios.len()
        );

        Ok(portfolio)
    }

    fn write_all(&self, portfolios: &[Portfolio]) -> Result<(), PortfolioError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let body = serde_json::to_vec_pretty(portfolios).map_err(|source| {
            PortfolioError::Corrupt {
                path: self.path.display().to_string(),
                source,
            }
        })?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, body).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp_path, &self.path).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: io::Error) -> PortfolioError {
        PortfolioError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Trimmed, upper-cased, non-empty and deduplicated in first-seen order.
pub fn normalize_tickers<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|ticker| ticker.as_ref().trim().to_uppercase())
        .filter(|ticker| !ticker.is_empty())
        .filter(|ticker| seen.insert(ticker.clone()))
        .collect()
}
