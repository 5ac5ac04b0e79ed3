//! Record snapshot sources and the data source implementations built on them.

use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::filters::{FilterCatalog, NormalizedFilters};
use crate::pipeline::{ordered_matches, paginate, RowPipeline};
use crate::record::Record;
use crate::session::{DataSource, DataSourceError, FetchedPage, PageQuery, SymbolUniverse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Stocks,
    Experts,
}

impl Dataset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Experts => "experts",
        }
    }

    pub fn catalog(self) -> FilterCatalog {
        match self {
            Self::Stocks => FilterCatalog::stocks(),
            Self::Experts => FilterCatalog::experts(),
        }
    }

    pub fn pipeline(self) -> RowPipeline {
        RowPipeline::new(self.catalog())
    }

    /// Field used as the row identifier in symbol listings.
    pub fn symbol_field(self) -> &'static str {
        match self {
            Self::Stocks => "ticker",
            Self::Experts => "name",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshots {
    #[serde(default)]
    pub stocks: Vec<Record>,
    #[serde(default)]
    pub experts: Vec<Record>,
}

#[derive(Debug, Error)]
pub enum SourceLoadError {
    #[error("failed to read data file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse data file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("data file {path} must be an object with `stocks` and/or `experts` arrays")]
    Shape { path: String },
}

pub trait RecordSnapshotSource: Send + Sync + 'static {
    fn snapshot(&self, dataset: Dataset) -> Arc<Vec<Record>>;
}

#[derive(Clone)]
pub struct InMemorySnapshotSource {
    inner: Arc<RwLock<SnapshotSlots>>,
}

#[derive(Default)]
struct SnapshotSlots {
    stocks: Arc<Vec<Record>>,
    experts: Arc<Vec<Record>>,
}

impl InMemorySnapshotSource {
    pub fn new(snapshots: DatasetSnapshots) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SnapshotSlots {
                stocks: Arc::new(snapshots.stocks),
                experts: Arc::new(snapshots.experts),
            })),
        }
    }

    pub fn demo() -> Self {
        Self::new(demo_snapshots())
    }

    /// Loads `{ "stocks": [...], "experts": [...] }`. Entries that are not
    /// JSON objects are skipped.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SourceLoadError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let raw = fs::read(path).map_err(|source| SourceLoadError::Io {
            path: display.clone(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|source| SourceLoadError::Json {
                path: display.clone(),
                source,
            })?;
        let object = value
            .as_object()
            .ok_or_else(|| SourceLoadError::Shape {
                path: display.clone(),
            })?;
        if !object.contains_key("stocks") && !object.contains_key("experts") {
            return Err(SourceLoadError::Shape { path: display });
        }

        let snapshots = DatasetSnapshots {
            stocks: records_from_json(object.get("stocks"), &display, Dataset::Stocks),
            experts: records_from_json(object.get("experts"), &display, Dataset::Experts),
        };

        Ok(Self::new(snapshots))
    }

    pub fn replace(&self, dataset: Dataset, records: Vec<Record>) {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory snapshot lock should not be poisoned");
        match dataset {
            Dataset::Stocks => guard.stocks = Arc::new(records),
            Dataset::Experts => guard.experts = Arc::new(records),
        }
    }

    pub fn data_source(&self, dataset: Dataset) -> SnapshotDataSource {
        SnapshotDataSource::new(Arc::new(self.clone()), dataset)
    }
}

impl RecordSnapshotSource for InMemorySnapshotSource {
    fn snapshot(&self, dataset: Dataset) -> Arc<Vec<Record>> {
        let guard = self
            .inner
            .read()
            .expect("in-memory snapshot lock should not be poisoned");
        match dataset {
            Dataset::Stocks => Arc::clone(&guard.stocks),
            Dataset::Experts => Arc::clone(&guard.experts),
        }
    }
}

fn records_from_json(value: Option<&serde_json::Value>, path: &str, dataset: Dataset) -> Vec<Record> {
    let Some(entries) = value.and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };

    let records: Vec<Record> = entries.iter().filter_map(Record::from_json).collect();
    let skipped = entries.len() - records.len();
    if skipped > 0 {
        warn!(
            component = "source",
            event = "source.load.skipped",
            path,
            dataset = dataset.as_str(),
            skipped
        );
    }
    records
}

/// Answers data source queries from a snapshot by running the row pipeline
/// locally, the way a screener backend would.
#[derive(Clone)]
pub struct SnapshotDataSource {
    source: Arc<dyn RecordSnapshotSource>,
    dataset: Dataset,
}

impl SnapshotDataSource {
    pub fn new(source: Arc<dyn RecordSnapshotSource>, dataset: Dataset) -> Self {
        Self { source, dataset }
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn page(&self, query: &PageQuery) -> FetchedPage {
        let records = self.source.snapshot(self.dataset);
        let pipeline = self.dataset.pipeline();
        let rows = ordered_matches(
            records.as_slice(),
            &query.filters,
            &query.search_query,
            pipeline.search_fields(),
            query.sort.as_ref(),
        );
        let total_count = rows.len();

        let records = match query.window {
            Some(window) => paginate(&rows, window).0.iter().map(|row| (*row).clone()).collect(),
            None => rows.into_iter().cloned().collect(),
        };

        FetchedPage {
            records,
            total_count,
        }
    }

    /// Identifiers of every record that passes the filters and search, in
    /// sort-hint order.
    pub fn symbols(&self, filters: &NormalizedFilters, search_query: &str) -> SymbolUniverse {
        let records = self.source.snapshot(self.dataset);
        let pipeline = self.dataset.pipeline();
        let rows = ordered_matches(
            records.as_slice(),
            filters,
            search_query,
            pipeline.search_fields(),
            filters.sort_hint(),
        );
        symbol_universe(&rows, self.dataset)
    }
}

/// Identifier column of already-ordered rows; rows without one are skipped.
pub fn symbol_universe(rows: &[&Record], dataset: Dataset) -> SymbolUniverse {
    let field = dataset.symbol_field();
    let symbols: Vec<String> = rows
        .iter()
        .filter_map(|row| row.text(field).map(|value| value.into_owned()))
        .collect();

    SymbolUniverse {
        total: symbols.len(),
        symbols,
    }
}

#[async_trait]
impl DataSource for SnapshotDataSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<FetchedPage, DataSourceError> {
        let page = self.page(query);
        debug!(
            component = "source",
            event = "source.snapshot.page",
            dataset = self.dataset.as_str(),
            returned = page.records.len(),
            total_count = page.total_count
        );
        Ok(page)
    }

    async fn fetch_all_matching_symbols(
        &self,
        filters: &NormalizedFilters,
        search_query: &str,
    ) -> Result<SymbolUniverse, DataSourceError> {
        Ok(self.symbols(filters, search_query))
    }
}

#[cfg(feature = "http-source")]
pub use http::HttpDataSource;

#[cfg(feature = "http-source")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Url;
    use serde::de::DeserializeOwned;
    use serde::Deserialize;
    use tracing::debug;

    use crate::filters::NormalizedFilters;
    use crate::pipeline::{PageWindow, MAX_PAGE_SIZE};
    use crate::record::Record;
    use crate::session::{DataSource, DataSourceError, FetchedPage, PageQuery, SymbolUniverse};

    #[derive(Debug, Deserialize)]
    struct RowsEnvelope {
        records: Vec<Record>,
        page_info: PageTotals,
    }

    #[derive(Debug, Deserialize)]
    struct PageTotals {
        total_count: usize,
    }

    /// Client for a remote screener server's `/screener/rows` and
    /// `/screener/symbols` endpoints.
    #[derive(Debug, Clone)]
    pub struct HttpDataSource {
        client: reqwest::Client,
        base_url: String,
        view: String,
    }

    impl HttpDataSource {
        pub fn new(
            base_url: impl Into<String>,
            view: impl Into<String>,
            timeout: Duration,
        ) -> Result<Self, DataSourceError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| DataSourceError::Transport(err.to_string()))?;

            Ok(Self {
                client,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                view: view.into(),
            })
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        async fn get_json<T: DeserializeOwned>(
            &self,
            path: &str,
            mut pairs: Vec<(String, String)>,
        ) -> Result<T, DataSourceError> {
            pairs.push(("view".to_string(), self.view.clone()));
            let url = Url::parse_with_params(&format!("{}{path}", self.base_url), &pairs)
                .map_err(|err| DataSourceError::Transport(err.to_string()))?;

            debug!(component = "source", event = "source.http.request", url = %url);

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| DataSourceError::Transport(err.to_string()))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|err| DataSourceError::Transport(err.to_string()))?;

            if !status.is_success() {
                return Err(DataSourceError::Status {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            serde_json::from_slice(&body)
                .map_err(|err| DataSourceError::MalformedPayload(err.to_string()))
        }

        async fn fetch_window(
            &self,
            query: &PageQuery,
            window: PageWindow,
        ) -> Result<FetchedPage, DataSourceError> {
            let mut windowed = query.clone();
            windowed.window = Some(window);
            let envelope: RowsEnvelope = self
                .get_json("/screener/rows", windowed.to_query_pairs())
                .await?;

            Ok(FetchedPage {
                records: envelope.records,
                total_count: envelope.page_info.total_count,
            })
        }
    }

    #[async_trait]
    impl DataSource for HttpDataSource {
        async fn fetch_page(&self, query: &PageQuery) -> Result<FetchedPage, DataSourceError> {
            if let Some(window) = query.window {
                return self.fetch_window(query, window).await;
            }

            // Universe requests walk the pages at the largest size the server accepts.
            let mut records = Vec::new();
            let mut page_index = 1;
            loop {
                let page = self
                    .fetch_window(query, PageWindow::new(page_index, MAX_PAGE_SIZE))
                    .await?;
                let returned = page.records.len();
                records.extend(page.records);

                if returned == 0 || records.len() >= page.total_count {
                    return Ok(FetchedPage {
                        total_count: page.total_count.max(records.len()),
                        records,
                    });
                }
                page_index += 1;
            }
        }

        async fn fetch_all_matching_symbols(
            &self,
            filters: &NormalizedFilters,
            search_query: &str,
        ) -> Result<SymbolUniverse, DataSourceError> {
            let mut pairs = filters.to_query_pairs();
            if !search_query.trim().is_empty() {
                pairs.push(("q".to_string(), search_query.trim().to_string()));
            }
            self.get_json("/screener/symbols", pairs).await
        }
    }

    fn error_message(body: &[u8]) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: String,
        }

        if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
            return parsed.message;
        }
        let text = String::from_utf8_lossy(body);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            "empty response body".to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn error_message_prefers_json_message_field() {
            assert_eq!(error_message(br#"{"message":"unknown view"}"#), "unknown view");
            assert_eq!(error_message(b"  bad gateway \n"), "bad gateway");
            assert_eq!(error_message(b""), "empty response body");
        }

        #[test]
        fn base_url_drops_trailing_slash() {
            let source =
                HttpDataSource::new("http://127.0.0.1:8080/", "overview", Duration::from_secs(5))
                    .unwrap();
            assert_eq!(source.base_url(), "http://127.0.0.1:8080");
        }
    }
}

const DEMO_COMPANIES: [(&str, &str, &str, &str); 20] = [
    ("AAPL", "Apple Inc.", "Technology", "Consumer Electronics"),
    ("MSFT", "Microsoft Corporation", "Technology", "Software"),
    ("NVDA", "NVIDIA Corporation", "Technology", "Semiconductors"),
    ("AMZN", "Amazon.com Inc.", "Consumer Cyclical", "Internet Retail"),
    ("GOOGL", "Alphabet Inc.", "Communication Services", "Internet Content"),
    ("META", "Meta Platforms Inc.", "Communication Services", "Internet Content"),
    ("TSLA", "Tesla Inc.", "Consumer Cyclical", "Auto Manufacturers"),
    ("JPM", "JPMorgan Chase & Co.", "Financial Services", "Banks"),
    ("V", "Visa Inc.", "Financial Services", "Credit Services"),
    ("JNJ", "Johnson & Johnson", "Healthcare", "Drug Manufacturers"),
    ("UNH", "UnitedHealth Group Inc.", "Healthcare", "Healthcare Plans"),
    ("XOM", "Exxon Mobil Corporation", "Energy", "Oil & Gas Integrated"),
    ("PG", "Procter & Gamble Co.", "Consumer Defensive", "Household Products"),
    ("KO", "Coca-Cola Co.", "Consumer Defensive", "Beverages"),
    ("HD", "Home Depot Inc.", "Consumer Cyclical", "Home Improvement"),
    ("CAT", "Caterpillar Inc.", "Industrials", "Farm & Heavy Machinery"),
    ("NEE", "NextEra Energy Inc.", "Utilities", "Utilities Regulated"),
    ("PLD", "Prologis Inc.", "Real Estate", "REIT Industrial"),
    ("LIN", "Linde plc", "Basic Materials", "Specialty Chemicals"),
    ("T", "AT&T Inc.", "Communication Services", "Telecom Services"),
];

const DEMO_SECTORS: [&str; 11] = [
    "Technology",
    "Healthcare",
    "Financial Services",
    "Consumer Cyclical",
    "Consumer Defensive",
    "Industrials",
    "Energy",
    "Utilities",
    "Real Estate",
    "Basic Materials",
    "Communication Services",
];

const DEMO_FIRST_NAMES: [&str; 10] = [
    "Avery", "Jordan", "Morgan", "Riley", "Casey", "Quinn", "Harper", "Rowan", "Skyler", "Emerson",
];
const DEMO_LAST_NAMES: [&str; 6] = ["Hale", "Okafor", "Lindqvist", "Moreau", "Tanaka", "Brennan"];
const DEMO_FIRMS: [&str; 7] = [
    "Northbridge Capital",
    "Harbor Research",
    "Summit Securities",
    "Keystone Partners",
    "Meridian Equity",
    "Blue Ridge Advisors",
    "Granite Street",
];

/// Deterministic demo universe: 100 stocks and 30 experts.
pub fn demo_snapshots() -> DatasetSnapshots {
    DatasetSnapshots {
        stocks: (0..100).map(demo_stock).collect(),
        experts: (0..30).map(demo_expert).collect(),
    }
}

/// Stable pseudo-random value in `[0, 1)` for a row and column.
fn spread(idx: u64, salt: u64) -> f64 {
    let mixed = (idx + 1)
        .wrapping_mul(2_654_435_761)
        .wrapping_add(salt.wrapping_mul(40_503))
        % 10_007;
    mixed as f64 / 10_007.0
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn demo_stock(idx: u64) -> Record {
    let slot = idx as usize;
    let (ticker, company, sector, industry) = match DEMO_COMPANIES.get(slot) {
        Some((ticker, company, sector, industry)) => (
            (*ticker).to_string(),
            (*company).to_string(),
            (*sector).to_string(),
            (*industry).to_string(),
        ),
        None => {
            let sector = DEMO_SECTORS[slot % DEMO_SECTORS.len()];
            (
                format!("DM{idx:03}"),
                format!("Demo Holdings {idx:03}"),
                sector.to_string(),
                format!("{sector} Services"),
            )
        }
    };
    let exchange = if idx % 3 == 0 { "NYSE" } else { "NASDAQ" };
    let country = if idx % 10 == 7 { "Canada" } else { "United States" };

    let price = round_to(5.0 + spread(idx, 1) * 495.0, 2);
    let market_cap = round_to(2.0e8 * (1.0 + spread(idx, 2) * 1.5e4), -6);
    let eps = round_to(-2.0 + spread(idx, 3) * 14.0, 2);
    // Loss-making companies have no meaningful P/E.
    let pe = (eps > 0.0).then(|| round_to(price / eps, 1));
    let dividend_yield = (idx % 4 != 0).then(|| round_to(spread(idx, 4) * 6.0, 2));

    Record::new()
        .with("ticker", ticker)
        .with("company", company)
        .with("sector", sector)
        .with("industry", industry)
        .with("exchange", exchange)
        .with("country", country)
        .with("price", price)
        .with("market_cap", market_cap)
        .with("change_pct", round_to(-6.0 + spread(idx, 5) * 12.0, 2))
        .with("volume", round_to(1.0e5 + spread(idx, 6) * 5.0e7, -3))
        .with("pe", pe)
        .with("pb", round_to(0.5 + spread(idx, 7) * 14.5, 2))
        .with("ps", round_to(0.3 + spread(idx, 8) * 19.7, 2))
        .with("peg", round_to(0.2 + spread(idx, 9) * 3.8, 2))
        .with("eps", eps)
        .with("roe", round_to(-10.0 + spread(idx, 10) * 55.0, 1))
        .with("roa", round_to(-5.0 + spread(idx, 11) * 25.0, 1))
        .with("debt_to_equity", round_to(spread(idx, 12) * 3.0, 2))
        .with("revenue_growth", round_to(-15.0 + spread(idx, 13) * 60.0, 1))
        .with("eps_growth", round_to(-30.0 + spread(idx, 14) * 90.0, 1))
        .with("dividend_yield", dividend_yield)
        .with(
            "payout_ratio",
            dividend_yield.map(|_| round_to(spread(idx, 15) * 90.0, 1)),
        )
        .with("beta", round_to(0.3 + spread(idx, 16) * 1.9, 2))
        .with("perf_week", round_to(-8.0 + spread(idx, 17) * 16.0, 2))
        .with("perf_month", round_to(-15.0 + spread(idx, 18) * 30.0, 2))
        .with("perf_ytd", round_to(-35.0 + spread(idx, 19) * 90.0, 2))
}

fn demo_expert(idx: u64) -> Record {
    let slot = idx as usize;
    let name = format!(
        "{} {}",
        DEMO_FIRST_NAMES[slot % DEMO_FIRST_NAMES.len()],
        DEMO_LAST_NAMES[(slot / DEMO_FIRST_NAMES.len() + slot) % DEMO_LAST_NAMES.len()]
    );

    Record::new()
        .with("name", name)
        .with("firm", DEMO_FIRMS[slot % DEMO_FIRMS.len()])
        .with("sector", DEMO_SECTORS[(slot * 5) % DEMO_SECTORS.len()])
        .with("rank", (idx + 1) as i64)
        .with("success_rate", round_to(40.0 + spread(idx, 21) * 45.0, 1))
        .with("avg_return", round_to(-5.0 + spread(idx, 22) * 30.0, 1))
        .with("ratings_count", (20.0 + spread(idx, 23) * 480.0).floor())
        .with("stars", round_to(1.0 + spread(idx, 24) * 4.0, 1))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::filters::{normalize_filters, FilterSet, RawCriterion};
    use crate::pipeline::PageWindow;

    #[test]
    fn demo_snapshots_have_expected_sizes_and_unique_keys() {
        let snapshots = demo_snapshots();
        assert_eq!(snapshots.stocks.len(), 100);
        assert_eq!(snapshots.experts.len(), 30);

        let tickers: BTreeSet<_> = snapshots.stocks.iter().filter_map(Record::ticker).collect();
        assert_eq!(tickers.len(), 100);
        let names: BTreeSet<_> = snapshots
            .experts
            .iter()
            .filter_map(|expert| expert.text("name").map(|name| name.into_owned()))
            .collect();
        assert_eq!(names.len(), 30);
    }

    #[test]
    fn demo_data_is_deterministic() {
        assert_eq!(demo_snapshots(), demo_snapshots());
    }

    #[test]
    fn snapshot_source_pages_and_counts_matches() {
        let source = InMemorySnapshotSource::demo().data_source(Dataset::Stocks);
        let query = PageQuery {
            window: Some(PageWindow::new(2, 30)),
            ..PageQuery::default()
        };

        let page = source.page(&query);
        assert_eq!(page.total_count, 100);
        assert_eq!(page.records.len(), 30);
        assert_eq!(page.records[0].ticker(), Some("DM030"));
    }

    #[test]
    fn universe_query_returns_every_match() {
        let source = InMemorySnapshotSource::demo().data_source(Dataset::Stocks);
        let page = source.page(&PageQuery::universe());
        assert_eq!(page.records.len(), 100);
        assert_eq!(page.total_count, 100);
    }

    #[test]
    fn symbols_follow_filters_and_sort_hint() {
        let source = InMemorySnapshotSource::demo();
        source.replace(
            Dataset::Stocks,
            vec![
                Record::new().with("ticker", "A").with("pe", 30.0),
                Record::new().with("ticker", "B").with("pe", 10.0),
                Record::new().with("ticker", "C").with("pe", 20.0),
                Record::new().with("ticker", "D").with("pe", 50.0),
            ],
        );
        let filters = normalize_filters(
            &FilterSet::new().with(
                "pe",
                RawCriterion::threshold("30").with_sort(crate::filters::Direction::Asc),
            ),
            &FilterCatalog::stocks(),
        );

        let universe = source.data_source(Dataset::Stocks).symbols(&filters, "");
        assert_eq!(universe.symbols, vec!["B", "C", "A"]);
        assert_eq!(universe.total, 3);
    }

    #[test]
    fn expert_symbols_use_names() {
        let source = InMemorySnapshotSource::demo().data_source(Dataset::Experts);
        let universe = source.symbols(&NormalizedFilters::default(), "");
        assert_eq!(universe.total, 30);
        assert!(universe.symbols.iter().all(|name| name.contains(' ')));
    }

    #[test]
    fn loads_records_from_json_file_and_skips_non_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("universe.json");
        fs::write(
            &path,
            r#"{"stocks":[{"ticker":"AAPL","pe":28.1},42,{"ticker":"MSFT"}],"experts":[]}"#,
        )
        .unwrap();

        let source = InMemorySnapshotSource::from_json_file(&path).unwrap();
        let stocks = source.snapshot(Dataset::Stocks);
        assert_eq!(stocks.len(), 2);
        assert_eq!(stocks[0].number("pe"), Some(28.1));
        assert!(source.snapshot(Dataset::Experts).is_empty());
    }

    #[test]
    fn json_file_errors_are_classified() {
        let dir = tempfile::tempdir().unwrap();

        let missing = InMemorySnapshotSource::from_json_file(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(SourceLoadError::Io { .. })));

        let garbled = dir.path().join("garbled.json");
        fs::write(&garbled, "{not json").unwrap();
        assert!(matches!(
            InMemorySnapshotSource::from_json_file(&garbled),
            Err(SourceLoadError::Json { .. })
        ));

        let wrong = dir.path().join("wrong.json");
        fs::write(&wrong, r#"[{"ticker":"AAPL"}]"#).unwrap();
        assert!(matches!(
            InMemorySnapshotSource::from_json_file(&wrong),
            Err(SourceLoadError::Shape { .. })
        ));
    }
}
