//! Stock and expert screener core crate.
//!
//! Current implemented scope:
//! - filter normalization, search matching and the row pipeline
//! - view sessions with stale-response protection over pluggable data sources
//! - in-memory, JSON-file and HTTP data sources
//! - the screener HTTP surface and durable saved portfolios

mod config;
mod dashboard;
mod filters;
mod observability;
mod pipeline;
mod portfolio;
mod record;
mod search;
mod session;
mod source;
mod views;

pub use config::{server_config_from_env, ServerConfig, DEFAULT_ADDR, DEFAULT_PORTFOLIO_PATH};
pub use dashboard::{
    render_screener_html, screener_href, screener_router, view_state_from_query, RowsResponse,
    ScreenerAppState,
};
pub use filters::{
    normalize_filters, parse_threshold, ActiveCriterion, Criterion, Direction, FieldKind,
    FilterCatalog, FilterField, FilterSet, NormalizedFilters, Operator, RawCriterion,
    EXPERT_FILTER_FIELDS, RESERVED_QUERY_KEYS, STOCK_FILTER_FIELDS,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_source_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use pipeline::{
    compare_records, filter_stage, ordered_matches, paginate, sanitize_page_index,
    sanitize_page_size, search_stage, sort_stage, total_pages, PageInfo, PageWindow,
    PipelineOutput, RowPipeline, SortSpec, ViewState, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use portfolio::{normalize_tickers, NewPortfolio, Portfolio, PortfolioError, PortfolioStore};
pub use record::{FieldValue, Record};
pub use search::{is_match, DEFAULT_SEARCH_FIELDS};
pub use session::{
    DataSource, DataSourceError, FetchOutcome, FetchTicket, FetchedPage, LoadState, PageQuery,
    PaginationStrategy, ScreenerSession, SymbolUniverse,
};
#[cfg(feature = "http-source")]
pub use source::HttpDataSource;
pub use source::{
    demo_snapshots, symbol_universe, Dataset, DatasetSnapshots, InMemorySnapshotSource,
    RecordSnapshotSource, SnapshotDataSource, SourceLoadError,
};
pub use views::{
    find_view, format_cell, views_for, CellFormat, Column, ViewSchema, DEFAULT_VIEW, VIEWS,
};
