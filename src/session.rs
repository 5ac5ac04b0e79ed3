//! View session: load state machine, data source contract and stale-response guard.
//!
//! Rules implemented:
//! - `Idle -> Loading -> {Loaded, Errored}`, with `retry` from `Errored` only
//! - every dispatched fetch gets an increasing request id; only the latest applies
//! - errors clear the record set instead of keeping stale rows on screen
//! - server-side page requests are clamped to the last known page, and an
//!   empty page past the end of a non-empty result is re-requested clamped
//! - client-side pagination fetches the universe once and recomputes locally;
//!   server-side pagination refetches on every state change

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::filters::{Direction, NormalizedFilters, RawCriterion};
use crate::pipeline::{
    sort_stage, total_pages, PageInfo, PageWindow, RowPipeline, SortSpec, ViewState,
};
use crate::record::Record;

/// What a data source is asked for. `window: None` requests every matching record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageQuery {
    pub window: Option<PageWindow>,
    pub filters: NormalizedFilters,
    pub search_query: String,
    pub sort: Option<SortSpec>,
}

impl PageQuery {
    pub fn universe() -> Self {
        Self::default()
    }

    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty() && self.search_query.trim().is_empty()
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.filters.to_query_pairs();

        if let Some(window) = self.window {
            pairs.push(("page".to_string(), window.page_index.to_string()));
            pairs.push(("page_size".to_string(), window.page_size.to_string()));
        }
        if !self.search_query.trim().is_empty() {
            pairs.push(("q".to_string(), self.search_query.trim().to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.key.clone()));
            pairs.push(("dir".to_string(), sort.direction.as_str().to_string()));
        }

        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub records: Vec<Record>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolUniverse {
    pub symbols: Vec<String>,
    pub total: usize,
}

/// Failures at the data source boundary. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("could not reach the screener backend: {0}")]
    Transport(String),
    #[error("screener backend responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("screener backend sent an unreadable payload: {0}")]
    MalformedPayload(String),
    #[error("no data available")]
    Empty,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_page(&self, query: &PageQuery) -> Result<FetchedPage, DataSourceError>;

    async fn fetch_all_matching_symbols(
        &self,
        filters: &NormalizedFilters,
        search_query: &str,
    ) -> Result<SymbolUniverse, DataSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Errored { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    ClientSide,
    ServerSide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub request_id: u64,
    pub query: PageQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Applied,
    Stale,
    /// The requested page lay past the end of the result; dispatch this
    /// ticket for the last page instead.
    Refetch(FetchTicket),
}

#[derive(Debug, Clone)]
struct InFlight {
    request_id: u64,
    unfiltered: bool,
    window: Option<PageWindow>,
}

/// Owned state of one screener view: records, view state and visible slice.
#[derive(Debug, Clone)]
pub struct ScreenerSession {
    pipeline: RowPipeline,
    strategy: PaginationStrategy,
    state: ViewState,
    load_state: LoadState,
    records: Vec<Record>,
    /// Total reported by the last applied server-side fetch.
    server_total: Option<usize>,
    visible: Vec<Record>,
    page_info: PageInfo,
    next_request_id: u64,
    in_flight: Option<InFlight>,
}

impl ScreenerSession {
    pub fn new(pipeline: RowPipeline, strategy: PaginationStrategy) -> Self {
        Self::with_state(pipeline, strategy, ViewState::new())
    }

    pub fn with_state(pipeline: RowPipeline, strategy: PaginationStrategy, state: ViewState) -> Self {
        let page_info = PageInfo::for_total(state.page(), 0);
        Self {
            pipeline,
            strategy,
            state,
            load_state: LoadState::Idle,
            records: Vec::new(),
            server_total: None,
            visible: Vec::new(),
            page_info,
            next_request_id: 0,
            in_flight: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn strategy(&self) -> PaginationStrategy {
        self.strategy
    }

    pub fn visible_rows(&self) -> &[Record] {
        &self.visible
    }

    pub fn page_info(&self) -> PageInfo {
        self.page_info
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.load_state {
            LoadState::Errored { message } => Some(message.as_str()),
            _ => None,
        }
    }

    /// Issues a new request id and moves to `Loading`. Any earlier in-flight
    /// request becomes stale.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        if let (PaginationStrategy::ServerSide, Some(total)) = (self.strategy, self.server_total) {
            let clamped = PageInfo::for_total(self.state.page(), total);
            self.state.sync_page(&clamped);
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let query = self.build_query();

        self.in_flight = Some(InFlight {
            request_id,
            unfiltered: query.is_unfiltered(),
            window: query.window,
        });
        self.load_state = LoadState::Loading;

        debug!(
            component = "session",
            event = "session.fetch.start",
            request_id,
            strategy = ?self.strategy
        );

        FetchTicket { request_id, query }
    }

    pub fn apply_fetch(
        &mut self,
        request_id: u64,
        result: Result<FetchedPage, DataSourceError>,
    ) -> FetchOutcome {
        let (unfiltered, window) = match &self.in_flight {
            Some(in_flight) if in_flight.request_id == request_id => {
                (in_flight.unfiltered, in_flight.window)
            }
            _ => {
                debug!(
                    component = "session",
                    event = "session.fetch.stale",
                    request_id,
                    latest_request_id = self.next_request_id
                );
                return FetchOutcome::Stale;
            }
        };
        self.in_flight = None;

        let result = result.and_then(|page| {
            if unfiltered && page.records.is_empty() && page.total_count == 0 {
                Err(DataSourceError::Empty)
            } else {
                Ok(page)
            }
        });

        match result {
            Ok(page) if overshoots(window, &page) => {
                self.server_total = Some(page.total_count);
                let ticket = self.begin_fetch();
                debug!(
                    component = "session",
                    event = "session.fetch.clamped",
                    request_id,
                    next_request_id = ticket.request_id,
                    total_count = page.total_count
                );
                return FetchOutcome::Refetch(ticket);
            }
            Ok(page) => {
                info!(
                    component = "session",
                    event = "session.fetch.applied",
                    request_id,
                    records = page.records.len(),
                    total_count = page.total_count
                );
                self.records = page.records;
                self.server_total = Some(page.total_count);
                self.load_state = LoadState::Loaded;
                self.recompute();
            }
            Err(err) => {
                warn!(
                    component = "session",
                    event = "session.fetch.error",
                    request_id,
                    error = %err
                );
                self.records.clear();
                self.visible.clear();
                self.server_total = None;
                self.page_info = PageInfo::for_total(self.state.page(), 0);
                self.load_state = LoadState::Errored {
                    message: err.to_string(),
                };
            }
        }

        FetchOutcome::Applied
    }

    /// Re-issues the fetch after an error; `None` in any other state.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        match self.load_state {
            LoadState::Errored { .. } => Some(self.begin_fetch()),
            _ => None,
        }
    }

    /// Fetches and applies the current view, following a clamped refetch when
    /// the requested page lay past the end.
    pub async fn refresh(&mut self, source: &dyn DataSource) -> FetchOutcome {
        let mut ticket = self.begin_fetch();
        loop {
            let result = source.fetch_page(&ticket.query).await;
            match self.apply_fetch(ticket.request_id, result) {
                FetchOutcome::Refetch(next) => ticket = next,
                outcome => return outcome,
            }
        }
    }

    pub async fn matching_symbols(
        &self,
        source: &dyn DataSource,
    ) -> Result<SymbolUniverse, DataSourceError> {
        let filters = self.pipeline.normalize(&self.state);
        source
            .fetch_all_matching_symbols(&filters, self.state.search_query())
            .await
    }

    pub fn set_filter(
        &mut self,
        field: impl Into<String>,
        criterion: RawCriterion,
    ) -> Option<FetchTicket> {
        self.state.set_filter(field, criterion);
        self.after_change()
    }

    pub fn remove_filter(&mut self, field: &str) -> Option<FetchTicket> {
        self.state.remove_filter(field);
        self.after_change()
    }

    pub fn clear_filters(&mut self) -> Option<FetchTicket> {
        self.state.clear_filters();
        self.after_change()
    }

    pub fn set_sort(&mut self, key: impl Into<String>, direction: Direction) -> Option<FetchTicket> {
        self.state.set_sort(key, direction);
        self.after_change()
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) -> Option<FetchTicket> {
        self.state.set_search_query(query);
        self.after_change()
    }

    pub fn set_page(&mut self, page_index: usize) -> Option<FetchTicket> {
        self.state.set_page(page_index);
        self.after_change()
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Option<FetchTicket> {
        self.state.set_page_size(page_size);
        self.after_change()
    }

    fn build_query(&self) -> PageQuery {
        match self.strategy {
            PaginationStrategy::ClientSide => PageQuery::universe(),
            PaginationStrategy::ServerSide => {
                let filters = self.pipeline.normalize(&self.state);
                let sort = self.pipeline.effective_sort(&self.state, &filters);
                PageQuery {
                    window: Some(self.state.page()),
                    filters,
                    search_query: self.state.search_query().to_string(),
                    sort,
                }
            }
        }
    }

    fn after_change(&mut self) -> Option<FetchTicket> {
        match self.strategy {
            PaginationStrategy::ClientSide => {
                if self.load_state == LoadState::Loaded {
                    self.recompute();
                }
                None
            }
            PaginationStrategy::ServerSide => Some(self.begin_fetch()),
        }
    }

    fn recompute(&mut self) {
        match self.strategy {
            PaginationStrategy::ClientSide => {
                let output = self.pipeline.run(&self.records, &self.state);
                self.visible = output.rows;
                self.page_info = output.page_info;
            }
            PaginationStrategy::ServerSide => {
                // The server already filtered and paged; only the order is local.
                let filters = self.pipeline.normalize(&self.state);
                let sort = self.pipeline.effective_sort(&self.state, &filters);
                let mut rows: Vec<&Record> = self.records.iter().collect();
                sort_stage(&mut rows, sort.as_ref());
                self.visible = rows.into_iter().cloned().collect();
                self.page_info =
                    PageInfo::for_total(self.state.page(), self.server_total.unwrap_or(0));
            }
        }
        self.state.sync_page(&self.page_info);
    }
}

/// An empty page requested beyond the last page of a non-empty result.
fn overshoots(window: Option<PageWindow>, page: &FetchedPage) -> bool {
    match window {
        Some(window) => {
            page.records.is_empty()
                && page.total_count > 0
                && window.page_index > total_pages(page.total_count, window.page_size)
        }
        None => false,
    }
}
