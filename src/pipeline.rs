//! Row pipeline: filter, search, sort and paginate already-fetched records.
//!
//! Stage order is fixed. Every stage is total: malformed inputs degrade to
//! inert filters or clamped pages, never to errors.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::filters::{
    normalize_filters, Direction, FilterCatalog, FilterSet, NormalizedFilters, RawCriterion,
};
use crate::record::{FieldValue, Record};
use crate::search::{is_match, DEFAULT_SEARCH_FIELDS};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    pub direction: Direction,
}

impl SortSpec {
    pub fn new(key: impl Into<String>, direction: Direction) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page_index: usize,
    pub page_size: usize,
}

impl PageWindow {
    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index: page_index.max(1),
            page_size: sanitize_page_size(page_size as f64),
        }
    }

    /// Builds a window from loosely-typed input (query strings, UI numbers).
    pub fn from_raw(page_index: f64, page_size: f64) -> Self {
        Self {
            page_index: sanitize_page_index(page_index),
            page_size: sanitize_page_size(page_size),
        }
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            page_index: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page_index: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_count: usize,
}

impl PageInfo {
    /// Page info for `total_count` rows, with the requested page clamped into range.
    pub fn for_total(window: PageWindow, total_count: usize) -> Self {
        let page_size = sanitize_page_size(window.page_size as f64);
        let total_pages = total_pages(total_count, page_size);

        Self {
            page_index: window.page_index.clamp(1, total_pages),
            page_size,
            total_pages,
            total_count,
        }
    }
}

pub fn sanitize_page_size(raw: f64) -> usize {
    if !raw.is_finite() || raw < 1.0 {
        return DEFAULT_PAGE_SIZE;
    }
    (raw.floor() as usize).min(MAX_PAGE_SIZE)
}

pub fn sanitize_page_index(raw: f64) -> usize {
    if !raw.is_finite() || raw < 1.0 {
        return 1;
    }
    raw.floor() as usize
}

/// `ceil(total_count / page_size)`, never below 1.
pub fn total_pages(total_count: usize, page_size: usize) -> usize {
    total_count.div_ceil(page_size.max(1)).max(1)
}

pub fn filter_stage<'a, I>(records: I, filters: &NormalizedFilters) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|record| filters.matches(record))
        .collect()
}

pub fn search_stage<'a, S: AsRef<str>>(
    rows: Vec<&'a Record>,
    query: &str,
    fields: &[S],
) -> Vec<&'a Record> {
    if query.trim().is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|record| is_match(record, query, fields))
        .collect()
}

/// Stable sort. Ties keep input order in both directions and records without
/// a value for the key always trail.
pub fn sort_stage(rows: &mut [&Record], sort: Option<&SortSpec>) {
    if let Some(spec) = sort {
        rows.sort_by(|a, b| compare_records(a, b, spec));
    }
}

pub fn compare_records(a: &Record, b: &Record, spec: &SortSpec) -> Ordering {
    match (sort_key(a.get(&spec.key)), sort_key(b.get(&spec.key))) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => match spec.direction {
            Direction::Asc => left.cmp(&right),
            Direction::Desc => right.cmp(&left),
        },
    }
}

/// Filter, search and sort stages over already-normalized inputs.
pub fn ordered_matches<'a, S: AsRef<str>>(
    records: &'a [Record],
    filters: &NormalizedFilters,
    search_query: &str,
    search_fields: &[S],
    sort: Option<&SortSpec>,
) -> Vec<&'a Record> {
    let filtered = filter_stage(records, filters);
    let mut rows = search_stage(filtered, search_query, search_fields);
    sort_stage(&mut rows, sort);
    rows
}

/// Half-open page slice, with an out-of-range page clamped to the last page.
pub fn paginate<T>(rows: &[T], window: PageWindow) -> (&[T], PageInfo) {
    let info = PageInfo::for_total(window, rows.len());
    let start = (info.page_index - 1) * info.page_size;
    let end = start.saturating_add(info.page_size).min(rows.len());
    (&rows[start.min(end)..end], info)
}

#[derive(Debug, PartialEq)]
enum SortKey<'a> {
    Number(f64),
    Text(Cow<'a, str>),
}

impl Eq for SortKey<'_> {}

impl PartialOrd for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => {
                left.partial_cmp(right).unwrap_or(Ordering::Equal)
            }
            (Self::Text(left), Self::Text(right)) => left.cmp(right),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

fn sort_key(value: Option<&FieldValue>) -> Option<SortKey<'_>> {
    match value? {
        FieldValue::Number(number) if number.is_finite() => Some(SortKey::Number(*number)),
        FieldValue::Text(text) => Some(SortKey::Text(Cow::Borrowed(text.as_str()))),
        FieldValue::Bool(flag) => Some(SortKey::Text(Cow::Owned(flag.to_string()))),
        FieldValue::Number(_) | FieldValue::Null => None,
    }
}

/// Filter, search, sort and page state owned by one view instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    filters: FilterSet,
    search_query: String,
    sort: Option<SortSpec>,
    page: PageWindow,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page: PageWindow::new(1, page_size),
            ..Self::default()
        }
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn page(&self) -> PageWindow {
        self.page
    }

    pub fn set_filter(&mut self, field: impl Into<String>, criterion: RawCriterion) {
        self.filters.insert(field, criterion);
        self.reset_page();
    }

    pub fn replace_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
        self.reset_page();
    }

    pub fn remove_filter(&mut self, field: &str) {
        self.filters.remove(field);
        self.reset_page();
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.reset_page();
    }

    pub fn set_sort(&mut self, key: impl Into<String>, direction: Direction) {
        self.sort = Some(SortSpec::new(key, direction));
        self.reset_page();
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.reset_page();
    }

    pub fn set_page(&mut self, page_index: usize) {
        self.page.page_index = page_index.max(1);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page = PageWindow::new(1, page_size);
    }

    /// Stores the clamped page index reported by a pipeline run.
    pub fn sync_page(&mut self, info: &PageInfo) {
        self.page.page_index = info.page_index;
    }

    fn reset_page(&mut self) {
        self.page.page_index = 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub rows: Vec<Record>,
    pub page_info: PageInfo,
}

/// Stateless pipeline configuration for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPipeline {
    catalog: FilterCatalog,
    search_fields: Vec<String>,
}

impl RowPipeline {
    pub fn new(catalog: FilterCatalog) -> Self {
        Self {
            catalog,
            search_fields: DEFAULT_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    pub fn normalize(&self, state: &ViewState) -> NormalizedFilters {
        normalize_filters(state.filters(), &self.catalog)
    }

    /// Explicit sort first, then the filter panel's sort hint.
    pub fn effective_sort(&self, state: &ViewState, filters: &NormalizedFilters) -> Option<SortSpec> {
        state.sort().or_else(|| filters.sort_hint()).cloned()
    }

    pub fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    /// Filter, search and sort stages; the full ordered match set.
    pub fn matching<'a>(&self, records: &'a [Record], state: &ViewState) -> Vec<&'a Record> {
        let filters = self.normalize(state);
        let sort = self.effective_sort(state, &filters);
        ordered_matches(
            records,
            &filters,
            state.search_query(),
            self.search_fields.as_slice(),
            sort.as_ref(),
        )
    }

    pub fn run(&self, records: &[Record], state: &ViewState) -> PipelineOutput {
        let matching = self.matching(records, state);
        let (page, page_info) = paginate(&matching, state.page());

        PipelineOutput {
            rows: page.iter().map(|record| (*record).clone()).collect(),
            page_info,
        }
    }
}

impl Default for RowPipeline {
    fn default() -> Self {
        Self::new(FilterCatalog::stocks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Operator;

    fn numbered(count: usize) -> Vec<Record> {
        (0..count)
            .map(|idx| Record::new().with("ticker", format!("T{idx:03}")).with("rank", idx as i64))
            .collect()
    }

    fn tickers(rows: &[Record]) -> Vec<String> {
        rows.iter()
            .map(|row| row.ticker().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn hundred_records_page_through_and_clamp() {
        let records = numbered(100);
        let pipeline = RowPipeline::default();
        let mut state = ViewState::with_page_size(20);

        let first = pipeline.run(&records, &state);
        assert_eq!(first.rows, records[0..20].to_vec());
        assert_eq!(first.page_info.total_pages, 5);

        state.set_page(5);
        let fifth = pipeline.run(&records, &state);
        assert_eq!(fifth.rows, records[80..100].to_vec());

        state.set_page(6);
        let clamped = pipeline.run(&records, &state);
        assert_eq!(clamped.rows, fifth.rows);
        assert_eq!(clamped.page_info.page_index, 5);
    }

    #[test]
    fn desc_sort_keeps_tied_records_in_input_order() {
        let records = vec![
            Record::new().with("ticker", "A").with("change", -5.0),
            Record::new().with("ticker", "B").with("change", 10.0),
            Record::new().with("ticker", "C").with("change", 10.0),
        ];
        let mut state = ViewState::new();
        state.set_sort("change", Direction::Desc);

        let out = RowPipeline::default().run(&records, &state);
        assert_eq!(tickers(&out.rows), vec!["B", "C", "A"]);
    }

    #[test]
    fn missing_sort_values_trail_in_both_directions() {
        let records = vec![
            Record::new().with("ticker", "NULL").with("pe", FieldValue::Null),
            Record::new().with("ticker", "LOW").with("pe", 5.0),
            Record::new().with("ticker", "HIGH").with("pe", 50.0),
        ];
        let pipeline = RowPipeline::default();
        let mut state = ViewState::new();

        state.set_sort("pe", Direction::Asc);
        assert_eq!(tickers(&pipeline.run(&records, &state).rows), vec!["LOW", "HIGH", "NULL"]);

        state.set_sort("pe", Direction::Desc);
        assert_eq!(tickers(&pipeline.run(&records, &state).rows), vec!["HIGH", "LOW", "NULL"]);
    }

    #[test]
    fn text_sort_is_case_sensitive_lexicographic() {
        let records = vec![
            Record::new().with("ticker", "b"),
            Record::new().with("ticker", "B"),
            Record::new().with("ticker", "a"),
        ];
        let mut state = ViewState::new();
        state.set_sort("ticker", Direction::Asc);

        let out = RowPipeline::default().run(&records, &state);
        assert_eq!(tickers(&out.rows), vec!["B", "a", "b"]);
    }

    #[test]
    fn empty_input_reports_one_page() {
        let out = RowPipeline::default().run(&[], &ViewState::new());
        assert!(out.rows.is_empty());
        assert_eq!(out.page_info.total_pages, 1);
        assert_eq!(out.page_info.page_index, 1);
        assert_eq!(out.page_info.total_count, 0);
    }

    #[test]
    fn degenerate_page_sizes_fall_back_to_default() {
        assert_eq!(sanitize_page_size(0.0), DEFAULT_PAGE_SIZE);
        assert_eq!(sanitize_page_size(-4.0), DEFAULT_PAGE_SIZE);
        assert_eq!(sanitize_page_size(f64::NAN), DEFAULT_PAGE_SIZE);
        assert_eq!(sanitize_page_size(f64::INFINITY), DEFAULT_PAGE_SIZE);
        assert_eq!(sanitize_page_size(10_000.0), MAX_PAGE_SIZE);
        assert_eq!(sanitize_page_size(7.9), 7);
        assert_eq!(PageWindow::new(0, 0), PageWindow::default());
        assert_eq!(PageWindow::from_raw(f64::NAN, 3.0), PageWindow::new(1, 3));
    }

    #[test]
    fn total_pages_rounds_up_and_never_hits_zero() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn state_changes_reset_page_to_first() {
        let mut state = ViewState::with_page_size(10);

        state.set_page(4);
        state.set_filter("pe", RawCriterion::threshold("20"));
        assert_eq!(state.page().page_index, 1);

        state.set_page(4);
        state.set_search_query("app");
        assert_eq!(state.page().page_index, 1);

        state.set_page(4);
        state.set_sort("pe", Direction::Asc);
        assert_eq!(state.page().page_index, 1);

        state.set_page(4);
        state.clear_filters();
        assert_eq!(state.page().page_index, 1);
        assert_eq!(state.page().page_size, 10);
    }

    #[test]
    fn shrinking_result_set_clamps_stale_page() {
        let records = numbered(100);
        let pipeline = RowPipeline::new(FilterCatalog::experts());
        let mut state = ViewState::with_page_size(20);
        state.set_page(5);

        let wide = pipeline.run(&records, &state);
        state.sync_page(&wide.page_info);
        assert_eq!(state.page().page_index, 5);

        // Bypass the reset so the stale index survives into the recompute.
        let mut narrowed = state.clone();
        narrowed.replace_filters(
            FilterSet::new().with("rank", RawCriterion::threshold("29").with_operator(Operator::Lte)),
        );
        narrowed.set_page(5);

        let out = pipeline.run(&records, &narrowed);
        assert_eq!(out.page_info.total_pages, 2);
        assert_eq!(out.page_info.page_index, 2);
        assert_eq!(out.rows.len(), 10);
    }

    #[test]
    fn filters_search_and_hint_sort_compose() {
        let records = vec![
            Record::new().with("ticker", "AAPL").with("company", "Apple Inc.").with("pe", 29.0),
            Record::new().with("ticker", "APLE").with("company", "Apple Hospitality").with("pe", 14.0),
            Record::new().with("ticker", "BNNA").with("company", "Banana Co.").with("pe", 8.0),
        ];
        let mut state = ViewState::new();
        state.set_filter("pe", RawCriterion::threshold("30").with_sort(Direction::Asc));
        state.set_search_query("apple");

        let out = RowPipeline::default().run(&records, &state);
        assert_eq!(tickers(&out.rows), vec!["APLE", "AAPL"]);
        assert_eq!(out.page_info.total_count, 2);
    }

    #[test]
    fn running_twice_is_idempotent() {
        let records = numbered(37);
        let mut state = ViewState::with_page_size(8);
        state.set_sort("rank", Direction::Desc);
        state.set_page(3);

        let pipeline = RowPipeline::default();
        assert_eq!(pipeline.run(&records, &state), pipeline.run(&records, &state));
        assert_eq!(records, numbered(37));
    }
}
