//! Screener HTTP routes: HTML table page, rows JSON, symbol universe, view
//! catalog and saved portfolios.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::filters::{Direction, FieldKind, FilterSet, Operator};
use crate::pipeline::{
    sanitize_page_index, sanitize_page_size, PageInfo, PipelineOutput, SortSpec, ViewState,
    DEFAULT_PAGE_SIZE,
};
use crate::portfolio::{NewPortfolio, Portfolio, PortfolioError, PortfolioStore};
use crate::record::Record;
use crate::source::{symbol_universe, RecordSnapshotSource};
use crate::views::{find_view, Column, ViewSchema, DEFAULT_VIEW, VIEWS};

#[derive(Clone)]
pub struct ScreenerAppState {
    source: Arc<dyn RecordSnapshotSource>,
    portfolios: Arc<PortfolioStore>,
    default_page_size: usize,
}

impl ScreenerAppState {
    pub fn new(source: Arc<dyn RecordSnapshotSource>, portfolios: Arc<PortfolioStore>) -> Self {
        Self {
            source,
            portfolios,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = sanitize_page_size(page_size as f64);
        self
    }
}

pub fn screener_router(state: ScreenerAppState) -> Router {
    Router::new()
        .route("/screener", get(get_screener_html))
        .route("/screener/rows", get(get_screener_rows))
        .route("/screener/symbols", get(get_screener_symbols))
        .route("/screener/views", get(get_screener_views))
        .route("/portfolios", get(list_portfolios).post(create_portfolio))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub view: &'static str,
    pub columns: &'static [Column],
    pub records: Vec<Record>,
    pub cells: Vec<Vec<String>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unknown_view(name: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("unknown view {name:?}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<PortfolioError> for ApiError {
    fn from(err: PortfolioError) -> Self {
        let status = match &err {
            PortfolioError::DuplicateName(_) => StatusCode::CONFLICT,
            _ if err.is_rejection() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

type QueryPairs = Vec<(String, String)>;

fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn resolve_view(pairs: &[(String, String)]) -> Result<&'static ViewSchema, ApiError> {
    let name = query_value(pairs, "view").unwrap_or(DEFAULT_VIEW);
    find_view(name).ok_or_else(|| ApiError::unknown_view(name))
}

/// Rebuilds a view state from request parameters. Malformed numbers fall
/// back to page 1 and the default page size.
pub fn view_state_from_query(pairs: &[(String, String)], default_page_size: usize) -> ViewState {
    let mut state = ViewState::with_page_size(default_page_size);

    state.replace_filters(FilterSet::from_query_pairs(
        pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())),
    ));
    if let Some(query) = query_value(pairs, "q") {
        state.set_search_query(query);
    }
    if let Some(key) = query_value(pairs, "sort") {
        let direction = query_value(pairs, "dir")
            .and_then(Direction::parse)
            .unwrap_or(Direction::Asc);
        state.set_sort(key, direction);
    }
    if let Some(page_size) = query_value(pairs, "page_size")
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|size| size.is_finite() && *size >= 1.0)
    {
        state.set_page_size(sanitize_page_size(page_size));
    }
    if let Some(page) = query_value(pairs, "page").and_then(|raw| raw.parse::<f64>().ok()) {
        state.set_page(sanitize_page_index(page));
    }

    state
}

struct ViewRun {
    view: &'static ViewSchema,
    state: ViewState,
    output: PipelineOutput,
}

fn run_view(app: &ScreenerAppState, pairs: &[(String, String)]) -> Result<ViewRun, ApiError> {
    let view = resolve_view(pairs)?;
    let state = view_state_from_query(pairs, app.default_page_size);
    let records = app.source.snapshot(view.dataset);
    let output = view.dataset.pipeline().run(records.as_slice(), &state);

    Ok(ViewRun {
        view,
        state,
        output,
    })
}

async fn get_screener_html(
    State(app): State<ScreenerAppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Html<String>, ApiError> {
    let run = run_view(&app, &pairs)?;
    Ok(Html(render_screener_html(run.view, &run.state, &run.output)))
}

async fn get_screener_rows(
    State(app): State<ScreenerAppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<RowsResponse>, ApiError> {
    let run = run_view(&app, &pairs)?;
    let page_info = run.output.page_info;

    info!(
        component = "screener_server",
        event = "http.rows.request",
        view = run.view.name,
        page_index = page_info.page_index,
        page_size = page_info.page_size,
        total_count = page_info.total_count,
        returned = run.output.rows.len(),
        filters = run.state.filters().len()
    );

    let cells = run.output.rows.iter().map(|row| run.view.cells(row)).collect();
    Ok(Json(RowsResponse {
        view: run.view.name,
        columns: run.view.columns,
        records: run.output.rows,
        cells,
        page_info,
    }))
}

async fn get_screener_symbols(
    State(app): State<ScreenerAppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<impl IntoResponse, ApiError> {
    let view = resolve_view(&pairs)?;
    let state = view_state_from_query(&pairs, app.default_page_size);
    let records = app.source.snapshot(view.dataset);
    let rows = view.dataset.pipeline().matching(records.as_slice(), &state);

    Ok(Json(symbol_universe(&rows, view.dataset)))
}

async fn get_screener_views() -> impl IntoResponse {
    Json(&VIEWS[..])
}

async fn list_portfolios(
    State(app): State<ScreenerAppState>,
) -> Result<Json<Vec<Portfolio>>, ApiError> {
    let store = Arc::clone(&app.portfolios);
    let portfolios = tokio::task::spawn_blocking(move || store.load_all())
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))??;
    Ok(Json(portfolios))
}

async fn create_portfolio(
    State(app): State<ScreenerAppState>,
    body: Result<Json<NewPortfolio>, JsonRejection>,
) -> Result<(StatusCode, Json<Portfolio>), ApiError> {
    let Json(request) = body.map_err(|rejection| {
        ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let store = Arc::clone(&app.portfolios);
    let saved = tokio::task::spawn_blocking(move || store.save(request))
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .map_err(|err| {
            if !err.is_rejection() {
                warn!(
                    component = "screener_server",
                    event = "portfolio.save.error",
                    error = %err
                );
            }
            ApiError::from(err)
        })?;

    Ok((StatusCode::CREATED, Json(saved)))
}

pub fn render_screener_html(view: &ViewSchema, state: &ViewState, output: &PipelineOutput) -> String {
    let now_utc = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let info = output.page_info;

    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!(
        "<title>Stock Screener · {}</title>\n",
        escape_html(view.title)
    ));
    out.push_str("<style>:root{--bg:#f4f6f1;--card:#ffffff;--ink:#17212b;--muted:#5d6873;--line:#d9dee3;--head:#1d3b2f;--accent:#1f7a4d}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Inter\",\"Segoe UI\",sans-serif;background:linear-gradient(160deg,var(--bg),#e8eef2);min-height:100vh}.shell{max-width:1400px;margin:0 auto;padding:24px 18px}.hero{background:linear-gradient(135deg,#183a2c 0%,#2c6148 100%);color:#f5faf7;border-radius:14px;padding:16px 20px}.hero h1{margin:0 0 8px;font-size:1.5rem}.hero-meta{display:flex;gap:16px;flex-wrap:wrap;font-size:.9rem;color:#d6e9df}.tabs{display:flex;gap:8px;flex-wrap:wrap;margin-top:14px}.tab{padding:6px 12px;border-radius:8px;background:#fff;color:var(--ink);text-decoration:none;border:1px solid var(--line);font-size:.85rem}.tab.active{background:var(--accent);color:#fff;border-color:var(--accent)}.card{margin-top:14px;background:var(--card);border:1px solid var(--line);border-radius:14px;overflow:hidden;box-shadow:0 10px 24px rgba(23,33,43,.08)}.filters-form{display:grid;grid-template-columns:repeat(auto-fill,minmax(170px,1fr));gap:10px;padding:14px}.filters-form label{display:flex;flex-direction:column;font-size:.75rem;color:var(--muted);gap:4px}.filters-form input,.filters-form select{padding:6px 8px;border:1px solid var(--line);border-radius:6px;font-size:.85rem}.actions{display:flex;gap:8px;align-items:end}.btn{padding:7px 12px;border-radius:8px;border:0;background:var(--accent);color:#fff;font-weight:600;cursor:pointer;text-decoration:none;font-size:.85rem}.table-wrap{overflow:auto;max-height:72vh}table{width:100%;border-collapse:collapse}thead th{position:sticky;top:0;background:var(--head);color:#eef6f1;font-size:.78rem;text-transform:uppercase;letter-spacing:.04em;padding:9px 10px;text-align:left}thead th a{color:inherit;text-decoration:none}tbody td{font-size:.84rem;padding:8px 10px;border-bottom:1px solid var(--line);white-space:nowrap}tbody tr:nth-child(even){background:#fafcfb}.empty{padding:28px;text-align:center;color:var(--muted)}.pager{display:flex;justify-content:space-between;align-items:center;padding:10px 14px;border-top:1px solid var(--line);font-size:.85rem;color:var(--muted)}</style>\n");
    out.push_str("</head><body><main class=\"shell\">\n");

    out.push_str(&format!(
        "<section class=\"hero\"><h1>Stock Screener · {}</h1>",
        escape_html(view.title)
    ));
    out.push_str("<div class=\"hero-meta\">");
    out.push_str(&format!("<span>Dataset: {}</span>", view.dataset.as_str()));
    out.push_str(&format!("<span>Matches: {}</span>", info.total_count));
    out.push_str(&format!(
        "<span>Generated: {}</span>",
        escape_html(&now_utc)
    ));
    out.push_str("</div></section>\n");

    out.push_str("<nav class=\"tabs\">");
    for candidate in VIEWS.iter() {
        let class = if candidate.name == view.name {
            "tab active"
        } else {
            "tab"
        };
        out.push_str(&format!(
            "<a class=\"{class}\" href=\"/screener?view={}\">{}</a>",
            candidate.name,
            escape_html(candidate.title)
        ));
    }
    out.push_str("</nav>\n");

    render_filter_form(&mut out, view, state);
    render_table(&mut out, view, state, output);

    out.push_str("</main></body></html>\n");
    out
}

fn render_filter_form(out: &mut String, view: &ViewSchema, state: &ViewState) {
    out.push_str("<section class=\"card\"><form class=\"filters-form\" id=\"filters-form\" method=\"get\" action=\"/screener\">");
    out.push_str(&format!(
        "<input type=\"hidden\" name=\"view\" value=\"{}\">",
        view.name
    ));
    out.push_str(&format!(
        "<input type=\"hidden\" name=\"page_size\" value=\"{}\">",
        state.page().page_size
    ));
    if let Some(sort) = state.sort() {
        out.push_str(&format!(
            "<input type=\"hidden\" name=\"sort\" value=\"{}\"><input type=\"hidden\" name=\"dir\" value=\"{}\">",
            escape_html(&sort.key),
            sort.direction.as_str()
        ));
    }
    out.push_str(&format!(
        "<label>Search<input type=\"search\" name=\"q\" value=\"{}\" placeholder=\"Name, ticker, sector\"></label>",
        escape_html(state.search_query())
    ));

    for field in view.dataset.catalog().fields() {
        let current = state.filters().get(field.key);
        let threshold = current.map(|raw| raw.threshold.as_str()).unwrap_or("");
        let placeholder = match field.kind {
            FieldKind::Threshold { default_operator } => default_operator.as_str(),
            FieldKind::Choice => "all",
            FieldKind::Text => "contains",
        };
        out.push_str(&format!(
            "<label>{}<input name=\"{}\" value=\"{}\" placeholder=\"{}\">",
            escape_html(field.label),
            field.key,
            escape_html(threshold),
            placeholder
        ));

        if matches!(field.kind, FieldKind::Threshold { .. }) {
            let selected = current.and_then(|raw| raw.operator);
            out.push_str(&format!("<select name=\"{}_op\">", field.key));
            out.push_str("<option value=\"\">default</option>");
            for operator in OPERATOR_CHOICES {
                let marker = if selected == Some(operator) {
                    " selected"
                } else {
                    ""
                };
                out.push_str(&format!(
                    "<option value=\"{}\"{marker}>{}</option>",
                    operator.as_str(),
                    escape_html(operator_symbol(operator))
                ));
            }
            out.push_str("</select>");
        }
        out.push_str("</label>");
    }

    out.push_str(&format!(
        "<div class=\"actions\"><button class=\"btn\" type=\"submit\">Apply</button><a class=\"btn\" href=\"/screener?view={}\">Reset</a></div>",
        view.name
    ));
    out.push_str("</form></section>\n");
}

const OPERATOR_CHOICES: [Operator; 6] = [
    Operator::Lte,
    Operator::Lt,
    Operator::Gte,
    Operator::Gt,
    Operator::Eq,
    Operator::Ne,
];

fn operator_symbol(operator: Operator) -> &'static str {
    match operator {
        Operator::Lte => "<=",
        Operator::Lt => "<",
        Operator::Gte => ">=",
        Operator::Gt => ">",
        Operator::Eq => "=",
        Operator::Ne => "!=",
    }
}

fn render_table(out: &mut String, view: &ViewSchema, state: &ViewState, output: &PipelineOutput) {
    let info = output.page_info;

    out.push_str("<section class=\"card\"><div class=\"table-wrap\"><table id=\"screener-table\">\n");
    out.push_str("<thead><tr>");
    for column in view.columns {
        let direction = match state.sort() {
            Some(sort) if sort.key == column.field && sort.direction == Direction::Asc => {
                Direction::Desc
            }
            _ => Direction::Asc,
        };
        let mut sorted = state.clone();
        sorted.set_sort(column.field, direction);
        let indicator = match state.sort() {
            Some(sort) if sort.key == column.field => match sort.direction {
                Direction::Asc => " ▲",
                Direction::Desc => " ▼",
            },
            _ => "",
        };
        out.push_str(&format!(
            "<th><a href=\"{}\">{}{indicator}</a></th>",
            escape_html(&screener_href(view, &sorted)),
            escape_html(column.header)
        ));
    }
    out.push_str("</tr></thead><tbody>\n");

    for (idx, row) in output.rows.iter().enumerate() {
        out.push_str(&format!("<tr data-row=\"{idx}\">"));
        for cell in view.cells(row) {
            out.push_str("<td>");
            out.push_str(&escape_html(&cell));
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody></table>");
    if output.rows.is_empty() {
        out.push_str("<div class=\"empty\">No records match the current filters.</div>");
    }
    out.push_str("</div>");

    out.push_str("<div class=\"pager\">");
    out.push_str(&page_link(view, state, info, info.page_index.checked_sub(1), "Previous"));
    out.push_str(&format!(
        "<span>Page {} of {} · {} matches</span>",
        info.page_index, info.total_pages, info.total_count
    ));
    let next = (info.page_index < info.total_pages).then_some(info.page_index + 1);
    out.push_str(&page_link(view, state, info, next, "Next"));
    out.push_str("</div></section>\n");
}

fn page_link(
    view: &ViewSchema,
    state: &ViewState,
    info: PageInfo,
    target: Option<usize>,
    label: &str,
) -> String {
    match target.filter(|page| *page >= 1 && *page <= info.total_pages) {
        Some(page) => {
            let mut paged = state.clone();
            paged.set_page(page);
            format!(
                "<a class=\"btn\" href=\"{}\">{label}</a>",
                escape_html(&screener_href(view, &paged))
            )
        }
        None => "<span></span>".to_string(),
    }
}

/// `/screener` link reproducing `state` for `view`.
pub fn screener_href(view: &ViewSchema, state: &ViewState) -> String {
    let mut pairs = vec![("view".to_string(), view.name.to_string())];
    pairs.extend(state.filters().to_query_pairs());
    if !state.search_query().trim().is_empty() {
        pairs.push(("q".to_string(), state.search_query().trim().to_string()));
    }
    if let Some(SortSpec { key, direction }) = state.sort() {
        pairs.push(("sort".to_string(), key.clone()));
        pairs.push(("dir".to_string(), direction.as_str().to_string()));
    }
    let page = state.page();
    pairs.push(("page".to_string(), page.page_index.to_string()));
    pairs.push(("page_size".to_string(), page.page_size.to_string()));

    let query = pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("/screener?{query}")
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::RawCriterion;
    use crate::pipeline::RowPipeline;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn view_state_reads_pipeline_params_and_filters() {
        let state = view_state_from_query(
            &pairs(&[
                ("view", "valuation"),
                ("pe", "25"),
                ("pe_op", "lt"),
                ("q", " apple "),
                ("sort", "market_cap"),
                ("dir", "desc"),
                ("page", "3"),
                ("page_size", "50"),
            ]),
            DEFAULT_PAGE_SIZE,
        );

        let pe = state.filters().get("pe").unwrap();
        assert_eq!(pe.threshold, "25");
        assert_eq!(pe.operator, Some(Operator::Lt));
        assert_eq!(state.filters().len(), 1);
        assert_eq!(state.search_query(), "apple");
        assert_eq!(
            state.sort(),
            Some(&SortSpec::new("market_cap", Direction::Desc))
        );
        assert_eq!(state.page().page_index, 3);
        assert_eq!(state.page().page_size, 50);
    }

    #[test]
    fn malformed_paging_falls_back() {
        let state = view_state_from_query(
            &pairs(&[("page", "abc"), ("page_size", "-4"), ("dir", "sideways"), ("sort", "pe")]),
            25,
        );
        assert_eq!(state.page().page_index, 1);
        assert_eq!(state.page().page_size, 25);
        assert_eq!(state.sort().map(|s| s.direction), Some(Direction::Asc));

        let defaulted = view_state_from_query(&[], 25);
        assert_eq!(defaulted.page().page_size, 25);
    }

    #[test]
    fn href_round_trips_through_query_parsing() {
        let mut state = ViewState::with_page_size(10);
        state.set_filter("sector", RawCriterion::threshold("Real Estate"));
        state.set_search_query("r&d");
        state.set_sort("price", Direction::Desc);
        state.set_page(2);

        let view = find_view("overview").unwrap();
        let href = screener_href(view, &state);
        assert!(href.starts_with("/screener?view=overview&"));
        assert!(href.contains("sector=Real%20Estate"));
        assert!(href.contains("q=r%26d"));

        let query = href.trim_start_matches("/screener?");
        let decoded: Vec<(String, String)> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| {
                (
                    urlencoding::decode(key).unwrap().into_owned(),
                    urlencoding::decode(value).unwrap().into_owned(),
                )
            })
            .collect();
        assert_eq!(view_state_from_query(&decoded, DEFAULT_PAGE_SIZE), state);
    }

    #[test]
    fn rendered_html_has_table_form_and_escaped_cells() {
        let view = find_view("overview").unwrap();
        let records = vec![
            Record::new()
                .with("ticker", "JNJ")
                .with("company", "Johnson & Johnson")
                .with("price", 151.2),
            Record::new().with("ticker", "XYZ"),
        ];
        let state = ViewState::new();
        let output = RowPipeline::default().run(&records, &state);

        let html = render_screener_html(view, &state, &output);
        assert!(html.contains("<table id=\"screener-table\""));
        assert!(html.contains("filters-form"));
        assert!(html.contains("name=\"pe_op\""));
        assert!(html.contains("Johnson &amp; Johnson"));
        assert!(html.contains("$151.20"));
        assert!(html.contains("Page 1 of 1 · 2 matches"));
        assert!(html.contains("class=\"tab active\" href=\"/screener?view=overview\""));
    }

    #[test]
    fn filter_form_keeps_active_sort() {
        let view = find_view("valuation").unwrap();
        let mut state = ViewState::new();
        let output = RowPipeline::default().run(&[], &state);
        let unsorted = render_screener_html(view, &state, &output);
        assert!(!unsorted.contains("name=\"sort\""));

        state.set_sort("pe", Direction::Desc);
        let html = render_screener_html(view, &state, &output);
        assert!(html.contains("<input type=\"hidden\" name=\"sort\" value=\"pe\">"));
        assert!(html.contains("<input type=\"hidden\" name=\"dir\" value=\"desc\">"));
    }

    #[test]
    fn empty_result_renders_placeholder() {
        let view = find_view("experts").unwrap();
        let state = ViewState::new();
        let output = RowPipeline::new(view.dataset.catalog()).run(&[], &state);

        let html = render_screener_html(view, &state, &output);
        assert!(html.contains("No records match the current filters."));
        assert!(html.contains("Page 1 of 1 · 0 matches"));
    }

    #[test]
    fn portfolio_errors_map_to_statuses() {
        let conflict = ApiError::from(PortfolioError::DuplicateName("Tech".into()));
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(ApiError::from(PortfolioError::NoTickers).status, StatusCode::BAD_REQUEST);
        let io = ApiError::from(PortfolioError::Io {
            path: "p".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk"),
        });
        assert_eq!(io.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
