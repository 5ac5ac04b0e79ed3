use std::io;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use screener::{
    log_app_bind, log_app_start, log_source_selected, screener_router, DataSourceError,
    FetchedPage, FilterCatalog, InMemorySnapshotSource, LoggingConfig, NewPortfolio,
    PaginationStrategy, PortfolioStore, RowPipeline, ScreenerAppState, ScreenerSession,
    ServerConfig,
};
use tower::util::ServiceExt;
use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    with_default(&dispatch, f);
    writer.output_string()
}

fn server_session() -> ScreenerSession {
    ScreenerSession::new(
        RowPipeline::new(FilterCatalog::stocks()),
        PaginationStrategy::ServerSide,
    )
}

#[test]
fn server_lifecycle_helpers_emit_baseline_events() {
    let logs = capture_logs(Level::INFO, || {
        log_app_start(&LoggingConfig::default(), &ServerConfig::default());
        log_source_selected("demo", Some("SCREENER_USE_DEMO"), (100, 30));
        log_app_bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080));
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"event\":\"source.selected\""));
    assert!(logs.contains("\"stocks\":100"));
    assert!(logs.contains("\"event\":\"app.bind\""));
}

#[test]
fn stale_fetch_is_logged_at_debug_only() {
    let debug_logs = capture_logs(Level::DEBUG, || {
        let mut session = server_session();
        let first = session.begin_fetch();
        let _second = session.begin_fetch();
        session.apply_fetch(first.request_id, Ok(FetchedPage::default()));
    });
    assert!(debug_logs.contains("\"event\":\"session.fetch.stale\""));

    let info_logs = capture_logs(Level::INFO, || {
        let mut session = server_session();
        let first = session.begin_fetch();
        let _second = session.begin_fetch();
        session.apply_fetch(first.request_id, Ok(FetchedPage::default()));
    });
    assert!(!info_logs.contains("session.fetch.stale"));
}

#[test]
fn failed_fetch_emits_error_event() {
    let logs = capture_logs(Level::INFO, || {
        let mut session = server_session();
        let ticket = session.begin_fetch();
        session.apply_fetch(
            ticket.request_id,
            Err(DataSourceError::Transport("connection refused".to_string())),
        );
    });

    assert!(logs.contains("\"event\":\"session.fetch.error\""));
    assert!(logs.contains("connection refused"));
}

#[test]
fn portfolio_save_emits_saved_event() {
    let dir = tempfile::tempdir().unwrap();
    let logs = capture_logs(Level::INFO, || {
        let store = PortfolioStore::new(dir.path().join("portfolios.json"));
        store
            .save(NewPortfolio {
                name: "Dividend core".to_string(),
                tickers: vec!["ko".to_string(), "pg".to_string()],
            })
            .expect("save should succeed");
    });

    assert!(logs.contains("\"event\":\"portfolio.saved\""));
    assert!(logs.contains("Dividend core"));
}

#[test]
fn rows_route_emits_http_rows_event() {
    let dir = tempfile::tempdir().unwrap();
    let logs = capture_logs(Level::INFO, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("single-thread runtime should build");

        rt.block_on(async {
            let source = Arc::new(InMemorySnapshotSource::demo());
            let portfolios = Arc::new(PortfolioStore::new(dir.path().join("portfolios.json")));
            let app = screener_router(ScreenerAppState::new(source, portfolios));

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/screener/rows?view=growth&page_size=5")
                        .body(Body::empty())
                        .expect("request should build"),
                )
                .await
                .expect("rows request should succeed");

            assert_eq!(response.status(), StatusCode::OK);
        });
    });

    assert!(logs.contains("\"event\":\"http.rows.request\""));
    assert!(logs.contains("\"view\":\"growth\""));
    assert!(logs.contains("\"total_count\":100"));
}
