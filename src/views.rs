//! Screener view catalog: one declarative column schema per view, plus the
//! cell formatters the HTML and JSON surfaces share.

use serde::Serialize;

use crate::record::{FieldValue, Record};
use crate::source::Dataset;

pub const DEFAULT_VIEW: &str = "overview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellFormat {
    Text,
    Ticker,
    Currency,
    Percent,
    /// Large magnitudes with a K/M/B/T suffix.
    Compact,
    Ratio,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub field: &'static str,
    pub header: &'static str,
    pub format: CellFormat,
}

const fn column(field: &'static str, header: &'static str, format: CellFormat) -> Column {
    Column {
        field,
        header,
        format,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewSchema {
    pub name: &'static str,
    pub title: &'static str,
    pub dataset: Dataset,
    pub columns: &'static [Column],
}

const OVERVIEW_COLUMNS: &[Column] = &[
    column("ticker", "Ticker", CellFormat::Ticker),
    column("company", "Company", CellFormat::Text),
    column("sector", "Sector", CellFormat::Text),
    column("industry", "Industry", CellFormat::Text),
    column("country", "Country", CellFormat::Text),
    column("market_cap", "Market Cap", CellFormat::Compact),
    column("pe", "P/E", CellFormat::Ratio),
    column("price", "Price", CellFormat::Currency),
    column("change_pct", "Change", CellFormat::Percent),
    column("volume", "Volume", CellFormat::Compact),
];

const VALUATION_COLUMNS: &[Column] = &[
    column("ticker", "Ticker", CellFormat::Ticker),
    column("market_cap", "Market Cap", CellFormat::Compact),
    column("pe", "P/E", CellFormat::Ratio),
    column("pb", "P/B", CellFormat::Ratio),
    column("ps", "P/S", CellFormat::Ratio),
    column("peg", "PEG", CellFormat::Ratio),
    column("eps", "EPS", CellFormat::Currency),
    column("debt_to_equity", "Debt/Eq", CellFormat::Ratio),
    column("price", "Price", CellFormat::Currency),
];

const GROWTH_COLUMNS: &[Column] = &[
    column("ticker", "Ticker", CellFormat::Ticker),
    column("company", "Company", CellFormat::Text),
    column("revenue_growth", "Revenue Growth", CellFormat::Percent),
    column("eps_growth", "EPS Growth", CellFormat::Percent),
    column("roe", "ROE", CellFormat::Percent),
    column("roa", "ROA", CellFormat::Percent),
    column("price", "Price", CellFormat::Currency),
];

const PERFORMANCE_COLUMNS: &[Column] = &[
    column("ticker", "Ticker", CellFormat::Ticker),
    column("change_pct", "Change", CellFormat::Percent),
    column("perf_week", "Perf Week", CellFormat::Percent),
    column("perf_month", "Perf Month", CellFormat::Percent),
    column("perf_ytd", "Perf YTD", CellFormat::Percent),
    column("beta", "Beta", CellFormat::Ratio),
    column("volume", "Volume", CellFormat::Compact),
    column("price", "Price", CellFormat::Currency),
];

const DIVIDEND_COLUMNS: &[Column] = &[
    column("ticker", "Ticker", CellFormat::Ticker),
    column("company", "Company", CellFormat::Text),
    column("dividend_yield", "Dividend Yield", CellFormat::Percent),
    column("payout_ratio", "Payout Ratio", CellFormat::Percent),
    column("eps", "EPS", CellFormat::Currency),
    column("price", "Price", CellFormat::Currency),
];

const EXPERT_COLUMNS: &[Column] = &[
    column("rank", "Rank", CellFormat::Integer),
    column("name", "Name", CellFormat::Text),
    column("firm", "Firm", CellFormat::Text),
    column("sector", "Sector", CellFormat::Text),
    column("success_rate", "Success Rate", CellFormat::Percent),
    column("avg_return", "Avg Return", CellFormat::Percent),
    column("ratings_count", "Ratings", CellFormat::Integer),
    column("stars", "Stars", CellFormat::Ratio),
];

pub static VIEWS: [ViewSchema; 6] = [
    ViewSchema {
        name: "overview",
        title: "Overview",
        dataset: Dataset::Stocks,
        columns: OVERVIEW_COLUMNS,
    },
    ViewSchema {
        name: "valuation",
        title: "Valuation",
        dataset: Dataset::Stocks,
        columns: VALUATION_COLUMNS,
    },
    ViewSchema {
        name: "growth",
        title: "Growth",
        dataset: Dataset::Stocks,
        columns: GROWTH_COLUMNS,
    },
    ViewSchema {
        name: "performance",
        title: "Performance",
        dataset: Dataset::Stocks,
        columns: PERFORMANCE_COLUMNS,
    },
    ViewSchema {
        name: "dividends",
        title: "Dividends",
        dataset: Dataset::Stocks,
        columns: DIVIDEND_COLUMNS,
    },
    ViewSchema {
        name: "experts",
        title: "Top Experts",
        dataset: Dataset::Experts,
        columns: EXPERT_COLUMNS,
    },
];

impl ViewSchema {
    /// Display strings for every column of `record`, in column order.
    pub fn cells(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| format_cell(record.get(column.field), column.format))
            .collect()
    }
}

/// Case-insensitive lookup; surrounding whitespace is ignored.
pub fn find_view(name: &str) -> Option<&'static ViewSchema> {
    let name = name.trim();
    VIEWS
        .iter()
        .find(|view| view.name.eq_ignore_ascii_case(name))
}

pub fn views_for(dataset: Dataset) -> impl Iterator<Item = &'static ViewSchema> {
    VIEWS.iter().filter(move |view| view.dataset == dataset)
}

pub fn format_cell(value: Option<&FieldValue>, format: CellFormat) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };

    match format {
        CellFormat::Text => display_or_dash(value.as_text().map(|text| text.into_owned())),
        CellFormat::Ticker => display_or_dash(value.as_text().map(|text| text.to_uppercase())),
        CellFormat::Currency => display_or_dash(value.as_number().map(format_currency)),
        CellFormat::Percent => display_or_dash(value.as_number().map(|n| format!("{n:.2}%"))),
        CellFormat::Compact => display_or_dash(value.as_number().map(format_compact)),
        CellFormat::Ratio => display_or_dash(value.as_number().map(|n| format!("{n:.2}"))),
        CellFormat::Integer => display_or_dash(value.as_number().map(|n| format!("{:.0}", n.trunc()))),
    }
}

fn display_or_dash(value: Option<String>) -> String {
    match value {
        Some(text) if !text.trim().is_empty() => text,
        _ => "-".to_string(),
    }
}

fn format_currency(value: f64) -> String {
    if value < 0.0 {
        format!("-${:.2}", value.abs())
    } else {
        format!("${value:.2}")
    }
}

fn format_compact(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

    let magnitude = value.abs();
    for (scale, suffix) in UNITS {
        if magnitude >= scale {
            return format!("{:.2}{suffix}", value / scale);
        }
    }
    format!("{value:.0}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_view_has_unique_name_and_columns() {
        for (idx, view) in VIEWS.iter().enumerate() {
            assert!(!view.columns.is_empty(), "{} has no columns", view.name);
            assert!(VIEWS[idx + 1..].iter().all(|other| other.name != view.name));
        }
        assert_eq!(find_view(DEFAULT_VIEW).map(|v| v.dataset), Some(Dataset::Stocks));
    }

    #[test]
    fn stock_view_columns_are_filterable_or_descriptive() {
        let catalog = Dataset::Stocks.catalog();
        for view in views_for(Dataset::Stocks) {
            for column in view.columns {
                assert!(
                    catalog.field(column.field).is_some(),
                    "{}.{} missing from catalog",
                    view.name,
                    column.field
                );
            }
        }
    }

    #[test]
    fn find_view_ignores_case_and_whitespace() {
        assert_eq!(find_view(" Valuation ").map(|v| v.name), Some("valuation"));
        assert!(find_view("heatmap").is_none());
    }

    #[test]
    fn missing_and_unparseable_values_render_as_dash() {
        assert_eq!(format_cell(None, CellFormat::Currency), "-");
        assert_eq!(format_cell(Some(&FieldValue::Null), CellFormat::Text), "-");
        assert_eq!(
            format_cell(Some(&FieldValue::Text("n/a".into())), CellFormat::Percent),
            "-"
        );
        assert_eq!(format_cell(Some(&FieldValue::Text(" ".into())), CellFormat::Text), "-");
    }

    #[test]
    fn numeric_formats() {
        let n = |v: f64| FieldValue::Number(v);
        assert_eq!(format_cell(Some(&n(187.456)), CellFormat::Currency), "$187.46");
        assert_eq!(format_cell(Some(&n(-3.5)), CellFormat::Currency), "-$3.50");
        assert_eq!(format_cell(Some(&n(-1.234)), CellFormat::Percent), "-1.23%");
        assert_eq!(format_cell(Some(&n(2.87e12)), CellFormat::Compact), "2.87T");
        assert_eq!(format_cell(Some(&n(45_300_000.0)), CellFormat::Compact), "45.30M");
        assert_eq!(format_cell(Some(&n(950.0)), CellFormat::Compact), "950");
        assert_eq!(format_cell(Some(&n(12.0)), CellFormat::Integer), "12");
        assert_eq!(format_cell(Some(&n(0.8)), CellFormat::Ratio), "0.80");
    }

    #[test]
    fn ticker_cells_are_upper_cased() {
        let record = Record::new().with("ticker", "brk.b").with("company", "Berkshire");
        let view = find_view("overview").unwrap();
        let cells = view.cells(&record);
        assert_eq!(cells.len(), view.columns.len());
        assert_eq!(cells[0], "BRK.B");
        assert_eq!(cells[1], "Berkshire");
        assert_eq!(cells[5], "-");
    }
}
