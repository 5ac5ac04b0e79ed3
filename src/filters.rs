//! Filter normalization: free-form UI filter values into typed, inert-aware criteria.
//!
//! Rules implemented:
//! - each field resolves its operator as explicit choice first, then the catalog default
//! - numeric thresholds accept `,` separators, a trailing `%` and `k/m/b/t` suffixes
//! - malformed or empty thresholds are inert (dropped), never an error
//! - choice fields treat `all` / `any` as inert
//! - the query codec uses `<field>`, `<field>_op` and `<field>_sort` keys

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::SortSpec;
use crate::record::Record;

/// Query keys owned by the pipeline itself; never interpreted as filters.
pub const RESERVED_QUERY_KEYS: [&str; 6] = ["view", "page", "page_size", "sort", "dir", "q"];

const OPERATOR_SUFFIX: &str = "_op";
const SORT_SUFFIX: &str = "_sort";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Lte,
    Lt,
    Gte,
    Gt,
    Eq,
    Ne,
}

impl Operator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lte" | "<=" | "max" => Some(Self::Lte),
            "lt" | "<" => Some(Self::Lt),
            "gte" | ">=" | "min" => Some(Self::Gte),
            "gt" | ">" => Some(Self::Gt),
            "eq" | "=" | "==" => Some(Self::Eq),
            "ne" | "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lte => "lte",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Gt => "gt",
            Self::Eq => "eq",
            Self::Ne => "ne",
        }
    }

    /// Whether `value <op> threshold` holds, given `value.cmp(threshold)`.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Lte => ordering != Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Gte => ordering != Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Threshold { default_operator: Operator },
    Choice,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn at_most(key: &'static str, label: &'static str) -> FilterField {
    FilterField {
        key,
        label,
        kind: FieldKind::Threshold {
            default_operator: Operator::Lte,
        },
    }
}

const fn at_least(key: &'static str, label: &'static str) -> FilterField {
    FilterField {
        key,
        label,
        kind: FieldKind::Threshold {
            default_operator: Operator::Gte,
        },
    }
}

const fn choice(key: &'static str, label: &'static str) -> FilterField {
    FilterField {
        key,
        label,
        kind: FieldKind::Choice,
    }
}

const fn text(key: &'static str, label: &'static str) -> FilterField {
    FilterField {
        key,
        label,
        kind: FieldKind::Text,
    }
}

pub const STOCK_FILTER_FIELDS: &[FilterField] = &[
    text("ticker", "Ticker"),
    text("company", "Company"),
    choice("sector", "Sector"),
    choice("industry", "Industry"),
    choice("exchange", "Exchange"),
    choice("country", "Country"),
    at_least("market_cap", "Market Cap Min"),
    at_least("price", "Price Min"),
    at_least("change_pct", "Change % Min"),
    at_least("volume", "Volume Min"),
    at_most("pe", "P/E Max"),
    at_most("pb", "P/B Max"),
    at_most("ps", "P/S Max"),
    at_most("peg", "PEG Max"),
    at_least("eps", "EPS Min"),
    at_least("roe", "ROE Min"),
    at_least("roa", "ROA Min"),
    at_most("debt_to_equity", "Debt/Equity Max"),
    at_least("revenue_growth", "Revenue Growth Min"),
    at_least("eps_growth", "EPS Growth Min"),
    at_least("dividend_yield", "Dividend Yield Min"),
    at_most("payout_ratio", "Payout Ratio Max"),
    at_most("beta", "Beta Max"),
    at_least("perf_week", "Perf Week Min"),
    at_least("perf_month", "Perf Month Min"),
    at_least("perf_ytd", "Perf YTD Min"),
];

pub const EXPERT_FILTER_FIELDS: &[FilterField] = &[
    text("name", "Name"),
    text("firm", "Firm"),
    choice("sector", "Sector"),
    at_most("rank", "Rank Max"),
    at_least("success_rate", "Success Rate Min"),
    at_least("avg_return", "Average Return Min"),
    at_least("ratings_count", "Ratings Min"),
    at_least("stars", "Stars Min"),
];

/// Per-dataset field configuration. Fields outside the catalog are numeric
/// thresholds defaulting to `eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterCatalog {
    fields: &'static [FilterField],
}

impl FilterCatalog {
    pub const fn new(fields: &'static [FilterField]) -> Self {
        Self { fields }
    }

    pub const fn stocks() -> Self {
        Self::new(STOCK_FILTER_FIELDS)
    }

    pub const fn experts() -> Self {
        Self::new(EXPERT_FILTER_FIELDS)
    }

    pub fn fields(&self) -> &'static [FilterField] {
        self.fields
    }

    pub fn field(&self, key: &str) -> Option<&'static FilterField> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn kind_of(&self, key: &str) -> FieldKind {
        self.field(key)
            .map(|field| field.kind)
            .unwrap_or(FieldKind::Threshold {
                default_operator: Operator::Eq,
            })
    }
}

impl Default for FilterCatalog {
    fn default() -> Self {
        Self::stocks()
    }
}

/// One filter value as edited through a UI control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCriterion {
    pub threshold: String,
    pub operator: Option<Operator>,
    pub sort_direction: Option<Direction>,
}

impl RawCriterion {
    pub fn threshold(threshold: impl Into<String>) -> Self {
        Self {
            threshold: threshold.into(),
            operator: None,
            sort_direction: None,
        }
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn with_sort(mut self, direction: Direction) -> Self {
        self.sort_direction = Some(direction);
        self
    }
}

/// Field name to raw criterion; at most one per field, last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    criteria: BTreeMap<String, RawCriterion>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, criterion: RawCriterion) {
        self.criteria.insert(field.into(), criterion);
    }

    pub fn with(mut self, field: impl Into<String>, criterion: RawCriterion) -> Self {
        self.insert(field, criterion);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<RawCriterion> {
        self.criteria.remove(field)
    }

    pub fn clear(&mut self) {
        self.criteria.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn get(&self, field: &str) -> Option<&RawCriterion> {
        self.criteria.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawCriterion)> {
        self.criteria
            .iter()
            .map(|(field, criterion)| (field.as_str(), criterion))
    }

    /// Raw pairs in the same shape `from_query_pairs` reads, inert criteria included.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.criteria.len());

        for (field, criterion) in &self.criteria {
            if !criterion.threshold.is_empty() {
                pairs.push((field.clone(), criterion.threshold.clone()));
            }
            if let Some(operator) = criterion.operator {
                pairs.push((format!("{field}{OPERATOR_SUFFIX}"), operator.as_str().to_string()));
            }
            if let Some(direction) = criterion.sort_direction {
                pairs.push((format!("{field}{SORT_SUFFIX}"), direction.as_str().to_string()));
            }
        }

        pairs
    }

    /// Parses `<field>=<threshold>`, `<field>_op=<operator>` and
    /// `<field>_sort=<direction>` pairs. Reserved pipeline keys are skipped and
    /// unparseable operators or directions are ignored.
    pub fn from_query_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::new();

        for (key, value) in pairs {
            if RESERVED_QUERY_KEYS.contains(&key) {
                continue;
            }

            if let Some(field) = key.strip_suffix(OPERATOR_SUFFIX) {
                let entry = set.criteria.entry(field.to_string()).or_default();
                if let Some(operator) = Operator::parse(value) {
                    entry.operator = Some(operator);
                }
            } else if let Some(field) = key.strip_suffix(SORT_SUFFIX) {
                let entry = set.criteria.entry(field.to_string()).or_default();
                if let Some(direction) = Direction::parse(value) {
                    entry.sort_direction = Some(direction);
                }
            } else if !key.is_empty() {
                set.criteria.entry(key.to_string()).or_default().threshold = value.to_string();
            }
        }

        set
    }
}

/// A resolved, non-inert filter condition, typed by field category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    Threshold { value: f64, operator: Operator },
    Choice { value: String, operator: Operator },
    Text { needle: String },
}

impl Criterion {
    /// A record whose field is missing or not coercible never matches.
    pub fn matches(&self, record: &Record, field: &str) -> bool {
        match self {
            Self::Threshold { value, operator } => record
                .number(field)
                .and_then(|actual| actual.partial_cmp(value))
                .map(|ordering| operator.holds(ordering))
                .unwrap_or(false),
            Self::Choice { value, operator } => record
                .text(field)
                .map(|actual| operator.holds(actual.trim().to_lowercase().cmp(value)))
                .unwrap_or(false),
            Self::Text { needle } => record
                .text(field)
                .map(|actual| actual.to_lowercase().contains(needle.as_str()))
                .unwrap_or(false),
        }
    }

    fn query_value(&self) -> String {
        match self {
            Self::Threshold { value, .. } => value.to_string(),
            Self::Choice { value, .. } => value.clone(),
            Self::Text { needle } => needle.clone(),
        }
    }

    fn operator(&self) -> Option<Operator> {
        match self {
            Self::Threshold { operator, .. } | Self::Choice { operator, .. } => Some(*operator),
            Self::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveCriterion {
    pub field: String,
    pub criterion: Criterion,
}

impl ActiveCriterion {
    pub fn matches(&self, record: &Record) -> bool {
        self.criterion.matches(record, &self.field)
    }
}

/// Canonical predicate set: only non-inert criteria survive normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFilters {
    criteria: Vec<ActiveCriterion>,
    sort_hint: Option<SortSpec>,
}

impl NormalizedFilters {
    pub fn criteria(&self) -> &[ActiveCriterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn sort_hint(&self) -> Option<&SortSpec> {
        self.sort_hint.as_ref()
    }

    /// Conjunction over every active criterion; identity when none are active.
    pub fn matches(&self, record: &Record) -> bool {
        self.criteria.iter().all(|active| active.matches(record))
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.criteria.len() * 2 + 1);

        for active in &self.criteria {
            pairs.push((active.field.clone(), active.criterion.query_value()));
            if let Some(operator) = active.criterion.operator() {
                pairs.push((
                    format!("{}{OPERATOR_SUFFIX}", active.field),
                    operator.as_str().to_string(),
                ));
            }
        }

        if let Some(hint) = &self.sort_hint {
            pairs.push((
                format!("{}{SORT_SUFFIX}", hint.key),
                hint.direction.as_str().to_string(),
            ));
        }

        pairs
    }
}

pub fn normalize_filters(set: &FilterSet, catalog: &FilterCatalog) -> NormalizedFilters {
    let mut criteria = Vec::with_capacity(set.len());
    let mut sort_hint = None;

    for (field, raw) in set.iter() {
        if sort_hint.is_none() {
            sort_hint = raw.sort_direction.map(|direction| SortSpec::new(field, direction));
        }

        match resolve_criterion(raw, catalog.kind_of(field)) {
            Some(criterion) => criteria.push(ActiveCriterion {
                field: field.to_string(),
                criterion,
            }),
            None if !raw.threshold.trim().is_empty() => debug!(
                component = "filters",
                event = "filters.inert",
                field,
                threshold = %raw.threshold
            ),
            None => {}
        }
    }

    NormalizedFilters {
        criteria,
        sort_hint,
    }
}

fn resolve_criterion(raw: &RawCriterion, kind: FieldKind) -> Option<Criterion> {
    let trimmed = raw.threshold.trim();
    if trimmed.is_empty() {
        return None;
    }

    match kind {
        FieldKind::Threshold { default_operator } => Some(Criterion::Threshold {
            value: parse_threshold(trimmed)?,
            operator: raw.operator.unwrap_or(default_operator),
        }),
        FieldKind::Choice => {
            let value = trimmed.to_lowercase();
            if value == "all" || value == "any" {
                return None;
            }
            Some(Criterion::Choice {
                value,
                operator: raw.operator.unwrap_or(Operator::Eq),
            })
        }
        FieldKind::Text => Some(Criterion::Text {
            needle: trimmed.to_lowercase(),
        }),
    }
}

/// Parses UI threshold text such as `20`, `1,500`, `12.5%` or `10B`.
pub fn parse_threshold(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.strip_suffix('%').unwrap_or(&cleaned).trim_end();

    let (digits, multiplier) = match cleaned.chars().last()?.to_ascii_lowercase() {
        'k' => (&cleaned[..cleaned.len() - 1], 1e3),
        'm' => (&cleaned[..cleaned.len() - 1], 1e6),
        'b' => (&cleaned[..cleaned.len() - 1], 1e9),
        't' => (&cleaned[..cleaned.len() - 1], 1e12),
        _ => (cleaned, 1.0),
    };

    let value = digits.trim_end().parse::<f64>().ok()? * multiplier;
    value.is_finite().then_some(value)
}
