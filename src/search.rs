use crate::record::Record;

/// Text fields the search box scans, across both stock and expert records.
pub const DEFAULT_SEARCH_FIELDS: [&str; 5] = ["name", "company", "firm", "sector", "ticker"];

/// Case-insensitive substring match over `fields`. An empty or
/// whitespace-only query matches every record.
pub fn is_match<S: AsRef<str>>(record: &Record, query: &str, fields: &[S]) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    fields.iter().any(|field| {
        record
            .text(field.as_ref())
            .map(|value| value.to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}
