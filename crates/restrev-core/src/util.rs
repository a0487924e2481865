//! Small helpers shared by the config, remote and queue modules.

/// Longest response excerpt carried in a [`crate::NetworkError`].
pub const MAX_ERROR_EXCERPT: usize = 180;

/// Trimmed text, or `None` when it is missing or blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Whether `value` is an absolute http(s) URL with a host part.
pub fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .find_map(|scheme| lower.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
}

/// One-line excerpt of a response body for error messages.
pub fn error_excerpt(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_ERROR_EXCERPT)
        .collect()
}

/// Milliseconds since the Unix epoch, the unit every stored timestamp uses.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
