//! Shared User-Agent string for page and media requests.
//!
//! Collection pages reject non-browser clients, so every request carries a
//! fixed desktop-browser identification header unless overridden.

/// Browser User-Agent sent with every GET and HEAD request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Returns the override when it is non-blank, else [`BROWSER_USER_AGENT`].
#[must_use]
pub fn resolve_user_agent(override_value: Option<&str>) -> String {
    override_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(BROWSER_USER_AGENT)
        .to_string()
}
