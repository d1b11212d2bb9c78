//! Default LIMIT injection for unbounded selects.

use regex::Regex;
use std::sync::OnceLock;

/// Default cap for multi-row selects without an explicit limit.
pub const DEFAULT_LIMIT: u64 = 2000;

/// How many rows the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitMode {
    /// A list select; capped at the configured default.
    Many,
    /// A single-row select; capped at one.
    One,
}

fn limit_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\blimit\b").expect("limit pattern compiles"))
}

fn is_show_statement(sql: &str) -> bool {
    sql.trim_start()
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("show"))
}

/// Append a LIMIT clause unless the statement already bounds itself.
///
/// Statements containing the `limit` keyword anywhere, and `SHOW`
/// statements, come back unchanged. Otherwise trailing whitespace and `;`
/// are stripped before ` LIMIT <cap>` (or ` LIMIT 1`) is appended.
pub fn add_default_limit(sql: &str, mode: LimitMode, cap: u64) -> String {
    if limit_keyword().is_match(sql) || is_show_statement(sql) {
        return sql.to_string();
    }

    let trimmed = sql.trim_end_matches(|c: char| c.is_whitespace() || c == ';');
    match mode {
        LimitMode::One => format!("{trimmed} LIMIT 1"),
        LimitMode::Many => {
            tracing::warn!(
                sql = %trimmed,
                limit = cap,
                "Select without LIMIT; applying default cap"
            );
            format!("{trimmed} LIMIT {cap}")
        }
    }
}
