// Query text helpers for the search box

use regex::Regex;
use std::sync::OnceLock;

fn non_alphanumeric_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").expect("static regex"))
}

/// Split search text into the worker's query tokens.
///
/// Splits on single spaces only and drops empty tokens.
pub fn tokenize(value: &str) -> Vec<String> {
    value
        .trim()
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Turn a group heading (a directory prefix) into search text, so that
/// clicking a heading searches for everything in that directory.
///
/// # Examples
/// ```
/// use chipsloth_lib::search::query::group_query;
/// assert_eq!(group_query("MOD/Purple Motion/"), "MOD Purple Motion ");
/// ```
pub fn group_query(title: &str) -> String {
    non_alphanumeric_regex().replace_all(title, " ").into_owned()
}
