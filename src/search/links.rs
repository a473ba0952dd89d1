// Catalog links and search URL state

/// Escape a catalog path for use in an href.
///
/// Only `%` and `#` are escaped. The result is the canonical identifier for
/// a tune: favorites and playback compare hrefs in this form.
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}

/// Canonical href for `item` inside directory `title`.
pub fn href(prefix: &str, title: &str, item: &str) -> String {
    format!("{}{}{}", prefix, escape_path(title), escape_path(item))
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Percent-encode a query-string component, with spaces as `+`.
pub fn encode_query_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for &b in value.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else if b == b' ' {
            out.push('+');
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Page URL query string mirroring the search box, e.g. `?q=purple+motion`.
///
/// An empty box drops the parameter (`?`); a box holding only spaces keeps it
/// empty (`?q=`). Inner runs of spaces each become `+`.
pub fn url_state(query: &str) -> String {
    if query.is_empty() {
        return "?".to_string();
    }
    format!("?q={}", encode_query_component(query.trim()))
}
