// Directory grouping for search results

use serde::Serialize;

/// One directory's worth of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultGroup {
    /// Directory prefix including the trailing `/`, empty for top-level files.
    pub title: String,
    /// File names within the directory.
    pub items: Vec<String>,
}

/// Split a catalog path into its directory prefix (with trailing `/`) and file name.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    }
}

/// Group paths by directory in a single pass.
///
/// `paths` must already be sorted: a new group starts whenever the prefix
/// differs from the previous path's, so unsorted input yields repeated headings.
pub fn group_results(paths: &[String]) -> Vec<ResultGroup> {
    let mut groups: Vec<ResultGroup> = Vec::new();

    for path in paths {
        let (prefix, name) = split_path(path);
        match groups.last_mut() {
            Some(current) if current.title == prefix => current.items.push(name.to_string()),
            _ => groups.push(ResultGroup {
                title: prefix.to_string(),
                items: vec![name.to_string()],
            }),
        }
    }

    groups
}

/// Heading for each index of a sorted path list: `Some(prefix)` where a new
/// directory starts, `None` elsewhere.
pub fn headings(paths: &[String]) -> Vec<Option<&str>> {
    let mut previous: Option<&str> = None;
    paths
        .iter()
        .map(|path| {
            let (prefix, _) = split_path(path);
            if previous == Some(prefix) {
                None
            } else {
                previous = Some(prefix);
                Some(prefix)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_headings_mark_discontinuities_only() {
        let sorted = paths(&["A/1", "A/2", "B/3"]);
        assert_eq!(headings(&sorted), vec![Some("A/"), None, Some("B/")]);
    }

    #[test]
    fn test_group_results() {
        let sorted = paths(&["MOD/a.mod", "MOD/b.mod", "XM/Artist/c.xm", "top.it"]);
        let groups = group_results(&sorted);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].title, "MOD/");
        assert_eq!(groups[0].items, vec!["a.mod", "b.mod"]);
        assert_eq!(groups[1].title, "XM/Artist/");
        assert_eq!(groups[1].items, vec!["c.xm"]);
        assert_eq!(groups[2].title, "");
        assert_eq!(groups[2].items, vec!["top.it"]);
    }

    #[test]
    fn test_unsorted_input_repeats_groups() {
        let unsorted = paths(&["A/1", "B/2", "A/3"]);
        let groups = group_results(&unsorted);
        assert_eq!(groups.len(), 3);
        assert_eq!(headings(&unsorted), vec![Some("A/"), Some("B/"), Some("A/")]);
    }

    #[test]
    fn test_empty() {
        assert!(group_results(&[]).is_empty());
        assert!(headings(&[]).is_empty());
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a/b/c.xm"), ("a/b/", "c.xm"));
        assert_eq!(split_path("c.xm"), ("", "c.xm"));
        assert_eq!(split_path("dir/"), ("dir/", ""));
    }
}
