// Search box presenter
// Every input change posts a new search. Replies echo the request's `seq`,
// so a slow reply to an old query cannot replace results for a newer one.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::library::Catalog;
use crate::search::grouping::{group_results, ResultGroup};
use crate::search::links::{href, url_state};
use crate::search::protocol::{ResultsPayload, SearchQuery, StatusPayload, WorkerReply, WorkerRequest};
use crate::search::query::{group_query, tokenize};
use crate::search::worker::SearchWorker;
use crate::settings::SearchSettings;

/// One result link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub name: String,
    pub href: String,
}

/// A group heading with its links, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub title: String,
    /// Search text issued when the heading is clicked.
    pub group_query: String,
    pub rows: Vec<ResultRow>,
}

pub struct SearchPresenter<W: SearchWorker> {
    worker: W,
    catalog_prefix: String,
    max_results: usize,
    initial_query: Option<String>,
    catalog_loaded: bool,
    query: Option<String>,
    url: String,
    searching: bool,
    results: Vec<ResultGroup>,
    results_count: usize,
    total_songs: usize,
    /// Sequence number of the latest search posted.
    seq: u64,
}

impl<W: SearchWorker> SearchPresenter<W> {
    pub fn new(worker: W, settings: &SearchSettings, initial_query: Option<String>) -> Self {
        Self {
            worker,
            catalog_prefix: settings.catalog_prefix.clone(),
            max_results: settings.max_results,
            initial_query: initial_query.filter(|q| !q.is_empty()),
            catalog_loaded: false,
            query: None,
            url: String::new(),
            searching: false,
            results: Vec::new(),
            results_count: 0,
            total_songs: 0,
            seq: 0,
        }
    }

    /// Send the catalog to the worker. Only the first call does anything.
    pub fn load_catalog(&mut self, catalog: &Catalog) -> Result<(), SearchError> {
        if self.catalog_loaded {
            return Ok(());
        }
        info!(entries = catalog.len(), "Posting catalog load message to worker");
        self.catalog_loaded = true;
        self.worker.post_message(&WorkerRequest::Load(catalog.to_json()?))
    }

    pub fn is_catalog_loaded(&self) -> bool {
        self.catalog_loaded
    }

    /// The search box changed. Updates the URL state and searches, or shows
    /// the empty state when the box was cleared.
    pub fn on_search_input_change(&mut self, value: &str) -> Result<(), SearchError> {
        self.query = Some(value.to_string());
        self.url = url_state(value);

        if value.is_empty() {
            self.show_empty_state();
            Ok(())
        } else {
            self.do_search(value)
        }
    }

    fn do_search(&mut self, value: &str) -> Result<(), SearchError> {
        self.seq += 1;
        let request = WorkerRequest::Search(SearchQuery {
            query: tokenize(value),
            max_results: self.max_results,
            seq: Some(self.seq),
        });
        debug!(seq = self.seq, "Posting search");
        self.worker.post_message(&request)
    }

    /// Handle one raw message from the worker.
    pub fn handle_message(&mut self, json: &str) -> Result<(), SearchError> {
        match WorkerReply::parse(json)? {
            WorkerReply::Status(status) => self.handle_status(status),
            WorkerReply::Results(results) => {
                self.handle_search_results(results);
                Ok(())
            }
            WorkerReply::Unknown(kind) => {
                warn!(kind = %kind, "Ignoring unknown worker message");
                Ok(())
            }
        }
    }

    fn handle_status(&mut self, status: StatusPayload) -> Result<(), SearchError> {
        self.total_songs = status.num_records;
        if status.num_records > 0 {
            if let Some(initial) = self.initial_query.take() {
                self.on_search_input_change(&initial)?;
            }
        }
        Ok(())
    }

    fn handle_search_results(&mut self, payload: ResultsPayload) {
        if let Some(seq) = payload.seq {
            if seq < self.seq {
                debug!(seq, latest = self.seq, "Discarding stale search reply");
                return;
            }
        }

        let mut files: Vec<String> = payload.results.into_iter().map(|r| r.file).collect();
        files.sort();

        self.searching = true;
        self.results_count = payload.count;
        self.results = group_results(&files);
    }

    /// The clear button. Results already in flight are dropped when they arrive.
    pub fn clear(&mut self) {
        self.query = None;
        self.searching = false;
        self.results_count = 0;
        self.results.clear();
        self.seq += 1;
    }

    fn show_empty_state(&mut self) {
        self.searching = false;
        self.results.clear();
        self.seq += 1;
    }

    /// A group heading was clicked: search for everything in that directory.
    pub fn on_group_click(&mut self, title: &str) -> Result<(), SearchError> {
        self.on_search_input_change(&group_query(title))
    }

    pub fn placeholder(&self) -> String {
        if self.total_songs > 0 {
            format!("{} tunes", self.total_songs)
        } else {
            "Loading catalog...".to_string()
        }
    }

    /// Text shown in the search box. Empty until the catalog is indexed.
    pub fn input_value(&self) -> &str {
        if self.total_songs > 0 {
            self.query.as_deref().unwrap_or("")
        } else {
            ""
        }
    }

    pub fn results_label(&self) -> String {
        let plural = if self.results_count == 1 { "" } else { "s" };
        format!("{} result{}", self.results_count, plural)
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn results(&self) -> &[ResultGroup] {
        &self.results
    }

    pub fn results_count(&self) -> usize {
        self.results_count
    }

    pub fn total_songs(&self) -> usize {
        self.total_songs
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Query string for the page URL, e.g. `?q=purple+motion`.
    pub fn url_state(&self) -> &str {
        &self.url
    }

    /// Grouped results with their canonical hrefs.
    pub fn group_views(&self) -> Vec<GroupView> {
        self.results
            .iter()
            .map(|group| GroupView {
                title: group.title.clone(),
                group_query: group_query(&group.title),
                rows: group
                    .items
                    .iter()
                    .map(|item| ResultRow {
                        name: item.clone(),
                        href: href(&self.catalog_prefix, &group.title, item),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::CatalogEntry;
    use serde_json::{json, Value};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingWorker {
        sent: RefCell<Vec<Value>>,
    }

    impl SearchWorker for RecordingWorker {
        fn post_message(&self, message: &WorkerRequest) -> Result<(), SearchError> {
            self.sent.borrow_mut().push(serde_json::to_value(message)?);
            Ok(())
        }
    }

    fn presenter(initial: Option<&str>) -> SearchPresenter<RecordingWorker> {
        SearchPresenter::new(
            RecordingWorker::default(),
            &SearchSettings::default(),
            initial.map(str::to_string),
        )
    }

    fn results_json(files: &[&str], seq: Option<u64>) -> String {
        let results: Vec<Value> = files.iter().map(|f| json!({ "file": f })).collect();
        let mut payload = json!({ "count": files.len(), "results": results });
        if let Some(seq) = seq {
            payload["seq"] = json!(seq);
        }
        json!({ "type": "results", "payload": payload }).to_string()
    }

    #[test]
    fn test_load_catalog_once() {
        let mut p = presenter(None);
        let catalog = Catalog {
            entries: vec![CatalogEntry { file: "MOD/a.mod".to_string() }],
        };
        p.load_catalog(&catalog).unwrap();
        p.load_catalog(&catalog).unwrap();

        let sent = p.worker().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "load");
        assert_eq!(sent[0]["payload"], r#"[{"file":"MOD/a.mod"}]"#);
        assert!(p.is_catalog_loaded());
    }

    #[test]
    fn test_input_change_posts_search() {
        let mut p = presenter(None);
        p.on_search_input_change(" purple motion ").unwrap();

        let sent = p.worker().sent.borrow();
        assert_eq!(
            sent[0],
            json!({"type": "search", "payload": {"query": ["purple", "motion"], "maxResults": 200, "seq": 1}})
        );
        assert_eq!(p.url_state(), "?q=purple+motion");
    }

    #[test]
    fn test_url_state_keeps_inner_space_runs() {
        let mut p = presenter(None);
        p.on_search_input_change("  purple  motion ").unwrap();

        let sent = p.worker().sent.borrow();
        assert_eq!(sent[0]["payload"]["query"], json!(["purple", "motion"]));
        assert_eq!(p.url_state(), "?q=purple++motion");
    }

    #[test]
    fn test_every_keystroke_searches() {
        let mut p = presenter(None);
        for text in ["p", "pu", "pur"] {
            p.on_search_input_change(text).unwrap();
        }
        assert_eq!(p.worker().sent.borrow().len(), 3);
    }

    #[test]
    fn test_empty_input_shows_empty_state() {
        let mut p = presenter(None);
        p.on_search_input_change("a").unwrap();
        p.handle_message(&results_json(&["A/1"], Some(1))).unwrap();
        assert!(p.is_searching());

        p.on_search_input_change("").unwrap();
        assert!(!p.is_searching());
        assert!(p.results().is_empty());
        assert_eq!(p.worker().sent.borrow().len(), 1);
        assert_eq!(p.url_state(), "?");
    }

    #[test]
    fn test_results_are_sorted_and_grouped() {
        let mut p = presenter(None);
        p.on_search_input_change("x").unwrap();
        p.handle_message(&results_json(&["B/3", "A/2", "A/1"], Some(1))).unwrap();

        assert!(p.is_searching());
        assert_eq!(p.results_count(), 3);
        assert_eq!(p.results_label(), "3 results");
        let groups = p.results();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, "A/");
        assert_eq!(groups[0].items, vec!["1", "2"]);
        assert_eq!(groups[1].title, "B/");
    }

    #[test]
    fn test_stale_reply_is_discarded() {
        let mut p = presenter(None);
        p.on_search_input_change("old").unwrap();
        p.on_search_input_change("new").unwrap();

        p.handle_message(&results_json(&["NEW/x.xm"], Some(2))).unwrap();
        p.handle_message(&results_json(&["OLD/a.xm", "OLD/b.xm"], Some(1))).unwrap();

        assert_eq!(p.results_count(), 1);
        assert_eq!(p.results()[0].title, "NEW/");
    }

    #[test]
    fn test_reply_without_seq_is_accepted() {
        let mut p = presenter(None);
        p.on_search_input_change("x").unwrap();
        p.handle_message(&results_json(&["A/1"], None)).unwrap();
        assert_eq!(p.results_label(), "1 result");
    }

    #[test]
    fn test_reply_after_clear_is_discarded() {
        let mut p = presenter(None);
        p.on_search_input_change("x").unwrap();
        p.clear();
        p.handle_message(&results_json(&["A/1"], Some(1))).unwrap();

        assert!(!p.is_searching());
        assert_eq!(p.query(), None);
        assert_eq!(p.results_count(), 0);
    }

    #[test]
    fn test_unknown_message_is_ignored() {
        let mut p = presenter(None);
        p.handle_message(r#"{"type":"progress","payload":{}}"#).unwrap();
        assert!(!p.is_searching());
        assert_eq!(p.total_songs(), 0);
    }

    #[test]
    fn test_malformed_message_is_an_error() {
        let mut p = presenter(None);
        assert!(matches!(p.handle_message("{"), Err(SearchError::Json(_))));
    }

    #[test]
    fn test_status_updates_placeholder() {
        let mut p = presenter(None);
        assert_eq!(p.placeholder(), "Loading catalog...");
        p.handle_message(r#"{"type":"status","payload":{"numRecords":1234}}"#).unwrap();
        assert_eq!(p.placeholder(), "1234 tunes");
        assert_eq!(p.total_songs(), 1234);
    }

    #[test]
    fn test_initial_query_runs_once_catalog_is_indexed() {
        let mut p = presenter(Some("chip tune"));
        p.handle_message(r#"{"type":"status","payload":{"numRecords":0}}"#).unwrap();
        assert!(p.worker().sent.borrow().is_empty());

        p.handle_message(r#"{"type":"status","payload":{"numRecords":10}}"#).unwrap();
        p.handle_message(r#"{"type":"status","payload":{"numRecords":10}}"#).unwrap();

        let sent = p.worker().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["payload"]["query"], json!(["chip", "tune"]));
        drop(sent);
        assert_eq!(p.input_value(), "chip tune");
    }

    #[test]
    fn test_input_value_hidden_until_indexed() {
        let mut p = presenter(None);
        p.on_search_input_change("abc").unwrap();
        assert_eq!(p.input_value(), "");
        p.handle_message(r#"{"type":"status","payload":{"numRecords":1}}"#).unwrap();
        assert_eq!(p.input_value(), "abc");
    }

    #[test]
    fn test_group_click_searches_heading() {
        let mut p = presenter(None);
        p.on_group_click("MOD/Purple Motion/").unwrap();

        assert_eq!(p.query(), Some("MOD Purple Motion "));
        let sent = p.worker().sent.borrow();
        assert_eq!(sent[0]["payload"]["query"], json!(["MOD", "Purple", "Motion"]));
    }

    #[test]
    fn test_group_views_carry_escaped_hrefs() {
        let mut p = presenter(None);
        p.on_search_input_change("x").unwrap();
        p.handle_message(&results_json(&["XM/Band #1/100%.xm"], Some(1))).unwrap();

        let views = p.group_views();
        assert_eq!(views[0].title, "XM/Band #1/");
        assert_eq!(views[0].group_query, "XM Band 1 ");
        assert_eq!(views[0].rows[0].name, "100%.xm");
        assert_eq!(views[0].rows[0].href, "https://gifx.co/music/XM/Band %231/100%25.xm");
    }
}
