use chrono::NaiveDate;
use reqwest::blocking::{Client, Response};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Config, Endpoint};
use crate::error::{Result, RollupError};
use crate::retry::RetryPolicy;
use crate::tree;

const CURSOR_KEY: &str = "sort";

/// The three point-in-time calls the pager needs.
pub trait SearchTransport {
    fn name(&self) -> &str;
    fn open_pit(&self, index: &str, keep_alive: &str) -> Result<String>;
    fn search(&self, body: &Value) -> Result<Value>;
    fn close_pit(&self, pit_id: &str) -> Result<()>;
}

pub struct HttpTransport {
    endpoint: Endpoint,
    client: Client,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RollupError::upstream(&endpoint.name, e))?;
        Ok(Self { endpoint, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.url.trim_end_matches('/'), path)
    }

    fn check(&self, response: reqwest::Result<Response>) -> Result<Response> {
        let response = response.map_err(|e| RollupError::upstream(&self.endpoint.name, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        Err(RollupError::upstream_status(
            &self.endpoint.name,
            status.as_u16(),
            format!("status {}: {}", status, snippet),
        ))
    }

    fn json_body(&self, response: Response) -> Result<Value> {
        response
            .json::<Value>()
            .map_err(|e| RollupError::Parse(format!("{}: invalid JSON body: {}", self.endpoint.name, e)))
    }
}

impl SearchTransport for HttpTransport {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn open_pit(&self, index: &str, keep_alive: &str) -> Result<String> {
        let response = self.check(
            self.client
                .post(self.url(&format!("{}/_pit", index)))
                .query(&[("keep_alive", keep_alive)])
                .basic_auth(&self.endpoint.user, Some(&self.endpoint.password))
                .send(),
        )?;
        let body = self.json_body(response)?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RollupError::Parse(format!("{}: PIT response has no id", self.endpoint.name)))
    }

    fn search(&self, body: &Value) -> Result<Value> {
        let response = self.check(
            self.client
                .post(self.url("_search"))
                .basic_auth(&self.endpoint.user, Some(&self.endpoint.password))
                .json(body)
                .send(),
        )?;
        self.json_body(response)
    }

    fn close_pit(&self, pit_id: &str) -> Result<()> {
        self.check(
            self.client
                .delete(self.url("_pit"))
                .basic_auth(&self.endpoint.user, Some(&self.endpoint.password))
                .json(&json!({ "id": pit_id }))
                .send(),
        )?;
        Ok(())
    }
}

/// Inclusive timestamp range sent as the query filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub gte: String,
    pub lte: String,
}

impl TimeWindow {
    /// Midnight of the day before `today` through midnight of `today`.
    pub fn previous_day(today: NaiveDate) -> Self {
        let yesterday = today.pred_opt().unwrap_or(today);
        Self {
            gte: format!("{}T00:00:00", yesterday.format("%Y-%m-%d")),
            lte: format!("{}T00:00:00", today.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub window: TimeWindow,
    pub timestamp_field: String,
    pub page_size: usize,
    pub keep_alive: String,
}

impl SearchQuery {
    pub fn from_config(config: &Config, window: TimeWindow) -> Self {
        Self {
            window,
            timestamp_field: config.timestamp_field.clone(),
            page_size: config.page_size,
            keep_alive: config.keep_alive.clone(),
        }
    }

    pub fn body(&self, pit_id: &str, cursor: Option<&Value>) -> Value {
        let mut range = serde_json::Map::new();
        range.insert(
            self.timestamp_field.clone(),
            json!({
                "format": "strict_date_optional_time",
                "gte": self.window.gte,
                "lte": self.window.lte,
            }),
        );
        let mut sort = serde_json::Map::new();
        sort.insert(
            self.timestamp_field.clone(),
            json!({
                "order": "asc",
                "format": "strict_date_optional_time_nanos",
                "numeric_type": "date_nanos",
            }),
        );

        let mut body = json!({
            "size": self.page_size,
            "query": {
                "bool": {
                    "must": [],
                    "filter": [{ "range": range }],
                    "should": [],
                    "must_not": [],
                }
            },
            "pit": { "id": pit_id, "keep_alive": self.keep_alive },
            "sort": [sort],
        });
        if let Some(cursor) = cursor {
            body["search_after"] = cursor.clone();
        }
        body
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    pub pages: usize,
    pub records: usize,
}

/// A walk that stopped early, with what had already reached the sink.
#[derive(Debug)]
pub struct PagingFailure {
    pub error: RollupError,
    pub report: PageReport,
}

impl std::fmt::Display for PagingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (after {} pages, {} records)",
            self.error, self.report.pages, self.report.records
        )
    }
}

/// Walks every page of a point-in-time search, handing each page's
/// extracted names to a sink.
pub struct CursorPager<'a, T: SearchTransport> {
    pub transport: &'a T,
    pub query: &'a SearchQuery,
    pub retry: &'a RetryPolicy,
    pub index: &'a str,
    pub field: &'a str,
    pub max_depth: usize,
}

impl<'a, T: SearchTransport> CursorPager<'a, T> {
    pub fn run<F>(&self, mut sink: F) -> std::result::Result<PageReport, PagingFailure>
    where
        F: FnMut(Vec<String>) -> Result<()>,
    {
        let start_time = Instant::now();
        let endpoint = self.transport.name();
        info!(action = "start", component = "cursor_pager", endpoint, "Opening point-in-time search");

        let mut report = PageReport::default();
        let mut pit_id = self
            .retry
            .run("open_pit", || self.transport.open_pit(self.index, &self.query.keep_alive))
            .map_err(|error| PagingFailure { error, report })?;

        let outcome = self.walk(&mut pit_id, &mut report, &mut sink);

        if let Err(e) = self.transport.close_pit(&pit_id) {
            warn!(action = "close", component = "cursor_pager", endpoint, error = %e, "Failed to close point-in-time");
        }

        match outcome {
            Ok(()) => {
                info!(
                    action = "complete",
                    component = "cursor_pager",
                    endpoint,
                    pages = report.pages,
                    records = report.records,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Paging completed"
                );
                Ok(report)
            }
            Err(error) => {
                warn!(
                    action = "abort",
                    component = "cursor_pager",
                    endpoint,
                    pages_forwarded = report.pages,
                    records_forwarded = report.records,
                    error = %error,
                    "Paging stopped early"
                );
                Err(PagingFailure { error, report })
            }
        }
    }

    fn walk<F>(&self, pit_id: &mut String, report: &mut PageReport, sink: &mut F) -> Result<()>
    where
        F: FnMut(Vec<String>) -> Result<()>,
    {
        let mut cursor: Option<Value> = None;
        loop {
            let body = self.query.body(pit_id, cursor.as_ref());
            let page = self.retry.run("search", || self.transport.search(&body))?;

            // The service may hand back a refreshed PIT id with every page.
            if let Some(fresh) = page.get("pit_id").and_then(Value::as_str) {
                if fresh != pit_id.as_str() {
                    *pit_id = fresh.to_string();
                }
            }

            let next = match tree::find_last_value(&page, CURSOR_KEY, self.max_depth)? {
                None => None,
                Some(value) if value.is_array() => Some(value.clone()),
                Some(other) => {
                    return Err(RollupError::Parse(format!(
                        "cursor is not an array: {}",
                        other
                    )))
                }
            };
            if next.is_some() && next == cursor {
                warn!(action = "stop", component = "cursor_pager", page = report.pages + 1, "Cursor did not advance, page not forwarded");
                return Ok(());
            }

            let records = tree::collect_strings(&page, self.field, self.max_depth)?;
            let count = records.len();
            debug!(action = "page", component = "cursor_pager", page = report.pages + 1, records = count, "Forwarding page");
            sink(records)?;
            report.pages += 1;
            report.records += count;

            match next {
                None => return Ok(()),
                Some(next) => cursor = Some(next),
            }
        }
    }
}
