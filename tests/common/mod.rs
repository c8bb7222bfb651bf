#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use dns_rollup::config::{Config, Endpoint};
use dns_rollup::error::{Result, RollupError};
use dns_rollup::lookup::ReverseLookup;
use dns_rollup::retry::RetryPolicy;
use dns_rollup::search::SearchTransport;
use serde_json::{json, Value};

/// One page of hits; each hit carries an fqdn and a sort cursor.
pub fn page(names: &[&str], first_seq: u64) -> Value {
    let hits: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let seq = first_seq + i as u64;
            json!({
                "_source": {"@timestamp": format!("2023-09-27T00:00:{:02}Z", seq), "dns": {"fqdn": name}},
                "sort": [format!("2023-09-27T00:00:{:02}Z", seq), seq]
            })
        })
        .collect();
    json!({"pit_id": "pit-1", "hits": {"total": {"value": names.len()}, "hits": hits}})
}

pub fn empty_page() -> Value {
    json!({"pit_id": "pit-1", "hits": {"total": {"value": 0}, "hits": []}})
}

/// Serves canned pages in order, then empty pages. `failures` makes the
/// matching search call (1-based) fail that many times before it succeeds.
/// `rejection` makes every PIT open fail with that HTTP status.
pub struct FakeCluster {
    pub name: String,
    pub pages: Vec<Value>,
    pub failures: HashMap<usize, usize>,
    pub rejection: Option<u16>,
    pub open_calls: RefCell<usize>,
    pub requests: RefCell<Vec<Value>>,
    pub closed: RefCell<Vec<String>>,
    served: Cell<usize>,
    failed: RefCell<HashMap<usize, usize>>,
}

impl FakeCluster {
    pub fn new(name: &str, pages: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            pages,
            failures: HashMap::new(),
            rejection: None,
            open_calls: RefCell::new(0),
            requests: RefCell::new(Vec::new()),
            closed: RefCell::new(Vec::new()),
            served: Cell::new(0),
            failed: RefCell::new(HashMap::new()),
        }
    }

    pub fn failing(mut self, call: usize, times: usize) -> Self {
        self.failures.insert(call, times);
        self
    }

    pub fn rejecting(mut self, status: u16) -> Self {
        self.rejection = Some(status);
        self
    }
}

impl SearchTransport for FakeCluster {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_pit(&self, _index: &str, _keep_alive: &str) -> Result<String> {
        *self.open_calls.borrow_mut() += 1;
        if let Some(status) = self.rejection {
            return Err(RollupError::upstream_status(&self.name, status, format!("status {}", status)));
        }
        Ok("pit-1".to_string())
    }

    fn search(&self, body: &Value) -> Result<Value> {
        let call = self.served.get() + 1;
        let allowed = self.failures.get(&call).copied().unwrap_or(0);
        let mut failed = self.failed.borrow_mut();
        let so_far = failed.entry(call).or_insert(0);
        if *so_far < allowed {
            *so_far += 1;
            return Err(RollupError::upstream(&self.name, "status 503 Service Unavailable"));
        }
        self.requests.borrow_mut().push(body.clone());
        self.served.set(call);
        Ok(self.pages.get(call - 1).cloned().unwrap_or_else(empty_page))
    }

    fn close_pit(&self, pit_id: &str) -> Result<()> {
        self.closed.borrow_mut().push(pit_id.to_string());
        Ok(())
    }
}

/// Answers from a fixed table, in `host -t ptr` style.
pub struct StaticResolver(pub HashMap<String, String>);

impl StaticResolver {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(r, f)| (r.to_string(), f.to_string()))
                .collect(),
        )
    }
}

impl ReverseLookup for StaticResolver {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.get(name).cloned())
    }
}

pub fn test_config(work_dir: &Path) -> Config {
    Config {
        endpoints: vec![Endpoint {
            name: "cluster-a".into(),
            url: "http://unused.invalid".into(),
            user: "u".into(),
            password: "p".into(),
        }],
        retry: RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 0,
        },
        work_dir: work_dir.to_path_buf(),
        ..Config::default()
    }
}

pub fn write_reference(work_dir: &Path, content: &str) {
    fs::write(work_dir.join("file_to_match.csv"), content).unwrap();
}

pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    dns_rollup::files::read_rows(path).unwrap()
}

pub fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
