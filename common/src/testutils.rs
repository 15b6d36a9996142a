//! In-memory filer used by unit tests.
//!
//! Speaks the same request vocabulary as the HTTP filer: paginated JSON listings with a
//! `LastFileName` cursor, multipart uploads, idempotent directory creation and deletes that
//! answer 500 for missing or non-empty targets. It also counts calls and records the peak number
//! of requests in flight.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::path::RemoteLocation;
use crate::transport::{Request, Response, Transport};

const MTIME: &str = "2024-01-01T00:00:00Z";

#[derive(Default)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Bytes>,
    cursors: Vec<Option<String>>,
}

pub struct MemoryFiler {
    state: Mutex<State>,
    page_size: usize,
    delay: Option<Duration>,
    descending_delay: bool,
    reject_uploads: bool,
    failing_on: Option<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

fn key_of(location: &RemoteLocation) -> String {
    format!("/{}", location.segments().join("/"))
}

fn parent_key(key: &str) -> Option<String> {
    if key == "/" {
        return None;
    }
    let (parent, _) = key.rsplit_once('/')?;
    Some(if parent.is_empty() {
        "/".to_string()
    } else {
        parent.to_string()
    })
}

fn name_of(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

impl State {
    fn add_dir(&mut self, key: &str) {
        let mut current = Some(key.to_string());
        while let Some(key) = current {
            current = parent_key(&key);
            self.dirs.insert(key);
        }
    }

    fn add_file(&mut self, key: &str, data: Bytes) {
        if let Some(parent) = parent_key(key) {
            self.add_dir(&parent);
        }
        self.files.insert(key.to_string(), data);
    }

    fn children(&self, dir: &str) -> Vec<(String, Option<usize>)> {
        let mut children: Vec<(String, Option<usize>)> = self
            .dirs
            .iter()
            .filter(|key| parent_key(key).as_deref() == Some(dir))
            .map(|key| (key.clone(), None))
            .chain(
                self.files
                    .iter()
                    .filter(|(key, _)| parent_key(key).as_deref() == Some(dir))
                    .map(|(key, data)| (key.clone(), Some(data.len()))),
            )
            .collect();
        children.sort_by(|a, b| name_of(&a.0).cmp(name_of(&b.0)));
        children
    }

    fn has_descendants(&self, dir: &str) -> bool {
        !self.children(dir).is_empty()
    }

    fn remove_tree(&mut self, dir: &str) {
        let prefix = format!("{dir}/");
        self.dirs
            .retain(|key| key != dir && !key.starts_with(&prefix));
        self.files.retain(|key, _| !key.starts_with(&prefix));
    }
}

impl Default for MemoryFiler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFiler {
    pub fn new() -> Self {
        let mut state = State::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Mutex::new(state),
            page_size: 1000,
            delay: None,
            descending_delay: false,
            reject_uploads: false,
            failing_on: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Every request sleeps for `delay` while counted as in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Request `n` sleeps for `20 - n` milliseconds, so early requests finish last.
    pub fn with_descending_delay(mut self) -> Self {
        self.descending_delay = true;
        self
    }

    pub fn with_directory(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .add_dir(&key_of(&RemoteLocation::parse(path)));
        self
    }

    pub fn with_file(self, path: &str, data: impl Into<Bytes>) -> Self {
        self.state
            .lock()
            .unwrap()
            .add_file(&key_of(&RemoteLocation::parse(path)), data.into());
        self
    }

    /// Uploads answer 500 and store nothing.
    pub fn rejecting_uploads(mut self) -> Self {
        self.reject_uploads = true;
        self
    }

    /// Requests whose final segment is `name` fail at the transport level.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing_on = Some(name.to_string());
        self
    }

    pub fn file(&self, path: &str) -> Option<Bytes> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&key_of(&RemoteLocation::parse(path)))
            .cloned()
    }

    pub fn has_directory(&self, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .dirs
            .contains(&key_of(&RemoteLocation::parse(path)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// `lastFileName` of every listing request, in arrival order.
    pub fn listing_cursors(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().cursors.clone()
    }

    fn list(&self, key: &str, query: &[(String, String)]) -> Response {
        let mut state = self.state.lock().unwrap();
        let cursor = query
            .iter()
            .find(|(name, _)| name == "lastFileName")
            .map(|(_, value)| value.clone());
        let limit = query
            .iter()
            .find(|(name, _)| name == "limit")
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .map_or(self.page_size, |limit| limit.min(self.page_size));
        state.cursors.push(cursor.clone());
        let page: Vec<(String, Option<usize>)> = state
            .children(key)
            .into_iter()
            .filter(|(child, _)| {
                cursor
                    .as_deref()
                    .is_none_or(|cursor| name_of(child) > cursor)
            })
            .take(limit)
            .collect();
        let last_file_name = page
            .last()
            .map(|(child, _)| name_of(child).to_string())
            .unwrap_or_default();
        let entries: Vec<serde_json::Value> = page
            .iter()
            .map(|(child, size)| match size {
                Some(size) => serde_json::json!({
                    "FullPath": child,
                    "Md5": "1B2M2Y8AsgTpgAmY7PhCfg==",
                    "FileSize": size,
                    "Mtime": MTIME,
                }),
                None => serde_json::json!({
                    "FullPath": child,
                    "Md5": null,
                    "FileSize": 0,
                    "Mtime": MTIME,
                }),
            })
            .collect();
        let entries = if entries.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::Array(entries)
        };
        let body = serde_json::json!({
            "Path": key,
            "Entries": entries,
            "LastFileName": last_file_name,
        });
        Response::new(StatusCode::OK, body.to_string())
    }

    fn handle(&self, request: Request) -> Response {
        let key = key_of(request.location());
        match request {
            Request::Get {
                query, accept_json, ..
            } => {
                let (is_dir, file) = {
                    let state = self.state.lock().unwrap();
                    (state.dirs.contains(&key), state.files.get(&key).cloned())
                };
                if let Some(data) = file {
                    Response::new(StatusCode::OK, data)
                } else if is_dir && accept_json {
                    self.list(&key, &query)
                } else if is_dir {
                    Response::new(StatusCode::OK, "<html></html>")
                } else {
                    Response::empty(StatusCode::NOT_FOUND)
                }
            }
            Request::Upload { payload, .. } => {
                if self.reject_uploads {
                    return Response::empty(StatusCode::INTERNAL_SERVER_ERROR);
                }
                self.state.lock().unwrap().add_file(&key, payload);
                Response::empty(StatusCode::CREATED)
            }
            Request::CreateDirectory { .. } => {
                self.state.lock().unwrap().add_dir(&key);
                Response::empty(StatusCode::CREATED)
            }
            Request::Delete { recursive, .. } => {
                let mut state = self.state.lock().unwrap();
                if state.files.remove(&key).is_some() {
                    return Response::empty(StatusCode::NO_CONTENT);
                }
                if key == "/" || !state.dirs.contains(&key) {
                    return Response::empty(StatusCode::INTERNAL_SERVER_ERROR);
                }
                if state.has_descendants(&key) && !recursive {
                    return Response::empty(StatusCode::INTERNAL_SERVER_ERROR);
                }
                state.remove_tree(&key);
                Response::empty(StatusCode::NO_CONTENT)
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryFiler {
    async fn send(&self, request: Request) -> Result<Response> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(in_flight, Ordering::SeqCst);
        let delay = if self.descending_delay {
            Some(Duration::from_millis(20u64.saturating_sub(call as u64)))
        } else {
            self.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing_on
            .as_deref()
            .is_some_and(|name| request.location().file_name() == Some(name));
        let result = if failing {
            Err(Error::Transport(anyhow::anyhow!(
                "{} {}: connection reset",
                request.method(),
                request.location()
            )))
        } else {
            Ok(self.handle(request))
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Accepts every request with the given status and records nothing.
pub struct AcceptingFiler {
    pub status: StatusCode,
    calls: AtomicUsize,
}

impl AcceptingFiler {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for AcceptingFiler {
    async fn send(&self, _request: Request) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Response::empty(self.status))
    }
}

#[tokio::test]
async fn memory_filer_pages_by_name() {
    let filer = MemoryFiler::new()
        .with_page_size(1)
        .with_file("/d/b", "2")
        .with_file("/d/a", "1");
    let response = filer
        .send(Request::Get {
            location: RemoteLocation::parse("/d/"),
            query: vec![("lastFileName".into(), "a".into())],
            accept_json: true,
        })
        .await
        .unwrap();
    let page: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(page["Entries"][0]["FullPath"], "/d/b");
    assert_eq!(page["LastFileName"], "b");
    assert!(filer.has_directory("/"));
    assert!(filer.has_directory("/d/"));
}
