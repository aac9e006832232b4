//! In-memory record store for tests and dry runs.
//!
//! [`InMemoryBackend`] holds trackors per type and hands out
//! [`InMemorySession`]s that share its state, so a test can seed rows, run the
//! pipeline, then look at what was written. Reads evaluate filters and
//! `equal(...)` searches against field text the same way the remote system
//! compares values.
//!
//! Failures can be injected per call:
//! - `fail_reads_with` makes every read return a remote error list
//! - `fail_update_remote` / `fail_update_transport` make the n-th update call
//!   (0-based, counting every attempt) fail

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::session::{ReadRequest, RecordSession, RemoteReply, Selection, SessionFactory, UpdateTarget};
use super::{FieldFilter, Record, UpdatePayload};
use crate::error::RecordStoreError;

/// An update that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpdate {
    /// Trackor type of the session that sent it
    pub trackor_type: String,
    /// Target rows
    pub target: UpdateTarget,
    /// Fields written
    pub payload: UpdatePayload,
}

#[derive(Debug, Clone)]
enum InjectedFailure {
    Remote(Vec<String>),
    Transport(String),
}

#[derive(Debug, Default)]
struct BackendState {
    trackors: BTreeMap<String, Vec<Record>>,
    applied: Vec<RecordedUpdate>,
    read_errors: Option<Vec<String>>,
    update_failures: BTreeMap<usize, InjectedFailure>,
    update_attempts: usize,
}

/// Shared in-memory trackor storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend holding `records` under `trackor_type`.
    pub fn seeded(trackor_type: &str, records: Vec<Record>) -> Self {
        let mut state = BackendState::default();
        state.trackors.insert(trackor_type.to_string(), records);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add a trackor.
    pub async fn insert(&self, trackor_type: &str, record: Record) {
        self.state
            .lock()
            .await
            .trackors
            .entry(trackor_type.to_string())
            .or_default()
            .push(record);
    }

    /// Make every read report `errors`.
    pub async fn fail_reads_with(&self, errors: Vec<String>) {
        self.state.lock().await.read_errors = Some(errors);
    }

    /// Make update call number `attempt` (0-based) report `errors`.
    pub async fn fail_update_remote(&self, attempt: usize, errors: Vec<String>) {
        self.state
            .lock()
            .await
            .update_failures
            .insert(attempt, InjectedFailure::Remote(errors));
    }

    /// Make update call number `attempt` (0-based) fail in transport.
    pub async fn fail_update_transport(&self, attempt: usize, message: &str) {
        self.state
            .lock()
            .await
            .update_failures
            .insert(attempt, InjectedFailure::Transport(message.to_string()));
    }

    /// Current rows of a trackor type.
    pub async fn records(&self, trackor_type: &str) -> Vec<Record> {
        self.state
            .lock()
            .await
            .trackors
            .get(trackor_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Updates that were applied, in order.
    pub async fn applied_updates(&self) -> Vec<RecordedUpdate> {
        self.state.lock().await.applied.clone()
    }

    /// Number of update calls received, including failed ones.
    pub async fn update_attempts(&self) -> usize {
        self.state.lock().await.update_attempts
    }
}

impl SessionFactory for InMemoryBackend {
    type Session = InMemorySession;

    fn open_session(&self, trackor_type: &str) -> Result<InMemorySession, RecordStoreError> {
        Ok(InMemorySession {
            trackor_type: trackor_type.to_string(),
            state: Arc::clone(&self.state),
        })
    }
}

/// Session over an [`InMemoryBackend`].
#[derive(Debug, Clone)]
pub struct InMemorySession {
    trackor_type: String,
    state: Arc<Mutex<BackendState>>,
}

fn matches_filter(record: &Record, filter: &FieldFilter) -> bool {
    filter
        .iter()
        .all(|(field, value)| record.text(field) == Some(value.as_str()))
}

fn matches_selection(record: &Record, selection: &Selection) -> bool {
    match selection {
        Selection::Filter(filter) => matches_filter(record, filter),
        Selection::Search(search) => record.text(search.field()) == Some(search.value()),
    }
}

fn apply(record: &mut Record, payload: &UpdatePayload) {
    for (name, value) in payload {
        record.fields.insert(name.clone(), value.clone());
    }
}

#[async_trait]
impl RecordSession for InMemorySession {
    fn trackor_type(&self) -> &str {
        &self.trackor_type
    }

    async fn read(&self, request: &ReadRequest) -> Result<RemoteReply, RecordStoreError> {
        let state = self.state.lock().await;
        if let Some(errors) = &state.read_errors {
            return Ok(RemoteReply::failed(errors.clone()));
        }
        let rows: Vec<Value> = state
            .trackors
            .get(&self.trackor_type)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| matches_selection(r, &request.selection))
                    .map(|r| r.project(&request.fields))
                    .collect()
            })
            .unwrap_or_default();
        Ok(RemoteReply::ok(Value::Array(rows)))
    }

    async fn update(
        &self,
        target: &UpdateTarget,
        payload: &UpdatePayload,
    ) -> Result<RemoteReply, RecordStoreError> {
        let mut state = self.state.lock().await;
        let attempt = state.update_attempts;
        state.update_attempts += 1;

        match state.update_failures.get(&attempt).cloned() {
            Some(InjectedFailure::Transport(message)) => {
                return Err(RecordStoreError::Transport(message))
            }
            Some(InjectedFailure::Remote(errors)) => return Ok(RemoteReply::failed(errors)),
            None => {}
        }

        let records = state
            .trackors
            .entry(self.trackor_type.clone())
            .or_default();
        let data = match target {
            UpdateTarget::Id(id) => {
                let Some(record) = records.iter_mut().find(|r| r.id == *id) else {
                    return Ok(RemoteReply::failed(vec![format!(
                        "Trackor with id {id} not found"
                    )]));
                };
                apply(record, payload);
                let written: Vec<String> = payload.keys().cloned().collect();
                record.project(&written)
            }
            UpdateTarget::Filter(filter) => {
                records
                    .iter_mut()
                    .filter(|r| matches_filter(r, filter))
                    .for_each(|r| apply(r, payload));
                Value::Null
            }
        };

        let recorded = RecordedUpdate {
            trackor_type: self.trackor_type.clone(),
            target: target.clone(),
            payload: payload.clone(),
        };
        state.applied.push(recorded);
        Ok(RemoteReply::ok(data))
    }
}
