//! Session abstraction: one authenticated binding to one trackor type.
//!
//! A session only moves requests and replies. It reports the remote error list
//! as data in [`RemoteReply`] and returns `Err` only for transport failures;
//! deciding that a non-empty error list is fatal is
//! [`RecordStore`](super::RecordStore)'s job.
//!
//! Sessions are opened through a [`SessionFactory`] instead of being mutated
//! in place when the trackor type changes: addressing another type means
//! opening another session.

use async_trait::async_trait;
use serde_json::Value;

use super::{FieldFilter, SearchTrigger, UpdatePayload};
use crate::error::RecordStoreError;

/// How a read selects rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Exact field equality
    Filter(FieldFilter),
    /// Search DSL expression
    Search(SearchTrigger),
}

/// A read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Fields to return besides id and key; empty means the remote default
    pub fields: Vec<String>,
    /// Row selection
    pub selection: Selection,
}

/// Which rows an update touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    /// A single trackor by id
    Id(i64),
    /// Every trackor of the bound type matching the filter
    Filter(FieldFilter),
}

/// Raw result of a remote call: data plus the remote error list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteReply {
    /// Response body (array for reads, object for updates, `Null` when empty)
    pub data: Value,
    /// Errors reported by the remote system; empty on success
    pub errors: Vec<String>,
}

impl RemoteReply {
    /// Successful reply.
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// Reply carrying remote errors.
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            data: Value::Null,
            errors,
        }
    }

    /// Whether the remote system reported any error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Authenticated access to one trackor type.
///
/// # Contract
/// - `Err` means the call did not complete (transport or decoding failure).
/// - `Ok` with a non-empty `errors` list means the remote system rejected it.
/// - No retries: each method performs exactly one remote call.
#[async_trait]
pub trait RecordSession: Send + Sync {
    /// Trackor type this session is bound to.
    fn trackor_type(&self) -> &str;

    /// Read trackors of the bound type.
    async fn read(&self, request: &ReadRequest) -> Result<RemoteReply, RecordStoreError>;

    /// Partially update trackors.
    async fn update(
        &self,
        target: &UpdateTarget,
        payload: &UpdatePayload,
    ) -> Result<RemoteReply, RecordStoreError>;
}

/// Opens sessions bound to a trackor type.
pub trait SessionFactory: Send + Sync {
    /// Session type produced by this factory.
    type Session: RecordSession;

    /// Open a new session for `trackor_type`.
    fn open_session(&self, trackor_type: &str) -> Result<Self::Session, RecordStoreError>;
}
