//! Typed facade over a [`RecordSession`].
//!
//! Every call performs exactly one remote request. A reply carrying a
//! non-empty error list is turned into [`RecordStoreError::RemoteQuery`] or
//! [`RecordStoreError::RemoteUpdate`]; any data returned next to the errors is
//! discarded.

use tracing::{debug, warn};

use super::session::{ReadRequest, RecordSession, RemoteReply, Selection, UpdateTarget};
use super::{FieldFilter, Record, SearchTrigger, UpdatePayload};
use crate::error::RecordStoreError;

/// Record store bound to one trackor type.
#[derive(Debug, Clone)]
pub struct RecordStore<S> {
    session: S,
}

impl<S: RecordSession> RecordStore<S> {
    /// Wrap an open session.
    pub fn new(session: S) -> Self {
        Self { session }
    }

    /// Trackor type of the underlying session.
    pub fn trackor_type(&self) -> &str {
        self.session.trackor_type()
    }

    /// Underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Select trackors whose fields equal every entry of `filter`.
    pub async fn select_by_filter(
        &self,
        filter: &FieldFilter,
        fields: &[String],
    ) -> Result<Vec<Record>, RecordStoreError> {
        let request = ReadRequest {
            fields: fields.to_vec(),
            selection: Selection::Filter(filter.clone()),
        };
        let reply = self.session.read(&request).await?;
        let context = format!("filter read on {}", self.trackor_type());
        self.rows(reply, context)
    }

    /// Select trackors matching a search expression.
    pub async fn select_by_fields_and_search(
        &self,
        fields: &[String],
        search: &SearchTrigger,
    ) -> Result<Vec<Record>, RecordStoreError> {
        let request = ReadRequest {
            fields: fields.to_vec(),
            selection: Selection::Search(search.clone()),
        };
        let reply = self.session.read(&request).await?;
        let context = format!("search '{search}' on {}", self.trackor_type());
        self.rows(reply, context)
    }

    /// Partially update one trackor by id.
    ///
    /// `record_key` labels the error. Returns the record as echoed by the
    /// remote system, or built from the payload when the reply has no body or
    /// an echo that does not parse as a trackor row. The write is committed
    /// either way.
    pub async fn update_fields(
        &self,
        record_key: &str,
        id: i64,
        payload: &UpdatePayload,
    ) -> Result<Record, RecordStoreError> {
        let reply = self.session.update(&UpdateTarget::Id(id), payload).await?;
        if reply.has_errors() {
            warn!(record_key, id, errors = ?reply.errors, "update rejected");
            return Err(RecordStoreError::RemoteUpdate {
                record_key: Some(record_key.to_string()),
                errors: reply.errors,
            });
        }
        let written = || Record {
            id,
            key: record_key.to_string(),
            fields: payload.clone(),
        };
        match &reply.data {
            serde_json::Value::Object(_) => match Record::from_json(&reply.data) {
                Ok(record) => Ok(record),
                Err(err) => {
                    debug!(record_key, id, %err, "update echo is not a trackor row");
                    Ok(written())
                }
            },
            _ => Ok(written()),
        }
    }

    /// Write `payload` to every trackor matching `filter`, typically to reset a
    /// trigger flag in bulk.
    pub async fn clean_trigger_by_filter(
        &self,
        record_key: &str,
        filter: &FieldFilter,
        payload: &UpdatePayload,
    ) -> Result<(), RecordStoreError> {
        let reply = self
            .session
            .update(&UpdateTarget::Filter(filter.clone()), payload)
            .await?;
        if reply.has_errors() {
            warn!(record_key, errors = ?reply.errors, "bulk update rejected");
            return Err(RecordStoreError::RemoteUpdate {
                record_key: Some(record_key.to_string()),
                errors: reply.errors,
            });
        }
        Ok(())
    }

    fn rows(&self, reply: RemoteReply, context: String) -> Result<Vec<Record>, RecordStoreError> {
        if reply.has_errors() {
            warn!(%context, errors = ?reply.errors, "read rejected");
            return Err(RecordStoreError::RemoteQuery {
                context,
                errors: reply.errors,
            });
        }
        let rows = Record::list_from_json(&reply.data)?;
        debug!(%context, count = rows.len(), "rows selected");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::{InMemoryBackend, SessionFactory};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Session that answers every call with the same reply.
    struct CannedSession(Value);

    #[async_trait]
    impl RecordSession for CannedSession {
        fn trackor_type(&self) -> &str {
            "ASSET"
        }

        async fn read(&self, _request: &ReadRequest) -> Result<RemoteReply, RecordStoreError> {
            Ok(RemoteReply::ok(self.0.clone()))
        }

        async fn update(
            &self,
            _target: &UpdateTarget,
            _payload: &UpdatePayload,
        ) -> Result<RemoteReply, RecordStoreError> {
            Ok(RemoteReply::ok(self.0.clone()))
        }
    }

    fn backend() -> InMemoryBackend {
        InMemoryBackend::seeded(
            "ASSET",
            vec![
                Record::new(1, "AST-001").with_field("GEN", "1").with_field("NAME", "Laptop"),
                Record::new(2, "AST-002").with_field("GEN", "0"),
                Record::new(3, "AST-003").with_field("GEN", "1"),
            ],
        )
    }

    fn store(backend: &InMemoryBackend) -> RecordStore<crate::record_store::InMemorySession> {
        RecordStore::new(backend.open_session("ASSET").unwrap())
    }

    fn gen_filter(value: &str) -> FieldFilter {
        let mut filter = FieldFilter::new();
        filter.insert("GEN".into(), value.into());
        filter
    }

    #[tokio::test]
    async fn filter_and_search_agree() {
        let backend = backend();
        let store = store(&backend);
        let fields = vec!["NAME".to_string()];

        let by_filter = store.select_by_filter(&gen_filter("1"), &fields).await.unwrap();
        let by_search = store
            .select_by_fields_and_search(&fields, &SearchTrigger::equal("GEN", "1"))
            .await
            .unwrap();
        assert_eq!(by_filter, by_search);
        assert_eq!(by_filter.len(), 2);
        assert_eq!(by_filter[0].text("NAME"), Some("Laptop"));
        // Unprojected fields are not returned.
        assert_eq!(by_filter[0].field("GEN"), None);
    }

    #[tokio::test]
    async fn remote_read_errors_discard_rows() {
        let backend = backend();
        backend.fail_reads_with(vec!["Unknown field GEN".into()]).await;
        let err = store(&backend)
            .select_by_fields_and_search(&[], &SearchTrigger::equal("GEN", "1"))
            .await
            .unwrap_err();
        match err {
            RecordStoreError::RemoteQuery { context, errors } => {
                assert!(context.contains("ASSET"));
                assert_eq!(errors, vec!["Unknown field GEN".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_fields_returns_echoed_record() {
        let backend = backend();
        let mut payload = UpdatePayload::new();
        payload.insert("GEN".into(), "0".into());
        let updated = store(&backend)
            .update_fields("AST-001", 1, &payload)
            .await
            .unwrap();
        assert_eq!(updated.id, 1);
        assert_eq!(updated.key, "AST-001");
        assert_eq!(updated.text("GEN"), Some("0"));
    }

    #[tokio::test]
    async fn echo_without_trackor_id_falls_back_to_payload() {
        let mut payload = UpdatePayload::new();
        payload.insert("GEN".into(), "0".into());
        let store = RecordStore::new(CannedSession(json!({ "GEN": "0" })));

        let updated = store.update_fields("AST-001", 1, &payload).await.unwrap();
        assert_eq!(updated.id, 1);
        assert_eq!(updated.key, "AST-001");
        assert_eq!(updated.fields, payload);
    }

    #[tokio::test]
    async fn empty_echo_falls_back_to_payload() {
        let mut payload = UpdatePayload::new();
        payload.insert("GEN".into(), "0".into());
        let store = RecordStore::new(CannedSession(Value::Null));

        let updated = store.update_fields("AST-001", 7, &payload).await.unwrap();
        assert_eq!((updated.id, updated.text("GEN")), (7, Some("0")));
    }

    #[tokio::test]
    async fn rejected_update_names_the_record() {
        let backend = backend();
        backend.fail_update_remote(0, vec!["locked".into()]).await;
        let err = store(&backend)
            .update_fields("AST-001", 1, &UpdatePayload::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RecordStoreError::RemoteUpdate {
                record_key: Some("AST-001".into()),
                errors: vec!["locked".into()],
            }
        );
    }

    #[tokio::test]
    async fn clean_trigger_resets_every_match() {
        let backend = backend();
        let mut payload = UpdatePayload::new();
        payload.insert("GEN".into(), "0".into());
        store(&backend)
            .clean_trigger_by_filter("ASSET", &gen_filter("1"), &payload)
            .await
            .unwrap();
        let remaining = store(&backend)
            .select_by_filter(&gen_filter("1"), &[])
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }
}
