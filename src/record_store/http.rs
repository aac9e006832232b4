//! HTTP session for the trackor REST API (v3).
//!
//! Endpoints used:
//!
//! | Call             | Method | Path                                               |
//! |------------------|--------|----------------------------------------------------|
//! | filter read      | GET    | `/api/v3/trackor_types/{type}/trackors?F=v&fields=` |
//! | search read      | GET    | `/api/v3/trackor_types/{type}/trackors/search?search=&fields=` |
//! | update by id     | PUT    | `/api/v3/trackors/{id}`                            |
//! | update by filter | PUT    | `/api/v3/trackor_types/{type}/trackors?F=v`        |
//!
//! Credentials are sent as `Authorization: Bearer <access_key>:<secret_key>`.
//! A non-2xx status becomes a [`RemoteReply`] with an error list built from the
//! response body; only transport failures are returned as `Err`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use super::session::{ReadRequest, RecordSession, RemoteReply, Selection, SessionFactory, UpdateTarget};
use super::{AccessParameters, FieldFilter, UpdatePayload};
use crate::error::RecordStoreError;

const CONNECT_TIMEOUT: u64 = 5;
const READ_TIMEOUT: u64 = 60;

/// Opens [`HttpSession`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    access: AccessParameters,
    client: Client,
}

impl HttpSessionFactory {
    /// Build the shared HTTP client.
    pub fn new(access: AccessParameters) -> Result<Self, RecordStoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .timeout(Duration::from_secs(READ_TIMEOUT))
            .build()?;
        Ok(Self { access, client })
    }
}

impl SessionFactory for HttpSessionFactory {
    type Session = HttpSession;

    fn open_session(&self, trackor_type: &str) -> Result<HttpSession, RecordStoreError> {
        if self.access.url().is_empty() {
            return Err(RecordStoreError::Transport("no site URL configured".into()));
        }
        Ok(HttpSession {
            client: self.client.clone(),
            base_url: format!("https://{}", self.access.url()),
            trackor_type: trackor_type.to_string(),
            authorization: format!("Bearer {}", self.access.token()),
        })
    }
}

/// Session bound to one trackor type over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    base_url: String,
    trackor_type: String,
    authorization: String,
}

impl HttpSession {
    fn trackors_url(&self) -> String {
        format!(
            "{}/api/v3/trackor_types/{}/trackors",
            self.base_url, self.trackor_type
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::AUTHORIZATION, &self.authorization)
            .header(header::ACCEPT, "application/json")
    }

    /// Request for a read call, not yet sent.
    pub fn read_request(&self, request: &ReadRequest) -> RequestBuilder {
        let mut query: Vec<(String, String)> = Vec::new();
        if !request.fields.is_empty() {
            query.push(("fields".to_string(), request.fields.join(",")));
        }
        let url = match &request.selection {
            Selection::Filter(filter) => {
                query.extend(filter_pairs(filter));
                self.trackors_url()
            }
            Selection::Search(search) => {
                query.push(("search".to_string(), search.to_string()));
                format!("{}/search", self.trackors_url())
            }
        };
        self.authorized(self.client.get(url).query(&query))
    }

    /// Request for an update call, not yet sent.
    pub fn update_request(&self, target: &UpdateTarget, payload: &UpdatePayload) -> RequestBuilder {
        let body = json!({ "fields": payload });
        let builder = match target {
            UpdateTarget::Id(id) => self
                .client
                .put(format!("{}/api/v3/trackors/{id}", self.base_url)),
            UpdateTarget::Filter(filter) => self
                .client
                .put(self.trackors_url())
                .query(&filter_pairs(filter).collect::<Vec<_>>()),
        };
        self.authorized(builder).json(&body)
    }
}

#[async_trait]
impl RecordSession for HttpSession {
    fn trackor_type(&self) -> &str {
        &self.trackor_type
    }

    async fn read(&self, request: &ReadRequest) -> Result<RemoteReply, RecordStoreError> {
        debug!(trackor_type = %self.trackor_type, selection = ?request.selection, "GET trackors");
        let response = self.read_request(request).send().await?;
        reply_from(response).await
    }

    async fn update(
        &self,
        target: &UpdateTarget,
        payload: &UpdatePayload,
    ) -> Result<RemoteReply, RecordStoreError> {
        debug!(
            trackor_type = %self.trackor_type,
            target = ?target,
            fields = ?payload.keys().collect::<Vec<_>>(),
            "PUT trackors"
        );
        let response = self.update_request(target, payload).send().await?;
        reply_from(response).await
    }
}

fn filter_pairs(filter: &FieldFilter) -> impl Iterator<Item = (String, String)> + '_ {
    filter.iter().map(|(k, v)| (k.clone(), v.clone()))
}

async fn reply_from(response: Response) -> Result<RemoteReply, RecordStoreError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Ok(RemoteReply::failed(remote_errors(status.as_u16(), &body)));
    }
    if body.trim().is_empty() {
        return Ok(RemoteReply::ok(Value::Null));
    }
    serde_json::from_str(&body)
        .map(RemoteReply::ok)
        .map_err(|e| RecordStoreError::Decode(format!("invalid JSON body: {e}")))
}

/// Error list for a non-2xx response.
///
/// Uses the `message` of a JSON error object (or of each object in a JSON
/// array) when present, otherwise the raw body.
pub(crate) fn remote_errors(status: u16, body: &str) -> Vec<String> {
    let message_of = |v: &Value| v.get("message").and_then(Value::as_str).map(str::to_string);

    let messages: Vec<String> = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items.iter().filter_map(message_of).collect(),
        Ok(object @ Value::Object(_)) => message_of(&object).into_iter().collect(),
        _ => Vec::new(),
    };

    if !messages.is_empty() {
        return messages
            .into_iter()
            .map(|m| format!("HTTP {status}: {m}"))
            .collect();
    }
    match body.trim() {
        "" => vec![format!("HTTP {status}")],
        text => vec![format!("HTTP {status}: {text}")],
    }
}
