//! Document store over a JSON HTTP API.
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET    /{collection}/{id}`              → document, 404 when absent
//! - `PATCH  /{collection}/{id}?merge=true`   → merge-write (`merge=false` replaces)
//! - `POST   /{collection}/{id}/commit`       → `{section, data, baseVersion}` → `{version}`
//!
//! There is no push channel over plain HTTP, so `subscribe` polls the
//! document and forwards it whenever its serialized form changes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::models::{Section, UserDocument};

use super::{DocumentStore, RemoteError, Subscription};

/// How often `subscribe` re-reads the document when not configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    section: Section,
    data: &'a Value,
    #[serde(rename = "baseVersion")]
    base_version: u64,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    version: u64,
}

#[derive(Clone)]
pub struct HttpDocumentStore {
    api: ApiClient,
    poll_interval: Duration,
}

impl HttpDocumentStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Same store, authenticated as a different session.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            api: self.api.with_token(token),
            poll_interval: self.poll_interval,
        }
    }

    fn document_path(collection: &str, id: &str) -> String {
        format!("/{}/{}", collection, id)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<UserDocument>, RemoteError> {
        self.api
            .get_optional(&Self::document_path(collection, id))
            .await
            .map_err(RemoteError::from_http)
    }

    async fn set_document(&self, collection: &str, id: &str, patch: Value, merge: bool) -> Result<(), RemoteError> {
        let path = format!("{}?merge={}", Self::document_path(collection, id), merge);
        self.api.patch(&path, &patch).await.map_err(RemoteError::from_http)
    }

    async fn commit_section(
        &self,
        collection: &str,
        id: &str,
        section: Section,
        data: Value,
        base_version: u64,
    ) -> Result<u64, RemoteError> {
        let path = format!("{}/commit", Self::document_path(collection, id));
        let body = CommitRequest {
            section,
            data: &data,
            base_version,
        };
        let response: CommitResponse = self
            .api
            .post(&path, &body)
            .await
            .map_err(RemoteError::from_http)?;
        Ok(response.version)
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
        sink: mpsc::Sender<UserDocument>,
    ) -> Result<Subscription, RemoteError> {
        let store = self.clone();
        let collection = collection.to_string();
        let id = id.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(store.poll_interval);
            let mut last_seen: Option<String> = None;

            loop {
                interval.tick().await;
                let document = match store.get_document(&collection, &id).await {
                    Ok(Some(doc)) => doc,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(collection = %collection, id = %id, error = %e, "Polling document failed");
                        continue;
                    }
                };

                let fingerprint = match serde_json::to_string(&document) {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                if last_seen.as_deref() == Some(fingerprint.as_str()) {
                    continue;
                }
                last_seen = Some(fingerprint);

                debug!(collection = %collection, id = %id, "Document changed, forwarding");
                if sink.send(document).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::from_task(handle))
    }
}
