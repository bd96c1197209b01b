//! Control-plane sources of event types.

use std::path::Path;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::capability::acquirer::AcquireError;

/// An event type registered in the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventType {
    pub namespace: String,
    pub name: String,
    /// CloudEvents `type` attribute this resource describes.
    pub event_type: String,
}

impl EventType {
    /// Index key, `namespace/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Read-only list access to event types.
pub trait EventTypeSource: Send + Sync {
    fn list(&self) -> BoxFuture<'_, Result<Vec<EventType>, AcquireError>>;
}

#[derive(Deserialize)]
struct EventTypeList {
    #[serde(default)]
    items: Vec<EventTypeItem>,
}

#[derive(Deserialize)]
struct EventTypeItem {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: EventTypeSpec,
}

#[derive(Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Deserialize, Default)]
struct EventTypeSpec {
    #[serde(default, rename = "type")]
    event_type: String,
}

/// Lists event types over HTTP with an optional bearer token.
pub struct HttpEventTypeSource {
    client: reqwest::Client,
    url: url::Url,
    token: Option<String>,
}

impl HttpEventTypeSource {
    pub fn new(
        url: url::Url,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                AcquireError::Failed(format!("failed to build control-plane client: {e}"))
            })?;
        Ok(Self { client, url, token })
    }

    /// Build from an endpoint string and a token file.
    pub fn from_config(
        endpoint: &str,
        token_path: Option<&Path>,
        request_timeout: Duration,
    ) -> Result<Self, AcquireError> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            AcquireError::Failed(format!("invalid control-plane URL {endpoint:?}: {e}"))
        })?;
        let token = match token_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AcquireError::Failed(format!("failed to read token {}: {e}", path.display()))
                })?;
                Some(raw.trim().to_string())
            }
            None => None,
        };
        Self::new(url, token, request_timeout)
    }

    async fn fetch(&self) -> Result<Vec<EventType>, AcquireError> {
        let mut request = self.client.get(self.url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AcquireError::Failed(format!("control-plane request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AcquireError::Permission(format!("{status} from {}", self.url)));
        }
        if !status.is_success() {
            return Err(AcquireError::Failed(format!("{status} from {}", self.url)));
        }

        let list: EventTypeList = response
            .json()
            .await
            .map_err(|e| AcquireError::Failed(format!("malformed event type list: {e}")))?;

        Ok(list
            .items
            .into_iter()
            .map(|item| EventType {
                namespace: item.metadata.namespace,
                name: item.metadata.name,
                event_type: item.spec.event_type,
            })
            .collect())
    }
}

impl EventTypeSource for HttpEventTypeSource {
    fn list(&self) -> BoxFuture<'_, Result<Vec<EventType>, AcquireError>> {
        Box::pin(self.fetch())
    }
}
