// HTTP/JSON registry client via reqwest

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use std::time::Duration;
use tracing::{debug, instrument};

use super::TrafficRegistry;
use crate::error::RegistryError;
use crate::models::SnapshotList;

pub struct HttpRegistry {
    client: Client,
    base_url: Url,
}

impl HttpRegistry {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, RegistryError> {
        let base_url = Url::parse(base_url).map_err(|e| RegistryError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::Url(format!("{} cannot be a base url", base_url)));
        }
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Base url with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Non-2xx responses become `RegistryError::Status` carrying the body text.
async fn check_status(response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RegistryError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl TrafficRegistry for HttpRegistry {
    #[instrument(skip(self), fields(registry = "http", operation = "fetch_snapshot"))]
    async fn fetch_snapshot(&self, plugin_id: &str) -> Result<SnapshotList, RegistryError> {
        let url = self.endpoint(&["plugins", plugin_id, "traffic"])?;
        let response = check_status(self.client.get(url).send().await?).await?;
        let list: SnapshotList = response.json().await?;
        debug!(snapshots = list.list.len(), "snapshot fetched");
        Ok(list)
    }

    #[instrument(skip(self), fields(registry = "http", operation = "approve"))]
    async fn approve(&self, plugin_id: &str) -> Result<(), RegistryError> {
        let url = self.endpoint(&["plugins", plugin_id, "approve"])?;
        check_status(self.client.post(url).send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(registry = "http", operation = "cancel"))]
    async fn cancel(&self, package_identifier: &str) -> Result<(), RegistryError> {
        let url = self.endpoint(&["versions", package_identifier, "cancel"])?;
        check_status(self.client.post(url).send().await?).await?;
        Ok(())
    }
}
