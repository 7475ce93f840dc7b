//! HTTP fetcher for the labeling backend's media endpoint

use crate::error::{MediaError, Result};
use crate::fetch::{FetchedMedia, MediaFetcher, TokenProvider};
use crate::key::ResourceKey;
use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize)]
struct MediaFileRequest<'a> {
    file_path: &'a str,
}

/// Fetches media with `POST {base_url}/media/{scope}/serve`
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_client(Client::new(), base_url, tokens)
    }

    /// Use a preconfigured client (proxies, TLS roots, default headers)
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            tokens,
        }
    }

    /// Endpoint URL for a key's scope, with the scope percent-encoded as one segment
    pub fn endpoint(&self, key: &ResourceKey) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MediaError::Config(format!("invalid base_url {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| MediaError::Config(format!("base_url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["media", key.scope_id(), "serve"]);

        Ok(url)
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, key: &ResourceKey) -> Result<FetchedMedia> {
        let token = self.tokens.token().await.ok_or_else(|| {
            MediaError::Unauthorized(format!("no session token for {}", key.path()))
        })?;

        let url = self.endpoint(key)?;
        debug!(%url, path = key.path(), "Fetching media");

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(token)
            .json(&MediaFileRequest {
                file_path: key.path(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "Media request failed");
            return Err(MediaError::from_status(status.as_u16(), key.path()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await?;

        Ok(FetchedMedia {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
