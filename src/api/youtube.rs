//! Video-index lookup used by the fallback playback source.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::error::PlayerError;

/// Seam the reconciliation core searches through. A trait so tests can stand
/// in a scripted index.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Resolve a `title artist` query to a video id. "No match" is a
    /// reported, non-fatal `FallbackSearchFailed`.
    async fn search_video(&self, query: &str) -> Result<String, PlayerError>;
}

#[derive(Debug, Deserialize)]
struct VideoSearchResponse {
    #[serde(rename = "videoId")]
    video_id: String,
}

/// HTTP client against the video-search collaborator
/// (`GET <base>?query=` returning `{ "videoId": ... }`, 404 on no match).
pub struct VideoSearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl VideoSearchClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VideoSearch for VideoSearchClient {
    async fn search_video(&self, query: &str) -> Result<String, PlayerError> {
        let url = Url::parse_with_params(&self.base_url, &[("query", query)])
            .map_err(|e| PlayerError::NetworkFetch(e.to_string()))?;

        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PlayerError::FallbackSearchFailed(format!(
                "no video found for \"{}\"",
                query
            )));
        }
        if !response.status().is_success() {
            return Err(PlayerError::FallbackSearchFailed(format!(
                "video search failed: {}",
                response.status()
            )));
        }

        let body: VideoSearchResponse = response.json().await?;
        tracing::debug!("Video search \"{}\" -> {}", query, body.video_id);
        Ok(body.video_id)
    }
}
