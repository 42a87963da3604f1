//! Download proxy client. Forwards a resolved video id to a Cobalt-style
//! service and hands back the direct download URL.

use serde::Deserialize;
use serde_json::json;

use crate::error::PlayerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFormat {
    Mp3,
    Mp4,
}

impl DownloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadFormat::Mp3 => "mp3",
            DownloadFormat::Mp4 => "mp4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mp3" => Some(DownloadFormat::Mp3),
            "mp4" => Some(DownloadFormat::Mp4),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CobaltResponse {
    status: Option<String>,
    url: Option<String>,
    text: Option<String>,
}

pub struct DownloadClient {
    http: reqwest::Client,
    base_url: String,
}

impl DownloadClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Request a download link for a video. Only `stream` and `redirect`
    /// statuses carry a usable URL; everything else is a reported error.
    pub async fn request_download(
        &self,
        video_id: &str,
        format: DownloadFormat,
    ) -> Result<String, PlayerError> {
        let video_url = format!("https://www.youtube.com/watch?v={}", video_id);
        let body = json!({
            "url": video_url,
            "aFormat": "mp3",
            "vQuality": "720",
            "isAudioOnly": format == DownloadFormat::Mp3,
            "isNoTTWatermark": true,
        });

        let response = self
            .http
            .post(&self.base_url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: CobaltResponse = response.json().await?;

        if !status.is_success() {
            let detail = parsed.text.unwrap_or_else(|| status.to_string());
            tracing::error!("Download proxy error: {}", detail);
            return Err(PlayerError::NetworkFetch(format!(
                "failed to get download link: {}",
                detail
            )));
        }

        match parsed.status.as_deref() {
            Some("stream") | Some("redirect") => parsed.url.ok_or_else(|| {
                PlayerError::NetworkFetch("download proxy returned no URL".to_string())
            }),
            other => {
                let detail = parsed
                    .text
                    .unwrap_or_else(|| format!("unexpected status {:?}", other));
                Err(PlayerError::NetworkFetch(detail))
            }
        }
    }
}
