//! Spotify Web API client. Covers exactly the surface the browser and the
//! device adapter consume: playlist listing, lazy track fetches, track
//! search, device discovery, and the Connect transport primitives.
//!
//! Any 401 clears the shared session and surfaces as `SessionExpired`;
//! expiry is never checked proactively.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::error::PlayerError;
use crate::models::{Playlist, RepeatMode, Track, PLACEHOLDER_ART};
use crate::session::Session;

pub struct SpotifyApi {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl SpotifyApi {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, session: Session) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
        }
    }

    async fn bearer(&self) -> Result<String, PlayerError> {
        self.session
            .access_token()
            .await
            .ok_or(PlayerError::SessionExpired)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, PlayerError> {
        let token = self.bearer().await?;
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url).bearer_auth(token);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // Token likely expired; clear the session so the caller falls
            // back to the connect prompt.
            self.session.clear().await;
            return Err(PlayerError::SessionExpired);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Spotify API error {}: {}", status, text);
            return Err(PlayerError::NetworkFetch(format!(
                "Spotify API request failed: {}",
                status
            )));
        }
        Ok(response)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlayerError> {
        let response = self.request(Method::GET, path, query, None).await?;
        Ok(response.json::<T>().await?)
    }

    /// Fire-and-forget transport command. 204/200 both count as success.
    async fn put(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<(), PlayerError> {
        self.request(Method::PUT, path, query, body).await?;
        Ok(())
    }

    async fn post(&self, path: &str, query: &[(&str, String)]) -> Result<(), PlayerError> {
        self.request(Method::POST, path, query, None).await?;
        Ok(())
    }

    /// List the user's playlists. Tracks come back empty; they are fetched
    /// individually on first expansion.
    pub async fn playlists(&self) -> Result<Vec<Playlist>, PlayerError> {
        let page: Paging<ApiPlaylist> = self
            .get_json("/me/playlists", &[("limit", "50".to_string())])
            .await?;
        Ok(page.items.into_iter().map(Playlist::from).collect())
    }

    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, PlayerError> {
        let page: Paging<ApiPlaylistItem> = self
            .get_json(
                &format!("/playlists/{}/tracks", playlist_id),
                &[("limit", "100".to_string())],
            )
            .await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .filter(|t| t.id.is_some())
            .map(Track::from)
            .collect())
    }

    pub async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, PlayerError> {
        let response: SearchResponse = self
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("limit", "20".to_string()),
                ],
            )
            .await?;
        Ok(response
            .tracks
            .items
            .into_iter()
            .filter(|t| t.id.is_some())
            .map(Track::from)
            .collect())
    }

    /// Available Connect devices; the headless front end uses this to find a
    /// device to register with instead of the browser SDK's ready callback.
    pub async fn devices(&self) -> Result<Vec<Device>, PlayerError> {
        let response: DevicesResponse = self.get_json("/me/player/devices", &[]).await?;
        Ok(response.devices)
    }

    /// Start playback with the full ordered context so that next/prev are
    /// served by the device-side queue.
    pub async fn play_with_context(
        &self,
        device_id: &str,
        uris: &[String],
        offset: usize,
    ) -> Result<(), PlayerError> {
        self.put(
            "/me/player/play",
            &[("device_id", device_id.to_string())],
            Some(json!({ "uris": uris, "offset": { "position": offset } })),
        )
        .await
    }

    pub async fn pause(&self, device_id: &str) -> Result<(), PlayerError> {
        self.put("/me/player/pause", &[("device_id", device_id.to_string())], None)
            .await
    }

    pub async fn resume(&self, device_id: &str) -> Result<(), PlayerError> {
        self.put("/me/player/play", &[("device_id", device_id.to_string())], None)
            .await
    }

    pub async fn next(&self, device_id: &str) -> Result<(), PlayerError> {
        self.post("/me/player/next", &[("device_id", device_id.to_string())])
            .await
    }

    pub async fn previous(&self, device_id: &str) -> Result<(), PlayerError> {
        self.post("/me/player/previous", &[("device_id", device_id.to_string())])
            .await
    }

    pub async fn seek(&self, device_id: &str, position_ms: u64) -> Result<(), PlayerError> {
        self.put(
            "/me/player/seek",
            &[
                ("device_id", device_id.to_string()),
                ("position_ms", position_ms.to_string()),
            ],
            None,
        )
        .await
    }

    pub async fn set_volume(&self, device_id: &str, percent: u8) -> Result<(), PlayerError> {
        self.put(
            "/me/player/volume",
            &[
                ("device_id", device_id.to_string()),
                ("volume_percent", percent.min(100).to_string()),
            ],
            None,
        )
        .await
    }

    pub async fn set_repeat(&self, device_id: &str, mode: RepeatMode) -> Result<(), PlayerError> {
        self.put(
            "/me/player/repeat",
            &[
                ("device_id", device_id.to_string()),
                ("state", mode.as_str().to_string()),
            ],
            None,
        )
        .await
    }
}

// Wire shapes, reduced to the fields the engine consumes.

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    description: Option<String>,
    images: Option<Vec<ApiImage>>,
    tracks: ApiTracksRef,
}

#[derive(Debug, Deserialize)]
struct ApiTracksRef {
    href: String,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    uri: Option<String>,
    name: String,
    artists: Vec<ApiArtist>,
    album: ApiAlbum,
    duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    name: String,
    images: Option<Vec<ApiImage>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Paging<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<Device>,
}

/// A Spotify Connect device as reported by the Web API.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
}

fn first_image(images: Option<Vec<ApiImage>>) -> String {
    images
        .and_then(|imgs| imgs.into_iter().next())
        .map(|img| img.url)
        .unwrap_or_else(|| PLACEHOLDER_ART.to_string())
}

impl From<ApiPlaylist> for Playlist {
    fn from(p: ApiPlaylist) -> Self {
        Playlist {
            id: p.id,
            name: p.name,
            description: p
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "No description".to_string()),
            tracks: Vec::new(), // Initially empty
            tracks_href: p.tracks.href,
            cover_art: first_image(p.images),
        }
    }
}

impl From<ApiTrack> for Track {
    fn from(t: ApiTrack) -> Self {
        Track {
            id: t.id.unwrap_or_default(),
            uri: t.uri,
            title: t.name,
            artist: t
                .artists
                .into_iter()
                .map(|a| a.name)
                .collect::<Vec<_>>()
                .join(", "),
            album: t.album.name,
            duration_ms: t.duration_ms,
            album_art: first_image(t.album.images),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_mapping_defaults_description_and_art() {
        let api: ApiPlaylist = serde_json::from_value(serde_json::json!({
            "id": "pl1",
            "name": "Mix",
            "description": "",
            "images": [],
            "tracks": { "href": "https://api.spotify.com/v1/playlists/pl1/tracks" }
        }))
        .unwrap();
        let playlist = Playlist::from(api);
        assert_eq!(playlist.description, "No description");
        assert_eq!(playlist.cover_art, PLACEHOLDER_ART);
        assert!(playlist.tracks.is_empty());
    }

    #[test]
    fn track_mapping_joins_artists() {
        let api: ApiTrack = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "uri": "spotify:track:t1",
            "name": "Song",
            "artists": [{ "name": "A" }, { "name": "B" }],
            "album": { "name": "Album", "images": [{ "url": "https://img/x.png" }] },
            "duration_ms": 200000
        }))
        .unwrap();
        let track = Track::from(api);
        assert_eq!(track.artist, "A, B");
        assert_eq!(track.album_art, "https://img/x.png");
        assert_eq!(track.duration_ms, 200_000);
    }
}
