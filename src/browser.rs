//! Playlist/track browser: the view the user picks tracks from.
//!
//! Tracks are lazy-loaded on first expansion of a playlist. "Already fetched"
//! and "currently fetching" are tracked explicitly - an empty track vector is
//! never treated as the unfetched sentinel, so repeated or overlapping
//! expansions cannot refetch-loop.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::api::SpotifyApi;
use crate::error::PlayerError;
use crate::models::{Playlist, Track};

/// What the browser needs from the backing catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn playlists(&self) -> Result<Vec<Playlist>, PlayerError>;
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, PlayerError>;
    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, PlayerError>;
}

#[async_trait]
impl Catalog for SpotifyApi {
    async fn playlists(&self) -> Result<Vec<Playlist>, PlayerError> {
        SpotifyApi::playlists(self).await
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, PlayerError> {
        SpotifyApi::playlist_tracks(self, playlist_id).await
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, PlayerError> {
        SpotifyApi::search_tracks(self, query).await
    }
}

#[derive(Default)]
struct BrowserState {
    playlists: Vec<Playlist>,
    fetched: HashSet<String>,
}

pub struct PlaylistBrowser {
    catalog: Arc<dyn Catalog>,
    state: Mutex<BrowserState>,
    /// Playlist ids with a track fetch currently in flight.
    loading: Mutex<HashSet<String>>,
}

impl PlaylistBrowser {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            state: Mutex::new(BrowserState::default()),
            loading: Mutex::new(HashSet::new()),
        }
    }

    /// Fetch and cache the playlist list. Tracks stay empty until a playlist
    /// is expanded.
    pub async fn list_playlists(&self) -> Result<Vec<Playlist>, PlayerError> {
        let playlists = self.catalog.playlists().await?;
        let mut state = self.state.lock().await;
        state.playlists = playlists.clone();
        state.fetched.clear();
        Ok(playlists)
    }

    pub async fn playlist(&self, playlist_id: &str) -> Option<Playlist> {
        let state = self.state.lock().await;
        state.playlists.iter().find(|p| p.id == playlist_id).cloned()
    }

    /// Populate a playlist's tracks on first expansion. Idempotent: a second
    /// call for an already-fetched playlist, or one whose fetch is still in
    /// flight, is a no-op.
    pub async fn fetch_tracks(&self, playlist_id: &str) -> Result<(), PlayerError> {
        {
            let state = self.state.lock().await;
            if !state.playlists.iter().any(|p| p.id == playlist_id) {
                return Ok(());
            }
            if state.fetched.contains(playlist_id) {
                return Ok(());
            }
        }

        {
            let mut loading = self.loading.lock().await;
            if !loading.insert(playlist_id.to_string()) {
                tracing::debug!("Track fetch already in flight for {}", playlist_id);
                return Ok(());
            }
        }

        let result = self.catalog.playlist_tracks(playlist_id).await;
        self.loading.lock().await.remove(playlist_id);

        let tracks = result?;
        let mut state = self.state.lock().await;
        if let Some(playlist) = state.playlists.iter_mut().find(|p| p.id == playlist_id) {
            playlist.tracks = tracks;
        }
        state.fetched.insert(playlist_id.to_string());
        Ok(())
    }

    pub async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, PlayerError> {
        self.catalog.search_tracks(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::PLACEHOLDER_ART;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            uri: Some(format!("spotify:track:{}", id)),
            title: format!("Title {}", id),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration_ms: 180_000,
            album_art: PLACEHOLDER_ART.to_string(),
        }
    }

    fn playlist(id: &str) -> Playlist {
        Playlist {
            id: id.to_string(),
            name: format!("Playlist {}", id),
            description: "No description".to_string(),
            tracks: Vec::new(),
            tracks_href: format!("https://api.spotify.com/v1/playlists/{}/tracks", id),
            cover_art: PLACEHOLDER_ART.to_string(),
        }
    }

    struct CountingCatalog {
        track_fetches: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for CountingCatalog {
        async fn playlists(&self) -> Result<Vec<Playlist>, PlayerError> {
            Ok(vec![playlist("pl1"), playlist("pl2")])
        }

        async fn playlist_tracks(&self, _playlist_id: &str) -> Result<Vec<Track>, PlayerError> {
            self.track_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![track("a"), track("b")])
        }

        async fn search_tracks(&self, _query: &str) -> Result<Vec<Track>, PlayerError> {
            Ok(vec![track("s")])
        }
    }

    #[tokio::test]
    async fn repeated_expansion_fetches_once() {
        let catalog = Arc::new(CountingCatalog {
            track_fetches: AtomicUsize::new(0),
        });
        let browser = PlaylistBrowser::new(catalog.clone());

        browser.list_playlists().await.unwrap();
        browser.fetch_tracks("pl1").await.unwrap();
        browser.fetch_tracks("pl1").await.unwrap();
        browser.fetch_tracks("pl1").await.unwrap();

        assert_eq!(catalog.track_fetches.load(Ordering::SeqCst), 1);
        let populated = browser.playlist("pl1").await.unwrap();
        assert_eq!(populated.tracks.len(), 2);
    }

    #[tokio::test]
    async fn unknown_playlist_is_a_noop() {
        let catalog = Arc::new(CountingCatalog {
            track_fetches: AtomicUsize::new(0),
        });
        let browser = PlaylistBrowser::new(catalog.clone());
        browser.list_playlists().await.unwrap();

        browser.fetch_tracks("missing").await.unwrap();
        assert_eq!(catalog.track_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_error_allows_retry() {
        struct FlakyCatalog {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Catalog for FlakyCatalog {
            async fn playlists(&self) -> Result<Vec<Playlist>, PlayerError> {
                Ok(vec![playlist("pl1")])
            }

            async fn playlist_tracks(&self, _id: &str) -> Result<Vec<Track>, PlayerError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(PlayerError::NetworkFetch("boom".to_string()))
                } else {
                    Ok(vec![track("a")])
                }
            }

            async fn search_tracks(&self, _q: &str) -> Result<Vec<Track>, PlayerError> {
                Ok(Vec::new())
            }
        }

        let catalog = Arc::new(FlakyCatalog {
            calls: AtomicUsize::new(0),
        });
        let browser = PlaylistBrowser::new(catalog.clone());
        browser.list_playlists().await.unwrap();

        assert!(browser.fetch_tracks("pl1").await.is_err());
        // The failed fetch must not leave the playlist marked loading.
        browser.fetch_tracks("pl1").await.unwrap();
        assert_eq!(browser.playlist("pl1").await.unwrap().tracks.len(), 1);
    }
}
