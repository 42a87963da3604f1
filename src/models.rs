/// Core data records shared across the engine
use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// Artwork URL used whenever a track or playlist carries no image of its own.
pub const PLACEHOLDER_ART: &str = "https://placehold.co/300x300.png";

/// A single playable song. Immutable once constructed; every fetch and every
/// now-playing event from the device backend produces a fresh value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    /// Spotify URI, required only for device-based playback. Fallback
    /// playback locates the track by title + artist instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub title: String,
    /// Joined display string ("Artist A, Artist B").
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub album_art: String,
}

/// An ordered collection of tracks. `tracks` empty does not by itself mean
/// "not yet fetched" - the browser tracks in-flight loads separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tracks: Vec<Track>,
    pub tracks_href: String,
    pub cover_art: String,
}

/// Which backend is currently authoritative for playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackSource {
    Spotify,
    Youtube,
}

/// Repeat states the device backend is ever asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    Track,
    Off,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Track => "track",
            RepeatMode::Off => "off",
        }
    }
}

/// Display classification for the volume control icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLevel {
    Muted,
    Low,
    High,
}

/// Canonical playback state owned by the reconciliation core. Mutated only by
/// the core, in response to user commands or adapter events.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub source: PlaybackSource,
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub progress_ms: u64,
    pub duration_ms: u64,
    pub volume: u8,
    pub is_looping: bool,
    pub last_error: Option<PlayerError>,
}

impl PlaybackState {
    pub fn new(volume: u8) -> Self {
        Self {
            source: PlaybackSource::Spotify,
            current_track: None,
            is_playing: false,
            progress_ms: 0,
            duration_ms: 0,
            volume: volume.min(100),
            is_looping: false,
            last_error: None,
        }
    }

    /// Set progress, clamping so `progress_ms <= duration_ms` always holds.
    pub fn set_progress(&mut self, progress_ms: u64) {
        self.progress_ms = progress_ms.min(self.duration_ms);
    }

    /// Icon bucket for the current volume: 0 muted, 1-49 low, 50-100 high.
    pub fn volume_level(&self) -> VolumeLevel {
        match self.volume {
            0 => VolumeLevel::Muted,
            1..=49 => VolumeLevel::Low,
            _ => VolumeLevel::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_clamps_to_duration() {
        let mut state = PlaybackState::new(50);
        state.duration_ms = 180_000;
        state.set_progress(200_000);
        assert_eq!(state.progress_ms, 180_000);
        state.set_progress(90_000);
        assert_eq!(state.progress_ms, 90_000);
    }

    #[test]
    fn volume_level_boundaries() {
        let mut state = PlaybackState::new(0);
        assert_eq!(state.volume_level(), VolumeLevel::Muted);
        state.volume = 1;
        assert_eq!(state.volume_level(), VolumeLevel::Low);
        state.volume = 49;
        assert_eq!(state.volume_level(), VolumeLevel::Low);
        state.volume = 50;
        assert_eq!(state.volume_level(), VolumeLevel::High);
        state.volume = 100;
        assert_eq!(state.volume_level(), VolumeLevel::High);
    }
}
