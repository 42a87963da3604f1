//! Playback-source reconciliation core.
//!
//! One transport-agnostic command surface (play/pause/next/prev/seek/volume/
//! loop) over two independently-clocked, independently-erroring backends: a
//! Spotify Connect device and an embedded video player. The core owns the
//! canonical `PlaybackState`, keeps it eventually consistent with whichever
//! backend is authoritative, and reacts to each backend's asynchronous
//! events, including the premium-required error that unlocks the one-way
//! fallback switch.

pub mod adapter;
pub mod spotify_device;
pub mod youtube_embed;

pub use adapter::{
    DeviceAdapter, DeviceErrorKind, DeviceEvent, EmbedAdapter, EmbedEvent, EmbedPlayerState,
};
pub use spotify_device::SpotifyDevice;
pub use youtube_embed::{EmbedCommand, YoutubeEmbed};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::api::VideoSearch;
use crate::error::PlayerError;
use crate::models::{PlaybackSource, PlaybackState, Playlist, RepeatMode, Track};

/// `playbackSource` crossed with adapter readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    /// SDK loading / device registration pending. Playback commands fail
    /// with `DeviceNotReady`.
    SpotifyConnecting,
    /// Device registered; commands delegate to the device adapter.
    SpotifyReady,
    /// The device reported an account-tier error; the only transition out is
    /// the explicit fallback switch.
    PremiumBlocked,
    /// A video lookup for the requested track is in flight.
    YoutubeSearching,
    /// A video is loaded and controllable.
    YoutubeReady,
}

/// Snapshot taken before a fallback search so a failed lookup can leave the
/// prior track in place.
#[derive(Debug, Clone)]
struct SearchRestore {
    track: Option<Track>,
    progress_ms: u64,
    duration_ms: u64,
    is_playing: bool,
}

/// The single owned state record. Mutated only through the methods below so
/// the clamping and generation invariants live in one place.
struct Core {
    playback: PlaybackState,
    phase: PlayerPhase,
    /// Playlist the current track was selected from; the fallback source
    /// serves next/prev from it by circular index arithmetic.
    playlist: Option<Playlist>,
    video_id: Option<String>,
    /// Track id the in-flight fallback search was issued for. A resolution
    /// that no longer matches is discarded.
    pending_search: Option<String>,
    search_restore: Option<SearchRestore>,
    /// Progress-tick generation. Bumped on pause, source switch and track
    /// change so a stale timer callback can never write.
    tick_gen: u64,
}

impl Core {
    fn new(volume: u8) -> Self {
        Self {
            playback: PlaybackState::new(volume),
            phase: PlayerPhase::SpotifyConnecting,
            playlist: None,
            video_id: None,
            pending_search: None,
            search_restore: None,
            tick_gen: 0,
        }
    }

    fn bump_tick(&mut self) {
        self.tick_gen = self.tick_gen.wrapping_add(1);
    }

    fn current_track_id(&self) -> Option<&str> {
        self.playback.current_track.as_ref().map(|t| t.id.as_str())
    }

    fn begin_search(&mut self, track: &Track) {
        self.search_restore = Some(SearchRestore {
            track: self.playback.current_track.clone(),
            progress_ms: self.playback.progress_ms,
            duration_ms: self.playback.duration_ms,
            is_playing: self.playback.is_playing,
        });
        self.playback.current_track = Some(track.clone());
        self.playback.duration_ms = track.duration_ms;
        self.playback.progress_ms = 0;
        self.playback.is_playing = false;
        self.phase = PlayerPhase::YoutubeSearching;
        self.pending_search = Some(track.id.clone());
        self.bump_tick();
    }

    fn search_matches(&self, track_id: &str) -> bool {
        self.pending_search.as_deref() == Some(track_id)
            && self.current_track_id() == Some(track_id)
    }

    fn restore_after_failed_search(&mut self) {
        if let Some(restore) = self.search_restore.take() {
            self.playback.current_track = restore.track;
            self.playback.duration_ms = restore.duration_ms;
            self.playback.progress_ms = restore.progress_ms.min(restore.duration_ms);
            self.playback.is_playing = restore.is_playing;
        }
        self.pending_search = None;
    }
}

pub struct Player {
    device: Arc<dyn DeviceAdapter>,
    embed: Arc<dyn EmbedAdapter>,
    search: Arc<dyn VideoSearch>,
    core: Mutex<Core>,
}

impl Player {
    pub fn new(
        device: Arc<dyn DeviceAdapter>,
        embed: Arc<dyn EmbedAdapter>,
        search: Arc<dyn VideoSearch>,
        initial_volume: u8,
    ) -> Self {
        Self {
            device,
            embed,
            search,
            core: Mutex::new(Core::new(initial_volume)),
        }
    }

    /// Canonical state for the view layer.
    pub async fn snapshot(&self) -> PlaybackState {
        self.core.lock().await.playback.clone()
    }

    pub async fn phase(&self) -> PlayerPhase {
        self.core.lock().await.phase
    }

    pub async fn source(&self) -> PlaybackSource {
        self.core.lock().await.playback.source
    }

    /// Whether the "fallback to YouTube" affordance should be shown.
    pub async fn fallback_available(&self) -> bool {
        self.core.lock().await.phase == PlayerPhase::PremiumBlocked
    }

    /// Video id of the currently loaded fallback video, if any. The download
    /// flow hangs off this.
    pub async fn current_video_id(&self) -> Option<String> {
        self.core.lock().await.video_id.clone()
    }

    async fn report(&self, err: PlayerError) -> PlayerError {
        tracing::error!("Playback error: {}", err);
        self.core.lock().await.playback.last_error = Some(err.clone());
        err
    }

    /// Select a track out of a playlist. Re-selecting the canonical current
    /// track toggles play/pause; anything else becomes current and starts
    /// playing on the active source.
    pub async fn select_track(
        &self,
        playlist: &Playlist,
        index: usize,
    ) -> Result<(), PlayerError> {
        let Some(track) = playlist.tracks.get(index).cloned() else {
            tracing::warn!("Track index {} out of range for {}", index, playlist.id);
            return Ok(());
        };

        let source = {
            let mut core = self.core.lock().await;
            core.playlist = Some(playlist.clone());
            if core.current_track_id() == Some(track.id.as_str()) {
                drop(core);
                return self.toggle_play().await;
            }
            core.playback.source
        };

        match source {
            PlaybackSource::Spotify => self.play_on_device(&track, playlist).await,
            PlaybackSource::Youtube => self.play_via_fallback(track).await,
        }
    }

    /// Device playback carries the full ordered URI context plus a start
    /// offset so next/prev ride the device-side queue.
    async fn play_on_device(&self, track: &Track, playlist: &Playlist) -> Result<(), PlayerError> {
        {
            let core = self.core.lock().await;
            if core.phase == PlayerPhase::SpotifyConnecting {
                drop(core);
                return Err(self.report(PlayerError::DeviceNotReady).await);
            }
        }

        if track.uri.is_none() {
            let err = PlayerError::DeviceInitialization(format!(
                "track \"{}\" has no playable URI",
                track.title
            ));
            return Err(self.report(err).await);
        }

        let uris: Vec<String> = playlist
            .tracks
            .iter()
            .filter_map(|t| t.uri.clone())
            .collect();
        let offset = playlist
            .tracks
            .iter()
            .filter(|t| t.uri.is_some())
            .position(|t| t.id == track.id)
            .unwrap_or(0);

        if let Err(e) = self.device.play_context(&uris, offset).await {
            return Err(self.report(e).await);
        }

        let mut core = self.core.lock().await;
        core.playback.current_track = Some(track.clone());
        core.playback.duration_ms = track.duration_ms;
        core.playback.progress_ms = 0;
        core.playback.is_playing = true;
        core.playback.last_error = None;
        core.bump_tick();
        Ok(())
    }

    /// Fallback playback: resolve the track to a video by title + artist,
    /// then load the first hit. The state lock is not held across the lookup,
    /// so a newer selection can supersede it; the result is re-checked
    /// against the current selection before it is applied.
    async fn play_via_fallback(&self, track: Track) -> Result<(), PlayerError> {
        let query = format!("{} {}", track.title, track.artist);
        {
            let mut core = self.core.lock().await;
            core.begin_search(&track);
        }

        tracing::info!("Searching fallback video for \"{}\"", query);
        let result = self.search.search_video(&query).await;
        self.resolve_fallback_search(&track.id, result).await
    }

    async fn resolve_fallback_search(
        &self,
        track_id: &str,
        result: Result<String, PlayerError>,
    ) -> Result<(), PlayerError> {
        let video_id = {
            let mut core = self.core.lock().await;
            if !core.search_matches(track_id) {
                tracing::debug!("Discarding stale video search for track {}", track_id);
                return Ok(());
            }
            core.pending_search = None;
            match result {
                Ok(video_id) => {
                    core.search_restore = None;
                    core.video_id = Some(video_id.clone());
                    video_id
                }
                Err(e) => {
                    // No match: report and leave the prior track in place.
                    core.restore_after_failed_search();
                    core.playback.last_error = Some(e.clone());
                    tracing::error!("Fallback search failed: {}", e);
                    return Err(e);
                }
            }
        };

        if let Err(e) = self.embed.load_video(&video_id).await {
            return Err(self.report(e).await);
        }

        let mut core = self.core.lock().await;
        // A selection racing the load wins; only apply if still current.
        if core.current_track_id() == Some(track_id)
            && core.video_id.as_deref() == Some(video_id.as_str())
        {
            core.phase = PlayerPhase::YoutubeReady;
            core.playback.is_playing = true;
            core.playback.last_error = None;
            core.bump_tick();
        }
        Ok(())
    }

    pub async fn toggle_play(&self) -> Result<(), PlayerError> {
        let (source, was_playing) = {
            let core = self.core.lock().await;
            (core.playback.source, core.playback.is_playing)
        };

        let result = match (source, was_playing) {
            (PlaybackSource::Spotify, true) => self.device.pause().await,
            (PlaybackSource::Spotify, false) => self.device.resume().await,
            (PlaybackSource::Youtube, true) => self.embed.pause().await,
            (PlaybackSource::Youtube, false) => self.embed.play().await,
        };
        if let Err(e) = result {
            return Err(self.report(e).await);
        }

        let mut core = self.core.lock().await;
        core.playback.is_playing = !was_playing;
        core.bump_tick();
        Ok(())
    }

    /// Advance to the next track. The device serves this from its own queue;
    /// the fallback source has no queue concept, so the index wraps
    /// circularly over the selected playlist.
    pub async fn next(&self) -> Result<(), PlayerError> {
        match self.source().await {
            PlaybackSource::Spotify => {
                if let Err(e) = self.device.next().await {
                    return Err(self.report(e).await);
                }
                Ok(())
            }
            PlaybackSource::Youtube => self.step_fallback(1).await,
        }
    }

    pub async fn prev(&self) -> Result<(), PlayerError> {
        match self.source().await {
            PlaybackSource::Spotify => {
                if let Err(e) = self.device.previous().await {
                    return Err(self.report(e).await);
                }
                Ok(())
            }
            PlaybackSource::Youtube => self.step_fallback(-1).await,
        }
    }

    async fn step_fallback(&self, direction: i64) -> Result<(), PlayerError> {
        let next_track = {
            let core = self.core.lock().await;
            let Some(playlist) = core.playlist.as_ref() else {
                return Ok(());
            };
            let len = playlist.tracks.len();
            if len == 0 {
                return Ok(());
            }
            let Some(current_id) = core.current_track_id() else {
                return Ok(());
            };
            let Some(index) = playlist.tracks.iter().position(|t| t.id == current_id) else {
                return Ok(());
            };
            let next = (index as i64 + direction).rem_euclid(len as i64) as usize;
            playlist.tracks[next].clone()
        };
        self.play_via_fallback(next_track).await
    }

    /// Seek, clamped to `[0, duration]`.
    pub async fn seek(&self, position_ms: u64) -> Result<(), PlayerError> {
        let (source, clamped) = {
            let mut core = self.core.lock().await;
            let clamped = position_ms.min(core.playback.duration_ms);
            core.playback.set_progress(clamped);
            (core.playback.source, clamped)
        };

        let result = match source {
            PlaybackSource::Spotify => self.device.seek(clamped).await,
            PlaybackSource::Youtube => self.embed.seek(clamped).await,
        };
        if let Err(e) = result {
            return Err(self.report(e).await);
        }
        Ok(())
    }

    /// Volume is stored optimistically; the adapter call is fire-and-forget.
    pub async fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        let source = {
            let mut core = self.core.lock().await;
            core.playback.volume = volume;
            core.playback.source
        };

        let result = match source {
            PlaybackSource::Spotify => self.device.set_volume(volume).await,
            PlaybackSource::Youtube => self.embed.set_volume(volume).await,
        };
        if let Err(e) = result {
            tracing::warn!("Failed to apply volume: {}", e);
        }
    }

    /// Flip looping. The device backend is additionally told the repeat mode;
    /// the fallback backend loops locally when playback ends.
    pub async fn toggle_loop(&self) -> Result<(), PlayerError> {
        let (source, looping) = {
            let mut core = self.core.lock().await;
            core.playback.is_looping = !core.playback.is_looping;
            (core.playback.source, core.playback.is_looping)
        };

        if source == PlaybackSource::Spotify {
            let mode = if looping {
                RepeatMode::Track
            } else {
                RepeatMode::Off
            };
            if let Err(e) = self.device.set_repeat(mode).await {
                return Err(self.report(e).await);
            }
        }
        Ok(())
    }

    /// One-way switch to the fallback source. Re-searches the current track
    /// if there is one; there is no automatic return to Spotify within a
    /// track selection.
    pub async fn switch_to_fallback(&self) -> Result<(), PlayerError> {
        let current = {
            let mut core = self.core.lock().await;
            if core.playback.source == PlaybackSource::Youtube {
                return Ok(());
            }
            tracing::info!("Switching playback source to YouTube fallback");
            core.playback.source = PlaybackSource::Youtube;
            core.phase = PlayerPhase::YoutubeSearching;
            core.playback.is_playing = false;
            core.bump_tick();
            core.playback.current_track.clone()
        };

        match current {
            Some(track) => self.play_via_fallback(track).await,
            None => Ok(()),
        }
    }

    /// Ingest an asynchronous event from the device backend.
    pub async fn handle_device_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Ready { device_id } => {
                self.device.set_device(Some(device_id)).await;
                let mut core = self.core.lock().await;
                if core.phase == PlayerPhase::SpotifyConnecting {
                    core.phase = PlayerPhase::SpotifyReady;
                }
            }
            DeviceEvent::NotReady { device_id } => {
                tracing::warn!("Device {} has gone offline", device_id);
                self.device.set_device(None).await;
                let mut core = self.core.lock().await;
                if core.phase == PlayerPhase::SpotifyReady {
                    core.phase = PlayerPhase::SpotifyConnecting;
                }
            }
            DeviceEvent::StateChanged {
                position_ms,
                duration_ms,
                paused,
                track,
                repeat_mode,
            } => {
                let mut core = self.core.lock().await;
                if core.playback.source != PlaybackSource::Spotify {
                    // The device may keep emitting after the fallback switch.
                    return;
                }
                core.playback.duration_ms = duration_ms;
                core.playback.set_progress(position_ms);
                core.playback.is_playing = !paused;
                core.playback.is_looping = repeat_mode == RepeatMode::Track;
                if let Some(track) = track {
                    core.playback.current_track = Some(track);
                }
                core.bump_tick();
            }
            DeviceEvent::Error { kind, message } => {
                let err = match kind {
                    DeviceErrorKind::Initialization => PlayerError::DeviceInitialization(message),
                    DeviceErrorKind::Authentication => PlayerError::DeviceAuthentication(message),
                    DeviceErrorKind::Account => PlayerError::PremiumRequired,
                };
                tracing::error!("Device error: {}", err);
                let mut core = self.core.lock().await;
                core.playback.last_error = Some(err.clone());
                // The account error unlocks the fallback affordance but does
                // not switch the source by itself.
                if err.is_premium_required() && core.playback.source == PlaybackSource::Spotify {
                    core.phase = PlayerPhase::PremiumBlocked;
                }
            }
        }
    }

    /// Ingest an asynchronous event from the embedded player.
    pub async fn handle_embed_event(&self, event: EmbedEvent) {
        match event {
            EmbedEvent::Ready => {
                // Apply the volume chosen before the player came up.
                let volume = {
                    let mut core = self.core.lock().await;
                    if core.playback.source == PlaybackSource::Youtube
                        && core.video_id.is_some()
                    {
                        core.phase = PlayerPhase::YoutubeReady;
                    }
                    core.playback.volume
                };
                if let Err(e) = self.embed.set_volume(volume).await {
                    tracing::warn!("Failed to apply pending volume: {}", e);
                }
            }
            EmbedEvent::StateChanged {
                state,
                position_ms,
                duration_ms,
            } => {
                {
                    let mut core = self.core.lock().await;
                    if core.playback.source != PlaybackSource::Youtube {
                        return;
                    }
                    match state {
                        EmbedPlayerState::Playing => {
                            core.playback.is_playing = true;
                            if duration_ms > 0 {
                                core.playback.duration_ms = duration_ms;
                            }
                            core.playback.set_progress(position_ms);
                        }
                        EmbedPlayerState::Paused
                        | EmbedPlayerState::Buffering
                        | EmbedPlayerState::Unstarted
                        | EmbedPlayerState::Cued
                        | EmbedPlayerState::Ended => {
                            core.playback.is_playing = false;
                            core.bump_tick();
                        }
                    }
                }

                if state == EmbedPlayerState::Ended {
                    self.on_embed_ended().await;
                }
            }
        }
    }

    /// End-of-media rule for the fallback source: loop in place when looping,
    /// otherwise advance through the playlist.
    async fn on_embed_ended(&self) {
        let looping = self.core.lock().await.playback.is_looping;
        if looping {
            if let Err(e) = self.embed.seek(0).await {
                tracing::warn!("Loop seek failed: {}", e);
                return;
            }
            if let Err(e) = self.embed.play().await {
                tracing::warn!("Loop resume failed: {}", e);
                return;
            }
            let mut core = self.core.lock().await;
            core.playback.progress_ms = 0;
            core.playback.is_playing = true;
            core.bump_tick();
        } else if let Err(e) = self.next().await {
            tracing::warn!("Auto-advance failed: {}", e);
        }
    }

    /// Current tick generation. A tick armed with it is ignored once the
    /// generation moves on.
    pub async fn tick_token(&self) -> u64 {
        self.core.lock().await.tick_gen
    }

    /// One progress-clock beat. Advances the canonical progress by a second
    /// for the device source (which does not push continuous positions) and
    /// applies the embedded player's native clock for the fallback source.
    /// Stale generations are no-ops.
    pub async fn tick(&self, token: u64) -> Result<(), PlayerError> {
        let source = {
            let mut core = self.core.lock().await;
            if core.tick_gen != token || !core.playback.is_playing {
                return Ok(());
            }
            if core.playback.source == PlaybackSource::Spotify {
                let advanced = core.playback.progress_ms.saturating_add(1000);
                core.playback.set_progress(advanced);
                return Ok(());
            }
            core.playback.source
        };
        debug_assert_eq!(source, PlaybackSource::Youtube);

        let position = self.embed.position_ms().await?;
        let duration = self.embed.duration_ms().await?;

        let mut core = self.core.lock().await;
        // Re-check under the lock; the clock poll may have raced a pause or
        // a track change.
        if core.tick_gen != token || !core.playback.is_playing {
            return Ok(());
        }
        if duration > 0 {
            core.playback.duration_ms = duration;
        }
        core.playback.set_progress(position);
        Ok(())
    }
}

/// Drive the one-second progress clock until the player is dropped or the
/// task is aborted. The token is armed a beat ahead, so any pause, source
/// switch or track change during the beat suppresses the write.
pub async fn run_progress_clock(player: Arc<Player>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await;
    loop {
        let token = player.tick_token().await;
        interval.tick().await;
        if let Err(e) = player.tick(token).await {
            tracing::warn!("Progress tick failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PLACEHOLDER_ART;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn track(id: &str, title: &str) -> Track {
        Track {
            id: id.to_string(),
            uri: Some(format!("spotify:track:{}", id)),
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration_ms: 180_000,
            album_art: PLACEHOLDER_ART.to_string(),
        }
    }

    fn playlist(tracks: Vec<Track>) -> Playlist {
        Playlist {
            id: "pl".to_string(),
            name: "List".to_string(),
            description: "No description".to_string(),
            tracks,
            tracks_href: String::new(),
            cover_art: PLACEHOLDER_ART.to_string(),
        }
    }

    #[derive(Default)]
    struct MockDevice {
        calls: std::sync::Mutex<Vec<String>>,
        device_id: std::sync::Mutex<Option<String>>,
    }

    impl MockDevice {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl DeviceAdapter for MockDevice {
        async fn device_id(&self) -> Option<String> {
            self.device_id.lock().unwrap().clone()
        }

        async fn set_device(&self, device_id: Option<String>) {
            *self.device_id.lock().unwrap() = device_id;
        }

        async fn play_context(&self, uris: &[String], offset: usize) -> Result<(), PlayerError> {
            self.record(format!("play_context({},{})", uris.len(), offset));
            Ok(())
        }

        async fn pause(&self) -> Result<(), PlayerError> {
            self.record("pause");
            Ok(())
        }

        async fn resume(&self) -> Result<(), PlayerError> {
            self.record("resume");
            Ok(())
        }

        async fn next(&self) -> Result<(), PlayerError> {
            self.record("next");
            Ok(())
        }

        async fn previous(&self) -> Result<(), PlayerError> {
            self.record("previous");
            Ok(())
        }

        async fn seek(&self, position_ms: u64) -> Result<(), PlayerError> {
            self.record(format!("seek({})", position_ms));
            Ok(())
        }

        async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
            self.record(format!("set_volume({})", percent));
            Ok(())
        }

        async fn set_repeat(&self, mode: RepeatMode) -> Result<(), PlayerError> {
            self.record(format!("set_repeat({})", mode.as_str()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockEmbed {
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl MockEmbed {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl EmbedAdapter for MockEmbed {
        async fn load_video(&self, video_id: &str) -> Result<(), PlayerError> {
            self.record(format!("load_video({})", video_id));
            Ok(())
        }

        async fn play(&self) -> Result<(), PlayerError> {
            self.record("play");
            Ok(())
        }

        async fn pause(&self) -> Result<(), PlayerError> {
            self.record("pause");
            Ok(())
        }

        async fn seek(&self, position_ms: u64) -> Result<(), PlayerError> {
            self.record(format!("seek({})", position_ms));
            Ok(())
        }

        async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
            self.record(format!("set_volume({})", percent));
            Ok(())
        }

        async fn position_ms(&self) -> Result<u64, PlayerError> {
            Ok(42_000)
        }

        async fn duration_ms(&self) -> Result<u64, PlayerError> {
            Ok(200_000)
        }
    }

    /// Scripted video index keyed by "title artist" query; an optional gate
    /// lets a test hold a response in flight.
    #[derive(Default)]
    struct MockSearch {
        results: HashMap<String, String>,
        gate: Option<(String, Arc<Notify>)>,
    }

    #[async_trait]
    impl VideoSearch for MockSearch {
        async fn search_video(&self, query: &str) -> Result<String, PlayerError> {
            if let Some((gated_query, notify)) = &self.gate {
                if gated_query == query {
                    notify.notified().await;
                }
            }
            self.results
                .get(query)
                .cloned()
                .ok_or_else(|| PlayerError::FallbackSearchFailed(query.to_string()))
        }
    }

    struct Fixture {
        device: Arc<MockDevice>,
        embed: Arc<MockEmbed>,
        player: Arc<Player>,
    }

    fn fixture_with_search(search: MockSearch) -> Fixture {
        let device = Arc::new(MockDevice::default());
        let embed = Arc::new(MockEmbed::default());
        let player = Arc::new(Player::new(
            device.clone(),
            embed.clone(),
            Arc::new(search),
            50,
        ));
        Fixture {
            device,
            embed,
            player,
        }
    }

    fn fixture() -> Fixture {
        let mut search = MockSearch::default();
        for (id, title) in [("a", "Alpha"), ("b", "Beta"), ("c", "Gamma")] {
            search
                .results
                .insert(format!("{} Artist", title), format!("vid-{}", id));
        }
        fixture_with_search(search)
    }

    async fn ready_device(player: &Player) {
        player
            .handle_device_event(DeviceEvent::Ready {
                device_id: "dev1".to_string(),
            })
            .await;
    }

    fn abc() -> Playlist {
        playlist(vec![
            track("a", "Alpha"),
            track("b", "Beta"),
            track("c", "Gamma"),
        ])
    }

    #[tokio::test]
    async fn reselecting_current_track_toggles_play() {
        let f = fixture();
        ready_device(&f.player).await;
        let pl = abc();

        f.player.select_track(&pl, 1).await.unwrap();
        let state = f.player.snapshot().await;
        assert!(state.is_playing);
        assert_eq!(state.current_track.as_ref().unwrap().id, "b");

        f.player.select_track(&pl, 1).await.unwrap();
        let state = f.player.snapshot().await;
        assert!(!state.is_playing);
        assert_eq!(state.current_track.as_ref().unwrap().id, "b");
        assert!(f.device.calls().contains(&"pause".to_string()));
    }

    #[tokio::test]
    async fn play_before_device_ready_fails() {
        let f = fixture();
        let pl = abc();
        let err = f.player.select_track(&pl, 0).await.unwrap_err();
        assert_eq!(err, PlayerError::DeviceNotReady);
        assert_eq!(
            f.player.snapshot().await.last_error,
            Some(PlayerError::DeviceNotReady)
        );
    }

    #[tokio::test]
    async fn device_play_carries_full_context_and_offset() {
        let f = fixture();
        ready_device(&f.player).await;
        f.player.select_track(&abc(), 2).await.unwrap();
        assert_eq!(f.device.calls(), vec!["play_context(3,2)"]);
    }

    #[tokio::test]
    async fn seek_clamps_to_duration() {
        let f = fixture();
        ready_device(&f.player).await;
        f.player.select_track(&abc(), 0).await.unwrap();

        f.player.seek(10_000_000).await.unwrap();
        let state = f.player.snapshot().await;
        assert_eq!(state.progress_ms, state.duration_ms);

        f.player.seek(0).await.unwrap();
        assert_eq!(f.player.snapshot().await.progress_ms, 0);
    }

    #[tokio::test]
    async fn fallback_next_and_prev_wrap_circularly() {
        let f = fixture();
        f.player.switch_to_fallback().await.unwrap();
        let pl = abc();

        f.player.select_track(&pl, 1).await.unwrap();
        assert_eq!(
            f.player.snapshot().await.current_track.unwrap().id,
            "b"
        );

        f.player.next().await.unwrap();
        assert_eq!(f.player.snapshot().await.current_track.unwrap().id, "c");

        // Wrap forward from the last index.
        f.player.next().await.unwrap();
        assert_eq!(f.player.snapshot().await.current_track.unwrap().id, "a");

        // Wrap backward from index 0.
        f.player.prev().await.unwrap();
        assert_eq!(f.player.snapshot().await.current_track.unwrap().id, "c");
    }

    #[tokio::test]
    async fn account_error_blocks_without_switching() {
        let f = fixture();
        ready_device(&f.player).await;
        f.player.select_track(&abc(), 0).await.unwrap();
        assert!(f.player.snapshot().await.is_playing);

        f.player
            .handle_device_event(DeviceEvent::Error {
                kind: DeviceErrorKind::Account,
                message: "premium required".to_string(),
            })
            .await;

        let state = f.player.snapshot().await;
        assert_eq!(state.last_error, Some(PlayerError::PremiumRequired));
        assert_eq!(state.source, PlaybackSource::Spotify);
        // Whatever the device last reported stands.
        assert!(state.is_playing);
        assert!(f.player.fallback_available().await);

        f.player.switch_to_fallback().await.unwrap();
        assert_eq!(f.player.source().await, PlaybackSource::Youtube);
        assert!(f
            .embed
            .calls()
            .contains(&"load_video(vid-a)".to_string()));
    }

    #[tokio::test]
    async fn non_account_errors_do_not_unlock_fallback() {
        let f = fixture();
        f.player
            .handle_device_event(DeviceEvent::Error {
                kind: DeviceErrorKind::Authentication,
                message: "bad token".to_string(),
            })
            .await;
        assert!(!f.player.fallback_available().await);
        assert!(matches!(
            f.player.snapshot().await.last_error,
            Some(PlayerError::DeviceAuthentication(_))
        ));
    }

    #[tokio::test]
    async fn loop_on_ended_seeks_and_resumes_without_advancing() {
        let f = fixture();
        f.player.switch_to_fallback().await.unwrap();
        let pl = abc();
        f.player.select_track(&pl, 1).await.unwrap();
        f.player.toggle_loop().await.unwrap();

        f.player
            .handle_embed_event(EmbedEvent::StateChanged {
                state: EmbedPlayerState::Ended,
                position_ms: 180_000,
                duration_ms: 180_000,
            })
            .await;

        let state = f.player.snapshot().await;
        assert_eq!(state.current_track.unwrap().id, "b");
        assert!(state.is_playing);
        assert_eq!(state.progress_ms, 0);
        let calls = f.embed.calls();
        assert!(calls.contains(&"seek(0)".to_string()));
        assert_eq!(calls.iter().filter(|c| *c == "play").count(), 1);
    }

    #[tokio::test]
    async fn ended_without_loop_advances_to_next_track() {
        let f = fixture();
        f.player.switch_to_fallback().await.unwrap();
        f.player.select_track(&abc(), 1).await.unwrap();

        f.player
            .handle_embed_event(EmbedEvent::StateChanged {
                state: EmbedPlayerState::Ended,
                position_ms: 180_000,
                duration_ms: 180_000,
            })
            .await;

        assert_eq!(f.player.snapshot().await.current_track.unwrap().id, "c");
    }

    #[tokio::test]
    async fn failed_fallback_search_leaves_prior_track_in_place() {
        let f = fixture();
        f.player.switch_to_fallback().await.unwrap();
        let mut pl = abc();
        pl.tracks.push(track("x", "Unfindable"));

        f.player.select_track(&pl, 0).await.unwrap();
        let err = f.player.select_track(&pl, 3).await.unwrap_err();
        assert!(matches!(err, PlayerError::FallbackSearchFailed(_)));

        let state = f.player.snapshot().await;
        assert_eq!(state.current_track.unwrap().id, "a");
        assert!(matches!(
            state.last_error,
            Some(PlayerError::FallbackSearchFailed(_))
        ));
    }

    #[tokio::test]
    async fn stale_search_result_is_discarded() {
        let gate = Arc::new(Notify::new());
        let mut search = MockSearch::default();
        search
            .results
            .insert("Alpha Artist".to_string(), "vid-a".to_string());
        search
            .results
            .insert("Beta Artist".to_string(), "vid-b".to_string());
        search.gate = Some(("Alpha Artist".to_string(), gate.clone()));

        let f = fixture_with_search(search);
        f.player.switch_to_fallback().await.unwrap();
        let pl = abc();

        // Track A's search hangs; select B while it is in flight.
        let player = f.player.clone();
        let pl_clone = pl.clone();
        let slow = tokio::spawn(async move { player.select_track(&pl_clone, 0).await });
        tokio::task::yield_now().await;

        f.player.select_track(&pl, 1).await.unwrap();
        assert_eq!(f.player.current_video_id().await.as_deref(), Some("vid-b"));

        // Release A's search; its late result must not clobber B.
        gate.notify_one();
        slow.await.unwrap().unwrap();

        let state = f.player.snapshot().await;
        assert_eq!(state.current_track.unwrap().id, "b");
        assert_eq!(f.player.current_video_id().await.as_deref(), Some("vid-b"));
        assert!(!f
            .embed
            .calls()
            .contains(&"load_video(vid-a)".to_string()));
    }

    #[tokio::test]
    async fn device_tick_advances_one_second_clamped() {
        let f = fixture();
        ready_device(&f.player).await;
        f.player.select_track(&abc(), 0).await.unwrap();

        let token = f.player.tick_token().await;
        f.player.tick(token).await.unwrap();
        f.player.tick(token).await.unwrap();
        assert_eq!(f.player.snapshot().await.progress_ms, 2000);
    }

    #[tokio::test]
    async fn stale_tick_generation_never_writes() {
        let f = fixture();
        ready_device(&f.player).await;
        f.player.select_track(&abc(), 0).await.unwrap();
        let stale = f.player.tick_token().await;

        // Pause then resume: both bump the generation.
        f.player.toggle_play().await.unwrap();
        f.player.toggle_play().await.unwrap();

        f.player.tick(stale).await.unwrap();
        assert_eq!(f.player.snapshot().await.progress_ms, 0);

        let fresh = f.player.tick_token().await;
        f.player.tick(fresh).await.unwrap();
        assert_eq!(f.player.snapshot().await.progress_ms, 1000);
    }

    #[tokio::test]
    async fn embed_tick_applies_native_clock() {
        let f = fixture();
        f.player.switch_to_fallback().await.unwrap();
        f.player.select_track(&abc(), 0).await.unwrap();

        let token = f.player.tick_token().await;
        f.player.tick(token).await.unwrap();
        let state = f.player.snapshot().await;
        assert_eq!(state.progress_ms, 42_000);
        assert_eq!(state.duration_ms, 200_000);
    }

    #[tokio::test]
    async fn embed_ready_applies_pending_volume() {
        let f = fixture();
        f.player.switch_to_fallback().await.unwrap();
        f.player.set_volume(80).await;
        f.player.handle_embed_event(EmbedEvent::Ready).await;
        assert!(f.embed.calls().contains(&"set_volume(80)".to_string()));
    }

    #[tokio::test]
    async fn loop_toggle_sends_repeat_mode_on_device_only() {
        let f = fixture();
        ready_device(&f.player).await;
        f.player.toggle_loop().await.unwrap();
        assert!(f
            .device
            .calls()
            .contains(&"set_repeat(track)".to_string()));
        f.player.toggle_loop().await.unwrap();
        assert!(f.device.calls().contains(&"set_repeat(off)".to_string()));
    }

    #[tokio::test]
    async fn device_state_events_update_canonical_state() {
        let f = fixture();
        ready_device(&f.player).await;
        f.player
            .handle_device_event(DeviceEvent::StateChanged {
                position_ms: 65_000,
                duration_ms: 240_000,
                paused: false,
                track: Some(track("z", "Zeta")),
                repeat_mode: RepeatMode::Track,
            })
            .await;

        let state = f.player.snapshot().await;
        assert_eq!(state.current_track.unwrap().id, "z");
        assert_eq!(state.progress_ms, 65_000);
        assert_eq!(state.duration_ms, 240_000);
        assert!(state.is_playing);
        assert!(state.is_looping);
    }
}
