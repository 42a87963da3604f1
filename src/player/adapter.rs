//! Adapter seam between the reconciliation core and the two vendor playback
//! objects. Each backend is a small capability trait plus the asynchronous
//! event set the core ingests; the core never touches a vendor object
//! directly.

use async_trait::async_trait;

use crate::error::PlayerError;
use crate::models::{RepeatMode, Track};

/// Transport commands understood by the Spotify Connect device backend.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Registered device id, if the device has come up.
    async fn device_id(&self) -> Option<String>;

    /// Device registration notification, driven by `DeviceEvent::Ready` /
    /// `NotReady` ingestion.
    async fn set_device(&self, device_id: Option<String>);

    /// Start playback of an ordered URI context at the given offset. Later
    /// next/prev commands ride the device-side queue this establishes.
    async fn play_context(&self, uris: &[String], offset: usize) -> Result<(), PlayerError>;

    async fn pause(&self) -> Result<(), PlayerError>;
    async fn resume(&self) -> Result<(), PlayerError>;
    async fn next(&self) -> Result<(), PlayerError>;
    async fn previous(&self) -> Result<(), PlayerError>;
    async fn seek(&self, position_ms: u64) -> Result<(), PlayerError>;
    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError>;
    async fn set_repeat(&self, mode: RepeatMode) -> Result<(), PlayerError>;
}

/// Transport commands understood by the embedded video player backend.
#[async_trait]
pub trait EmbedAdapter: Send + Sync {
    async fn load_video(&self, video_id: &str) -> Result<(), PlayerError>;
    async fn play(&self) -> Result<(), PlayerError>;
    async fn pause(&self) -> Result<(), PlayerError>;
    async fn seek(&self, position_ms: u64) -> Result<(), PlayerError>;
    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError>;

    /// The embedded player's native clock, polled by the progress tick.
    async fn position_ms(&self) -> Result<u64, PlayerError>;
    async fn duration_ms(&self) -> Result<u64, PlayerError>;
}

/// The three error classes the device SDK reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Initialization,
    Authentication,
    Account,
}

/// Asynchronous events pushed by the device backend.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Ready {
        device_id: String,
    },
    NotReady {
        device_id: String,
    },
    StateChanged {
        position_ms: u64,
        duration_ms: u64,
        paused: bool,
        track: Option<Track>,
        repeat_mode: RepeatMode,
    },
    Error {
        kind: DeviceErrorKind,
        message: String,
    },
}

/// The embedded player's state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

/// Asynchronous events pushed by the embedded video player.
#[derive(Debug, Clone)]
pub enum EmbedEvent {
    /// Player handle acquired; the pending volume is applied here.
    Ready,
    StateChanged {
        state: EmbedPlayerState,
        position_ms: u64,
        duration_ms: u64,
    },
}
