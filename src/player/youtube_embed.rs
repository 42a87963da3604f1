//! Embed adapter for the fallback video player. The actual player object is
//! owned by the host UI; this adapter forwards transport commands over a
//! channel and mirrors the player's native clock in shared cells the
//! progress tick polls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PlayerError;
use crate::player::adapter::EmbedAdapter;

/// Commands delivered to the host-embedded player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedCommand {
    LoadVideo(String),
    Play,
    Pause,
    SeekTo(u64),
    SetVolume(u8),
}

pub struct YoutubeEmbed {
    commands: mpsc::UnboundedSender<EmbedCommand>,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
}

impl YoutubeEmbed {
    /// Returns the adapter and the command stream the host consumes.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<EmbedCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let embed = Arc::new(Self {
            commands: tx,
            position_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
        });
        (embed, rx)
    }

    /// Host-side push of the player's native clock.
    pub fn update_clock(&self, position_ms: u64, duration_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
        self.duration_ms.store(duration_ms, Ordering::SeqCst);
    }

    fn send(&self, command: EmbedCommand) -> Result<(), PlayerError> {
        self.commands
            .send(command)
            .map_err(|_| PlayerError::FallbackPlayback("embedded player is gone".to_string()))
    }
}

#[async_trait]
impl EmbedAdapter for YoutubeEmbed {
    async fn load_video(&self, video_id: &str) -> Result<(), PlayerError> {
        self.send(EmbedCommand::LoadVideo(video_id.to_string()))
    }

    async fn play(&self) -> Result<(), PlayerError> {
        self.send(EmbedCommand::Play)
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.send(EmbedCommand::Pause)
    }

    async fn seek(&self, position_ms: u64) -> Result<(), PlayerError> {
        self.send(EmbedCommand::SeekTo(position_ms))
    }

    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        self.send(EmbedCommand::SetVolume(percent.min(100)))
    }

    async fn position_ms(&self) -> Result<u64, PlayerError> {
        Ok(self.position_ms.load(Ordering::SeqCst))
    }

    async fn duration_ms(&self) -> Result<u64, PlayerError> {
        Ok(self.duration_ms.load(Ordering::SeqCst))
    }
}
