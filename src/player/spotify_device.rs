//! Device adapter over the Spotify Connect Web API. The device itself lives
//! elsewhere (a browser tab, a desktop client); this adapter addresses it by
//! its registered id. Commands before the device is ready fail with
//! `DeviceNotReady`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::api::SpotifyApi;
use crate::error::PlayerError;
use crate::models::RepeatMode;
use crate::player::adapter::DeviceAdapter;

pub struct SpotifyDevice {
    api: Arc<SpotifyApi>,
    device_id: RwLock<Option<String>>,
}

impl SpotifyDevice {
    pub fn new(api: Arc<SpotifyApi>) -> Self {
        Self {
            api,
            device_id: RwLock::new(None),
        }
    }

    async fn require_device(&self) -> Result<String, PlayerError> {
        self.device_id
            .read()
            .await
            .clone()
            .ok_or(PlayerError::DeviceNotReady)
    }
}

#[async_trait]
impl DeviceAdapter for SpotifyDevice {
    async fn device_id(&self) -> Option<String> {
        self.device_id.read().await.clone()
    }

    async fn set_device(&self, device_id: Option<String>) {
        let mut guard = self.device_id.write().await;
        match &device_id {
            Some(id) => tracing::info!("Spotify device registered: {}", id),
            None => tracing::warn!("Spotify device has gone offline"),
        }
        *guard = device_id;
    }

    async fn play_context(&self, uris: &[String], offset: usize) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.play_with_context(&device, uris, offset).await
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.pause(&device).await
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.resume(&device).await
    }

    async fn next(&self) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.next(&device).await
    }

    async fn previous(&self) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.previous(&device).await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.seek(&device, position_ms).await
    }

    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.set_volume(&device, percent).await
    }

    async fn set_repeat(&self, mode: RepeatMode) -> Result<(), PlayerError> {
        let device = self.require_device().await?;
        self.api.set_repeat(&device, mode).await
    }
}
