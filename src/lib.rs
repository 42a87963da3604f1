/// T937 - Spotify playlist browser with dual-backend playback
pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod models;
pub mod player;
pub mod session;

pub use api::{DownloadClient, DownloadFormat, SpotifyApi, VideoSearch, VideoSearchClient};
pub use browser::{Catalog, PlaylistBrowser};
pub use config::Config;
pub use error::PlayerError;
pub use models::{PlaybackSource, PlaybackState, Playlist, RepeatMode, Track, VolumeLevel};
pub use player::{
    DeviceAdapter, DeviceEvent, EmbedAdapter, EmbedEvent, Player, PlayerPhase, SpotifyDevice,
    YoutubeEmbed,
};
pub use session::Session;

use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging. Noisy HTTP internals are pinned at INFO regardless of
/// the requested level.
pub fn init_logging(level: filter::LevelFilter) {
    let filter = filter::Targets::new()
        .with_default(level)
        .with_target("t937", level)
        .with_target("hyper", filter::LevelFilter::INFO)
        .with_target("reqwest", filter::LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
