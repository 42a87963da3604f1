/// Thin typed clients over the collaborator HTTP surfaces
pub mod download;
pub mod spotify;
pub mod youtube;

pub use download::{DownloadClient, DownloadFormat};
pub use spotify::SpotifyApi;
pub use youtube::{VideoSearch, VideoSearchClient};
