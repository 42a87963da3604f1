/// Main entry point for the T937 CLI
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use t937::api::{DownloadClient, DownloadFormat, SpotifyApi, VideoSearchClient};
use t937::player::{run_progress_clock, DeviceEvent, Player, SpotifyDevice, YoutubeEmbed};
use t937::{Config, PlaylistBrowser, Session, VolumeLevel};

#[derive(Parser, Debug)]
#[command(
    name = "t937",
    version = "0.1.0",
    about = "Spotify playlist browser with device and YouTube-fallback playback",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Parser, Debug)]
enum Command {
    /// List the connected account's playlists
    Playlists,

    /// List the tracks of a playlist
    Tracks {
        /// Playlist ID
        playlist_id: String,
    },

    /// Search the track catalog
    Search {
        /// Search query
        query: String,
    },

    /// List available playback devices
    Devices,

    /// Play a playlist starting at a track index
    Play {
        /// Playlist ID
        playlist_id: String,

        /// Zero-based track index
        #[arg(default_value = "0")]
        index: usize,

        /// Start on the YouTube fallback source instead of a device
        #[arg(short, long)]
        fallback: bool,
    },

    /// Resolve a download link for a fallback video
    Download {
        /// YouTube video ID
        video_id: String,

        /// Output format (mp3 or mp4)
        #[arg(short = 'F', long, default_value = "mp3")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level: tracing_subscriber::filter::LevelFilter = args.log_level.parse()?;
    t937::init_logging(level);

    info!("Starting t937 v0.1.0");

    let config = Config::load()?;
    let http = reqwest::Client::new();

    match args.command {
        Command::Playlists => {
            let browser = browser(&config, &http)?;
            for playlist in browser.list_playlists().await? {
                println!("{}  {}", playlist.id, playlist.name);
            }
        }
        Command::Tracks { playlist_id } => {
            let browser = browser(&config, &http)?;
            browser.list_playlists().await?;
            browser.fetch_tracks(&playlist_id).await?;
            let playlist = browser
                .playlist(&playlist_id)
                .await
                .ok_or("Playlist not found")?;
            for (index, track) in playlist.tracks.iter().enumerate() {
                println!(
                    "{:3}  {} - {}  [{}]",
                    index,
                    track.artist,
                    track.title,
                    format_duration(track.duration_ms)
                );
            }
        }
        Command::Search { query } => {
            let browser = browser(&config, &http)?;
            for track in browser.search_tracks(&query).await? {
                println!("{}  {} - {}", track.id, track.artist, track.title);
            }
        }
        Command::Devices => {
            let api = spotify_api(&config, &http)?;
            for device in api.devices().await? {
                let marker = if device.is_active { "*" } else { " " };
                println!(
                    "{} {}  {}",
                    marker,
                    device.id.as_deref().unwrap_or("-"),
                    device.name
                );
            }
        }
        Command::Play {
            playlist_id,
            index,
            fallback,
        } => {
            run_player(&config, &http, &playlist_id, index, fallback).await?;
        }
        Command::Download { video_id, format } => {
            let format = DownloadFormat::parse(&format).ok_or("Unknown format")?;
            let client = DownloadClient::new(http, &config.endpoints.download_proxy);
            let url = client.request_download(&video_id, format).await?;
            println!("{}", url);
        }
    }

    Ok(())
}

fn session() -> Result<Session, Box<dyn std::error::Error>> {
    match std::env::var("SPOTIFY_ACCESS_TOKEN") {
        Ok(token) if !token.is_empty() => Ok(Session::with_access_token(token)),
        _ => Err("Connect with Spotify first: set SPOTIFY_ACCESS_TOKEN".into()),
    }
}

fn spotify_api(
    config: &Config,
    http: &reqwest::Client,
) -> Result<Arc<SpotifyApi>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SpotifyApi::new(
        http.clone(),
        &config.endpoints.spotify_api,
        session()?,
    )))
}

fn browser(
    config: &Config,
    http: &reqwest::Client,
) -> Result<PlaylistBrowser, Box<dyn std::error::Error>> {
    Ok(PlaylistBrowser::new(spotify_api(config, http)?))
}

/// Drive a playback session until interrupted, printing the canonical state
/// once a second.
async fn run_player(
    config: &Config,
    http: &reqwest::Client,
    playlist_id: &str,
    index: usize,
    fallback: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let api = spotify_api(config, http)?;
    let browser = PlaylistBrowser::new(api.clone());
    browser.list_playlists().await?;
    browser.fetch_tracks(playlist_id).await?;
    let playlist = browser
        .playlist(playlist_id)
        .await
        .ok_or("Playlist not found")?;

    let device = Arc::new(SpotifyDevice::new(api.clone()));
    let (embed, mut embed_commands) = YoutubeEmbed::new();
    let search = Arc::new(VideoSearchClient::new(
        http.clone(),
        &config.endpoints.video_search,
    ));
    let player = Arc::new(Player::new(
        device,
        embed,
        search,
        config.general.default_volume,
    ));

    // Without an embedding page the command stream is only logged.
    tokio::spawn(async move {
        while let Some(command) = embed_commands.recv().await {
            info!("Embed command: {:?}", command);
        }
    });

    if fallback {
        player.switch_to_fallback().await?;
    } else {
        let devices = api.devices().await?;
        let device_id = devices
            .iter()
            .find(|d| d.is_active)
            .or_else(|| devices.first())
            .and_then(|d| d.id.clone())
            .ok_or("No playback device available")?;
        info!("Using device {}", device_id);
        player
            .handle_device_event(DeviceEvent::Ready { device_id })
            .await;
    }

    player.select_track(&playlist, index).await?;

    let clock = tokio::spawn(run_progress_clock(player.clone()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                print_state(&player).await;
            }
        }
    }

    clock.abort();
    info!("Shutting down");
    Ok(())
}

async fn print_state(player: &Player) {
    let state = player.snapshot().await;
    let Some(track) = state.current_track.as_ref() else {
        println!("(nothing playing)");
        return;
    };
    let status = if state.is_playing { ">" } else { "||" };
    let volume = match state.volume_level() {
        VolumeLevel::Muted => "muted",
        VolumeLevel::Low => "low",
        VolumeLevel::High => "high",
    };
    println!(
        "{} {} - {}  {} / {}  vol {} ({})",
        status,
        track.artist,
        track.title,
        format_duration(state.progress_ms),
        format_duration(state.duration_ms),
        state.volume,
        volume
    );
    if let Some(err) = state.last_error.as_ref() {
        warn!("Last playback error: {}", err);
    }
}

fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
