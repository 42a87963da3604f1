use thiserror::Error;

/// Everything that can go wrong while browsing or playing. All variants are
/// non-fatal notifications except `SessionExpired`, which forces a return to
/// the connect prompt. Nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("Spotify session expired, please reconnect")]
    SessionExpired,

    #[error("player is not ready")]
    DeviceNotReady,

    #[error("failed to initialize player: {0}")]
    DeviceInitialization(String),

    #[error("authentication failed, please reconnect Spotify: {0}")]
    DeviceAuthentication(String),

    #[error("Spotify Premium is required for playback")]
    PremiumRequired,

    #[error("could not find a matching video: {0}")]
    FallbackSearchFailed(String),

    #[error("fallback playback error: {0}")]
    FallbackPlayback(String),

    #[error("network request failed: {0}")]
    NetworkFetch(String),
}

impl PlayerError {
    /// The account-tier error is the only one that unlocks the fallback
    /// transition; every other class is reported and otherwise ignored.
    pub fn is_premium_required(&self) -> bool {
        matches!(self, PlayerError::PremiumRequired)
    }
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        PlayerError::NetworkFetch(err.to_string())
    }
}
