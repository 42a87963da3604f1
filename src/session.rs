/// In-memory Spotify session gate. Nothing here touches disk: tokens live
/// only for the lifetime of the process.
use std::sync::Arc;
use tokio::sync::RwLock;

/// Access/refresh token pair handed over after the OAuth exchange.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Cloneable handle to the shared session. Presence of a token gates whether
/// the browser and the playback engine initialize at all; expiry is detected
/// only reactively, via 401 responses from collaborators.
#[derive(Debug, Clone, Default)]
pub struct Session {
    tokens: Arc<RwLock<Option<SessionTokens>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_access_token(access_token: impl Into<String>) -> Self {
        let session = Self::new();
        let tokens = session.tokens.clone();
        let access_token = access_token.into();
        // Constructed before the runtime does anything else; blocking_write
        // would panic inside a runtime, so seed via try_write instead.
        if let Ok(mut guard) = tokens.try_write() {
            *guard = Some(SessionTokens {
                access_token,
                refresh_token: None,
            });
        }
        session
    }

    pub async fn set_tokens(&self, tokens: SessionTokens) {
        *self.tokens.write().await = Some(tokens);
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    pub async fn is_connected(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Drop the stored tokens. Runs on logout and whenever a collaborator
    /// reports 401, returning the user to the connect prompt.
    pub async fn clear(&self) {
        let mut guard = self.tokens.write().await;
        if guard.is_some() {
            tracing::info!("Clearing Spotify session");
        }
        *guard = None;
    }
}
