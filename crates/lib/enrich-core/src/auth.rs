//! Google Cloud access tokens for the REST clients.
//!
//! Tokens come from one of three places: a static token handed in by
//! configuration, the instance metadata server (Cloud Run, GCE), or nowhere
//! at all for emulators and mock servers.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the metadata server says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub enum AuthError {
    Http(reqwest::Error),
    Status { status: u16, body: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "metadata token request failed: {err}"),
            Self::Status { status, body } => {
                write!(f, "metadata server returned status {status}: {body}")
            }
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

enum TokenMode {
    Anonymous,
    Static(String),
    Metadata { client: reqwest::Client, url: String },
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Shared source of bearer tokens for Google APIs.
#[derive(Clone)]
pub struct GcpAuth {
    mode: Arc<TokenMode>,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl GcpAuth {
    /// No `Authorization` header is sent.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::with_mode(TokenMode::Anonymous)
    }

    #[must_use]
    pub fn static_token(token: impl Into<String>) -> Self {
        Self::with_mode(TokenMode::Static(token.into()))
    }

    /// Fetches tokens from the default metadata server endpoint.
    #[must_use]
    pub fn metadata(client: reqwest::Client) -> Self {
        Self::metadata_at(client, DEFAULT_METADATA_TOKEN_URL)
    }

    #[must_use]
    pub fn metadata_at(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self::with_mode(TokenMode::Metadata {
            client,
            url: url.into(),
        })
    }

    fn with_mode(mode: TokenMode) -> Self {
        Self {
            mode: Arc::new(mode),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the bearer token to send, if any.
    ///
    /// # Errors
    /// Returns `AuthError` if the metadata server cannot issue a token.
    pub async fn bearer_token(&self) -> Result<Option<String>, AuthError> {
        match self.mode.as_ref() {
            TokenMode::Anonymous => Ok(None),
            TokenMode::Static(token) => Ok(Some(token.clone())),
            TokenMode::Metadata { client, url } => {
                self.metadata_token(client, url).await.map(Some)
            }
        }
    }

    /// Adds the bearer token to a request when one is configured.
    ///
    /// # Errors
    /// Returns `AuthError` if a token cannot be obtained.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, AuthError> {
        Ok(match self.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn metadata_token(&self, client: &reqwest::Client, url: &str) -> Result<String, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && Instant::now() < cached.refresh_at
            {
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref()
            && Instant::now() < cached.refresh_at
        {
            return Ok(cached.token.clone());
        }

        debug!("requesting access token from metadata server");
        let response = client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let token: MetadataToken = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cache = Some(CachedToken {
            token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}
