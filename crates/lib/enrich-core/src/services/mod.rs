//! Outbound AI services used by the pipeline.
//!
//! Each service sits behind a small trait so the pipeline can be driven by
//! the Google clients in production and by in-process fakes in tests.

pub mod gemini;
pub mod vision;

use std::error::Error;
use std::fmt;

use async_trait::async_trait;

use crate::auth::AuthError;

pub use gemini::{GeminiCaptioner, GeminiConfig};
pub use vision::{VisionConfig, VisionLabeler};

#[derive(Debug)]
pub enum ServiceError {
    Http(reqwest::Error),
    Status { status: u16, body: String },
    Auth(AuthError),
    /// The service answered but reported a failure in the payload.
    Api(String),
    /// The service answered without the content that was asked for.
    EmptyResponse(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "service request failed: {err}"),
            Self::Status { status, body } => write!(f, "service returned status {status}: {body}"),
            Self::Auth(err) => write!(f, "service authentication failed: {err}"),
            Self::Api(message) => write!(f, "service reported an error: {message}"),
            Self::EmptyResponse(message) => write!(f, "service returned no content: {message}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Auth(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Describes the contents of an image as short text labels.
#[async_trait]
pub trait ImageLabeler: Send + Sync {
    /// Returns up to `max_results` label descriptions for the image at
    /// `image_url`, most relevant first.
    ///
    /// # Errors
    /// Returns `ServiceError` if the labeling service call fails.
    async fn label_image(&self, image_url: &str, max_results: u32) -> ServiceResult<Vec<String>>;
}

/// Produces text for a prompt.
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    /// Returns the generated text, untrimmed.
    ///
    /// # Errors
    /// Returns `ServiceError` if the generation service call fails.
    async fn generate(&self, prompt: &str) -> ServiceResult<String>;
}

pub(crate) async fn status_error(response: reqwest::Response) -> ServiceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ServiceError::Status { status, body }
}
