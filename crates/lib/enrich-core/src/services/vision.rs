use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::GcpAuth;

use super::{ImageLabeler, ServiceError, ServiceResult, status_error};

pub const DEFAULT_VISION_BASE_URL: &str = "https://vision.googleapis.com/v1";

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub base_url: String,
}

impl VisionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_VISION_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloud Vision label detection client.
#[derive(Clone)]
pub struct VisionLabeler {
    client: reqwest::Client,
    auth: GcpAuth,
    annotate_url: String,
}

impl VisionLabeler {
    #[must_use]
    pub fn new(client: reqwest::Client, auth: GcpAuth, config: &VisionConfig) -> Self {
        Self {
            client,
            auth,
            annotate_url: format!("{}/images:annotate", config.base_url.trim_end_matches('/')),
        }
    }
}

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [AnnotateImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct AnnotateImageRequest<'a> {
    image: Image<'a>,
    features: [Feature; 1],
}

#[derive(Serialize)]
struct Image<'a> {
    source: ImageSource<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSource<'a> {
    image_uri: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    max_results: u32,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<EntityAnnotation>,
    error: Option<RpcStatus>,
}

#[derive(Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl ImageLabeler for VisionLabeler {
    async fn label_image(&self, image_url: &str, max_results: u32) -> ServiceResult<Vec<String>> {
        let body = AnnotateRequest {
            requests: [AnnotateImageRequest {
                image: Image {
                    source: ImageSource {
                        image_uri: image_url,
                    },
                },
                features: [Feature {
                    kind: "LABEL_DETECTION",
                    max_results,
                }],
            }],
        };
        let request = self.client.post(&self.annotate_url).json(&body);
        let response = self.auth.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: AnnotateResponse = response.json().await?;
        let Some(image) = parsed.responses.into_iter().next() else {
            return Ok(Vec::new());
        };
        if let Some(error) = image.error
            && error.code != 0
        {
            return Err(ServiceError::Api(format!(
                "label detection failed ({}): {}",
                error.code, error.message
            )));
        }
        Ok(image
            .label_annotations
            .into_iter()
            .map(|label| label.description)
            .collect())
    }
}
