//! The enrichment pipeline.
//!
//! One invocation per inbound event: validate the event, fetch the document,
//! label its image, generate a caption, and merge both back into the
//! document. Steps run strictly in order and the first failure ends the
//! invocation; nothing is retried.

pub mod event;

use std::{borrow::Cow, error::Error, fmt, sync::Arc};

use enrich_store::models::{Document, DocumentPath, Enrichment};
use enrich_store::schema::{MAX_LABELS, PRODUCT_NAME_PLACEHOLDER, caption_prompt};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::services::{CaptionGenerator, ImageLabeler, ServiceError};
use crate::store::{DocumentStore, StoreError};

pub use event::{EventError, document_path_from_event, document_path_from_name};

#[derive(Debug)]
pub enum PipelineError {
    MalformedEvent(EventError),
    StoreRead(StoreError),
    LabelService(ServiceError),
    CaptionService(ServiceError),
    StoreWrite(StoreError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEvent(err) => write!(f, "malformed event: {err}"),
            Self::StoreRead(err) => write!(f, "document read failed: {err}"),
            Self::LabelService(err) => write!(f, "image labeling failed: {err}"),
            Self::CaptionService(err) => write!(f, "caption generation failed: {err}"),
            Self::StoreWrite(err) => write!(f, "document update failed: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedEvent(err) => Some(err),
            Self::StoreRead(err) | Self::StoreWrite(err) => Some(err),
            Self::LabelService(err) | Self::CaptionService(err) => Some(err),
        }
    }
}

/// How a successful invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The document was updated with this caption and these labels.
    Enriched(Enrichment),
    /// Nothing exists at the referenced path.
    DocumentMissing(DocumentPath),
    /// The document has no usable `imageUrl`.
    ImageMissing(DocumentPath),
}

/// Runs the enrichment steps against injected store and service clients.
#[derive(Clone)]
pub struct EnrichmentPipeline {
    store: Arc<dyn DocumentStore>,
    labeler: Arc<dyn ImageLabeler>,
    captioner: Arc<dyn CaptionGenerator>,
}

impl EnrichmentPipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        labeler: Arc<dyn ImageLabeler>,
        captioner: Arc<dyn CaptionGenerator>,
    ) -> Self {
        Self {
            store,
            labeler,
            captioner,
        }
    }

    /// Handles one raw event body.
    ///
    /// # Errors
    /// Returns the `PipelineError` of the first step that failed.
    pub async fn run(&self, body: &[u8]) -> Result<PipelineOutcome, PipelineError> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("enrichment", %invocation_id, document = tracing::field::Empty);
        self.run_steps(body).instrument(span).await
    }

    async fn run_steps(&self, body: &[u8]) -> Result<PipelineOutcome, PipelineError> {
        info!("event received");
        let path = validate_event(body)?;
        tracing::Span::current().record("document", tracing::field::display(&path));

        let Some(document) = self.fetch_document(&path).await? else {
            warn!("document does not exist; nothing to enrich");
            return Ok(PipelineOutcome::DocumentMissing(path));
        };

        let Some(image_url) = document.image_url() else {
            warn!("document has no imageUrl; skipping enrichment");
            return Ok(PipelineOutcome::ImageMissing(path));
        };

        let labels = self.extract_labels(image_url).await?;
        let caption = self.generate_caption(&document).await?;
        let enrichment = Enrichment::new(caption, labels);
        self.update_document(&path, enrichment.clone()).await?;

        info!("document enriched");
        Ok(PipelineOutcome::Enriched(enrichment))
    }

    async fn fetch_document(&self, path: &DocumentPath) -> Result<Option<Document>, PipelineError> {
        info!("fetching document");
        let document = self.store.get(path).await.map_err(|err| {
            error!(error = %err, "document read failed");
            PipelineError::StoreRead(err)
        })?;
        if document.is_some() {
            info!("document fetched");
        }
        Ok(document)
    }

    async fn extract_labels(&self, image_url: &str) -> Result<Vec<String>, PipelineError> {
        info!(image_url, "labeling image");
        let labels = self
            .labeler
            .label_image(image_url, MAX_LABELS)
            .await
            .map_err(|err| {
                error!(error = %err, "image labeling failed");
                PipelineError::LabelService(err)
            })?;
        info!(?labels, "image labeled");
        Ok(labels)
    }

    async fn generate_caption(&self, document: &Document) -> Result<String, PipelineError> {
        let product_name = document
            .product_name()
            .unwrap_or(Cow::Borrowed(PRODUCT_NAME_PLACEHOLDER));
        let prompt = caption_prompt(&product_name);
        info!("generating caption");
        let text = self.captioner.generate(&prompt).await.map_err(|err| {
            error!(error = %err, "caption generation failed");
            PipelineError::CaptionService(err)
        })?;
        info!("caption generated");
        Ok(text.trim().to_string())
    }

    async fn update_document(
        &self,
        path: &DocumentPath,
        enrichment: Enrichment,
    ) -> Result<(), PipelineError> {
        info!("updating document");
        self.store
            .merge_fields(path, enrichment.into_fields())
            .await
            .map_err(|err| {
                error!(error = %err, "document update failed");
                PipelineError::StoreWrite(err)
            })
    }
}

fn validate_event(body: &[u8]) -> Result<DocumentPath, PipelineError> {
    let path = document_path_from_event(body).map_err(|err| {
        error!(error = %err, "invalid event payload");
        PipelineError::MalformedEvent(err)
    })?;
    info!(document = %path, "extracted document path");
    Ok(path)
}
