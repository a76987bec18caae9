use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use enrich_core::control::{EnrichmentPipeline, EventError, PipelineError, PipelineOutcome};
use enrich_core::services::{CaptionGenerator, ImageLabeler, ServiceError, ServiceResult};
use enrich_core::store::{DocumentStore, StoreError, StoreResult, SurrealDocumentStore};
use enrich_store::models::{Document, DocumentPath, Enrichment};
use serde_json::{Map, Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

const PRODUCTS_ABC_EVENT: &[u8] =
    br#"{"value":{"name":"projects/demo/databases/(default)/documents/products/abc"}}"#;

/// Wraps the in-memory store and counts calls, optionally failing them.
struct RecordingStore {
    inner: SurrealDocumentStore<Db>,
    gets: AtomicUsize,
    merges: AtomicUsize,
    fail_reads: bool,
    fail_writes: bool,
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(StoreError::Status {
                status: 503,
                body: "read unavailable".to_string(),
            });
        }
        self.inner.get(path).await
    }

    async fn merge_fields(
        &self,
        path: &DocumentPath,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Status {
                status: 503,
                body: "write unavailable".to_string(),
            });
        }
        self.inner.merge_fields(path, fields).await
    }
}

struct FakeLabeler {
    labels: Option<Vec<String>>,
    calls: Mutex<Vec<(String, u32)>>,
}

#[async_trait]
impl ImageLabeler for FakeLabeler {
    async fn label_image(&self, image_url: &str, max_results: u32) -> ServiceResult<Vec<String>> {
        self.calls
            .lock()
            .expect("labeler mutex poisoned")
            .push((image_url.to_string(), max_results));
        self.labels
            .clone()
            .ok_or_else(|| ServiceError::Api("vision unavailable".to_string()))
    }
}

struct FakeCaptioner {
    text: Option<String>,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CaptionGenerator for FakeCaptioner {
    async fn generate(&self, prompt: &str) -> ServiceResult<String> {
        self.prompts
            .lock()
            .expect("captioner mutex poisoned")
            .push(prompt.to_string());
        self.text
            .clone()
            .ok_or_else(|| ServiceError::Status {
                status: 500,
                body: "gemini unavailable".to_string(),
            })
    }
}

struct Harness {
    store: Arc<RecordingStore>,
    labeler: Arc<FakeLabeler>,
    captioner: Arc<FakeCaptioner>,
    pipeline: EnrichmentPipeline,
}

struct HarnessOptions {
    labels: Option<Vec<String>>,
    caption: Option<String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            labels: Some(vec![
                "Scarf".to_string(),
                "Wool".to_string(),
                "Fashion".to_string(),
            ]),
            caption: Some("  Cozy vibes only. 🧣\n".to_string()),
            fail_reads: false,
            fail_writes: false,
        }
    }
}

async fn build_harness(db_name: &str, options: HarnessOptions) -> Harness {
    let db = Surreal::new::<Mem>(())
        .await
        .expect("failed to create in-memory surrealdb instance");
    db.use_ns("enrich")
        .use_db(db_name)
        .await
        .expect("failed to select surrealdb namespace/db");

    let store = Arc::new(RecordingStore {
        inner: SurrealDocumentStore::new(db),
        gets: AtomicUsize::new(0),
        merges: AtomicUsize::new(0),
        fail_reads: options.fail_reads,
        fail_writes: options.fail_writes,
    });
    let labeler = Arc::new(FakeLabeler {
        labels: options.labels,
        calls: Mutex::new(Vec::new()),
    });
    let captioner = Arc::new(FakeCaptioner {
        text: options.caption,
        prompts: Mutex::new(Vec::new()),
    });
    let pipeline = EnrichmentPipeline::new(store.clone(), labeler.clone(), captioner.clone());
    Harness {
        store,
        labeler,
        captioner,
        pipeline,
    }
}

fn products_abc() -> DocumentPath {
    DocumentPath::parse("products/abc").expect("valid path")
}

impl Harness {
    async fn seed(&self, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("seed fields must be an object");
        };
        self.store
            .inner
            .put(&products_abc(), fields)
            .await
            .expect("seeding document should succeed");
    }

    async fn stored_fields(&self) -> Value {
        let document = self
            .store
            .inner
            .get(&products_abc())
            .await
            .expect("read should succeed")
            .expect("document should exist");
        Value::Object(document.fields)
    }

    fn label_calls(&self) -> usize {
        self.labeler.calls.lock().expect("labeler mutex poisoned").len()
    }

    fn caption_calls(&self) -> usize {
        self.captioner
            .prompts
            .lock()
            .expect("captioner mutex poisoned")
            .len()
    }

    fn merges(&self) -> usize {
        self.store.merges.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn enriches_document_with_caption_and_labels() {
    let harness = build_harness("enriches", HarnessOptions::default()).await;
    harness
        .seed(json!({ "imageUrl": "https://x/y.jpg", "productName": "Wool Scarf", "price": 30 }))
        .await;

    let outcome = harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect("pipeline should succeed");

    assert_eq!(
        outcome,
        PipelineOutcome::Enriched(Enrichment::new(
            "Cozy vibes only. 🧣".to_string(),
            vec!["Scarf".to_string(), "Wool".to_string(), "Fashion".to_string()],
        ))
    );
    assert_eq!(
        harness.stored_fields().await,
        json!({
            "imageUrl": "https://x/y.jpg",
            "productName": "Wool Scarf",
            "price": 30,
            "postDescription": "Cozy vibes only. 🧣",
            "aiLabels": ["Scarf", "Wool", "Fashion"]
        })
    );
    assert_eq!(
        harness.labeler.calls.lock().expect("labeler mutex poisoned").as_slice(),
        &[("https://x/y.jpg".to_string(), 10)]
    );
    assert_eq!(
        harness
            .captioner
            .prompts
            .lock()
            .expect("captioner mutex poisoned")
            .as_slice(),
        &["Generate a short, creative caption for a product named 'Wool Scarf'.".to_string()]
    );
    assert_eq!(harness.store.gets.load(Ordering::SeqCst), 1);
    assert_eq!(harness.merges(), 1);
}

#[tokio::test]
async fn empty_labels_are_still_written() {
    let harness = build_harness(
        "empty_labels",
        HarnessOptions {
            labels: Some(Vec::new()),
            ..HarnessOptions::default()
        },
    )
    .await;
    harness
        .seed(json!({ "imageUrl": "https://x/y.jpg", "productName": "Wool Scarf" }))
        .await;

    harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect("pipeline should succeed");

    let stored = harness.stored_fields().await;
    assert_eq!(stored["aiLabels"], json!([]));
}

#[tokio::test]
async fn missing_product_name_uses_placeholder() {
    let harness = build_harness("placeholder", HarnessOptions::default()).await;
    harness.seed(json!({ "imageUrl": "https://x/y.jpg" })).await;

    harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect("pipeline should succeed");

    let prompts = harness
        .captioner
        .prompts
        .lock()
        .expect("captioner mutex poisoned")
        .clone();
    assert_eq!(
        prompts,
        vec!["Generate a short, creative caption for a product named 'N/A'.".to_string()]
    );
}

#[tokio::test]
async fn numeric_product_name_is_rendered_in_prompt() {
    let harness = build_harness("numeric_name", HarnessOptions::default()).await;
    harness
        .seed(json!({ "imageUrl": "https://x/y.jpg", "productName": 42 }))
        .await;

    harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect("pipeline should succeed");

    let prompts = harness
        .captioner
        .prompts
        .lock()
        .expect("captioner mutex poisoned")
        .clone();
    assert_eq!(
        prompts,
        vec!["Generate a short, creative caption for a product named '42'.".to_string()]
    );
}

#[tokio::test]
async fn empty_event_is_malformed_and_touches_nothing() {
    let harness = build_harness("malformed", HarnessOptions::default()).await;

    let err = harness
        .pipeline
        .run(b"{}")
        .await
        .expect_err("pipeline should reject the event");

    assert!(matches!(
        err,
        PipelineError::MalformedEvent(EventError::MissingReference)
    ));
    assert_eq!(harness.store.gets.load(Ordering::SeqCst), 0);
    assert_eq!(harness.label_calls(), 0);
    assert_eq!(harness.caption_calls(), 0);
    assert_eq!(harness.merges(), 0);
}

#[tokio::test]
async fn missing_document_is_a_no_op() {
    let harness = build_harness("missing_document", HarnessOptions::default()).await;

    let outcome = harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect("pipeline should succeed");

    assert_eq!(outcome, PipelineOutcome::DocumentMissing(products_abc()));
    assert_eq!(harness.label_calls(), 0);
    assert_eq!(harness.caption_calls(), 0);
    assert_eq!(harness.merges(), 0);
}

#[tokio::test]
async fn missing_image_is_a_no_op() {
    let harness = build_harness("missing_image", HarnessOptions::default()).await;
    harness.seed(json!({ "productName": "Wool Scarf" })).await;

    let outcome = harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect("pipeline should succeed");

    assert_eq!(outcome, PipelineOutcome::ImageMissing(products_abc()));
    assert_eq!(harness.label_calls(), 0);
    assert_eq!(harness.caption_calls(), 0);
    assert_eq!(harness.merges(), 0);
    assert_eq!(harness.stored_fields().await, json!({ "productName": "Wool Scarf" }));
}

#[tokio::test]
async fn store_read_failure_stops_pipeline() {
    let harness = build_harness(
        "read_failure",
        HarnessOptions {
            fail_reads: true,
            ..HarnessOptions::default()
        },
    )
    .await;

    let err = harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect_err("pipeline should fail");

    assert!(matches!(err, PipelineError::StoreRead(_)));
    assert_eq!(harness.label_calls(), 0);
    assert_eq!(harness.merges(), 0);
}

#[tokio::test]
async fn label_failure_skips_caption_and_update() {
    let harness = build_harness(
        "label_failure",
        HarnessOptions {
            labels: None,
            ..HarnessOptions::default()
        },
    )
    .await;
    harness
        .seed(json!({ "imageUrl": "https://x/y.jpg", "productName": "Wool Scarf" }))
        .await;

    let err = harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect_err("pipeline should fail");

    assert!(matches!(err, PipelineError::LabelService(_)));
    assert_eq!(harness.label_calls(), 1);
    assert_eq!(harness.caption_calls(), 0);
    assert_eq!(harness.merges(), 0);
}

#[tokio::test]
async fn caption_failure_leaves_document_unchanged() {
    let harness = build_harness(
        "caption_failure",
        HarnessOptions {
            caption: None,
            ..HarnessOptions::default()
        },
    )
    .await;
    let original = json!({ "imageUrl": "https://x/y.jpg", "productName": "Wool Scarf" });
    harness.seed(original.clone()).await;

    let err = harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect_err("pipeline should fail");

    assert!(matches!(err, PipelineError::CaptionService(_)));
    assert_eq!(harness.merges(), 0);
    assert_eq!(harness.stored_fields().await, original);
}

#[tokio::test]
async fn store_write_failure_is_reported() {
    let harness = build_harness(
        "write_failure",
        HarnessOptions {
            fail_writes: true,
            ..HarnessOptions::default()
        },
    )
    .await;
    harness
        .seed(json!({ "imageUrl": "https://x/y.jpg", "productName": "Wool Scarf" }))
        .await;

    let err = harness
        .pipeline
        .run(PRODUCTS_ABC_EVENT)
        .await
        .expect_err("pipeline should fail");

    assert!(matches!(err, PipelineError::StoreWrite(_)));
    assert_eq!(harness.merges(), 1);
}
