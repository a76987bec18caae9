use std::error::Error;
use std::fmt;
use std::sync::Arc;

use enrich_core::auth::GcpAuth;
use enrich_core::control::EnrichmentPipeline;
use enrich_core::services::{GeminiCaptioner, VisionLabeler};
use enrich_core::store::{DocumentStore, FirestoreDocumentStore, SurrealDocumentStore};
use surrealdb::engine::any::connect;
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::config::{GcpCredentials, HookConfig, StoreSettings, SurrealSettings};

const IN_MEMORY_URI: &str = "mem://";

#[derive(Debug)]
pub enum BootstrapError {
    HttpClient(String),
    Database(String),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpClient(message) => write!(f, "failed to build HTTP client: {message}"),
            Self::Database(message) => write!(f, "failed to connect document store: {message}"),
        }
    }
}

impl Error for BootstrapError {}

/// Builds every outbound client once and wires them into the pipeline.
pub async fn build_pipeline(config: &HookConfig) -> Result<EnrichmentPipeline, BootstrapError> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("enrich-hookd/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| BootstrapError::HttpClient(err.to_string()))?;
    let auth = build_auth(&config.credentials, &http);

    let store: Arc<dyn DocumentStore> = match &config.store {
        StoreSettings::Firestore(firestore) => {
            info!(
                project = %firestore.project_id,
                database = %firestore.database,
                "using Firestore document store"
            );
            Arc::new(FirestoreDocumentStore::new(http.clone(), auth.clone(), firestore))
        }
        StoreSettings::Surreal(settings) => Arc::new(connect_surreal(settings).await?),
    };
    let labeler = Arc::new(VisionLabeler::new(http.clone(), auth, &config.vision));
    let captioner = Arc::new(GeminiCaptioner::new(http, &config.gemini));

    Ok(EnrichmentPipeline::new(store, labeler, captioner))
}

fn build_auth(credentials: &GcpCredentials, http: &reqwest::Client) -> GcpAuth {
    match credentials {
        GcpCredentials::Anonymous => GcpAuth::anonymous(),
        GcpCredentials::StaticToken(token) => GcpAuth::static_token(token.clone()),
        GcpCredentials::MetadataServer => GcpAuth::metadata(http.clone()),
    }
}

async fn connect_surreal(
    settings: &SurrealSettings,
) -> Result<SurrealDocumentStore<surrealdb::engine::any::Any>, BootstrapError> {
    let uri = settings.uri.as_deref().unwrap_or(IN_MEMORY_URI);
    let db = connect(uri).await.map_err(map_db_error)?;

    if let (Some(username), Some(password)) =
        (settings.username.as_ref(), settings.password.as_ref())
    {
        db.signin(Root {
            username: username.as_str(),
            password: password.as_str(),
        })
        .await
        .map_err(map_db_error)?;
    }

    db.use_ns(&settings.namespace)
        .use_db(&settings.database)
        .await
        .map_err(map_db_error)?;

    info!(uri, namespace = %settings.namespace, "using SurrealDB document store");
    Ok(SurrealDocumentStore::new(db))
}

fn map_db_error(err: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::Database(err.to_string())
}
