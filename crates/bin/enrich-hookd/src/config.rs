use clap::{Parser, ValueEnum, builder::BoolishValueParser};
use enrich_core::services::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use enrich_core::services::vision::DEFAULT_VISION_BASE_URL;
use enrich_core::services::{GeminiConfig, VisionConfig};
use enrich_core::store::FirestoreConfig;
use enrich_core::store::firestore::{DEFAULT_FIRESTORE_BASE_URL, DEFAULT_FIRESTORE_DATABASE};
use enrich_webhook::DEFAULT_MAX_BODY_BYTES;
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_DB_NAMESPACE: &str = "enrich";
const DEFAULT_DB_NAME: &str = "documents";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Firestore,
    Surreal,
}

#[derive(Parser, Debug)]
#[command(name = "enrich-hookd", version, about = "Document enrichment webhook daemon.")]
struct CliArgs {
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "HOOK_GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    #[arg(long, env = "HOOK_GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    gemini_base_url: String,

    #[arg(long, env = "HOOK_VISION_BASE_URL", default_value = DEFAULT_VISION_BASE_URL)]
    vision_base_url: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, env = "HOOK_BIND_HOST", default_value = DEFAULT_BIND_HOST)]
    bind_host: IpAddr,

    #[arg(
        long,
        env = "HOOK_MAX_BODY_BYTES",
        default_value_t = DEFAULT_MAX_BODY_BYTES
    )]
    max_body_bytes: usize,

    #[arg(long, env = "HOOK_STORE", value_enum, default_value_t = StoreBackend::Firestore)]
    store: StoreBackend,

    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    gcp_project: Option<String>,

    #[arg(
        long,
        env = "HOOK_FIRESTORE_DATABASE",
        default_value = DEFAULT_FIRESTORE_DATABASE
    )]
    firestore_database: String,

    #[arg(
        long,
        env = "HOOK_FIRESTORE_BASE_URL",
        default_value = DEFAULT_FIRESTORE_BASE_URL
    )]
    firestore_base_url: String,

    #[arg(long, env = "HOOK_GCP_ACCESS_TOKEN", hide_env_values = true)]
    gcp_access_token: Option<String>,

    #[arg(
        long,
        env = "HOOK_GCP_ANONYMOUS",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    gcp_anonymous: bool,

    #[arg(long, env = "HOOK_DB_URI")]
    db_uri: Option<String>,

    #[arg(long, env = "HOOK_DB_USERNAME")]
    db_username: Option<String>,

    #[arg(long, env = "HOOK_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    #[arg(long, env = "HOOK_DB_NAMESPACE", default_value = DEFAULT_DB_NAMESPACE)]
    db_namespace: String,

    #[arg(long, env = "HOOK_DB_NAME", default_value = DEFAULT_DB_NAME)]
    db_name: String,
}

/// Where Google API bearer tokens come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GcpCredentials {
    Anonymous,
    StaticToken(String),
    MetadataServer,
}

/// `SurrealDB` connection settings; in-memory when `uri` is `None`.
#[derive(Clone, Debug)]
pub struct SurrealSettings {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub namespace: String,
    pub database: String,
}

#[derive(Clone, Debug)]
pub enum StoreSettings {
    Firestore(FirestoreConfig),
    Surreal(SurrealSettings),
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Clone)]
pub struct HookConfig {
    pub gemini: GeminiConfig,
    pub vision: VisionConfig,
    pub listen_addr: SocketAddr,
    pub max_body_bytes: usize,
    pub store: StoreSettings,
    pub credentials: GcpCredentials,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl HookConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for HookConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let gemini_api_key = non_blank(args.gemini_api_key)
            .ok_or(ConfigError::MissingSetting("GEMINI_API_KEY"))?;

        if args.max_body_bytes == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "HOOK_MAX_BODY_BYTES",
                value: args.max_body_bytes.to_string(),
            });
        }

        let store = match args.store {
            StoreBackend::Firestore => {
                let project = non_blank(args.gcp_project)
                    .ok_or(ConfigError::MissingSetting("GOOGLE_CLOUD_PROJECT"))?;
                if args.firestore_database.trim().is_empty() {
                    return Err(ConfigError::InvalidSetting {
                        name: "HOOK_FIRESTORE_DATABASE",
                        value: args.firestore_database,
                    });
                }
                StoreSettings::Firestore(
                    FirestoreConfig::new(project)
                        .with_database(args.firestore_database)
                        .with_base_url(args.firestore_base_url),
                )
            }
            StoreBackend::Surreal => {
                let uri = non_blank(args.db_uri);
                let username = non_blank(args.db_username);
                let password = non_blank(args.db_password);
                if uri.is_some() {
                    if username.is_none() {
                        return Err(ConfigError::MissingSetting("HOOK_DB_USERNAME"));
                    }
                    if password.is_none() {
                        return Err(ConfigError::MissingSetting("HOOK_DB_PASSWORD"));
                    }
                }
                if args.db_namespace.trim().is_empty() {
                    return Err(ConfigError::InvalidSetting {
                        name: "HOOK_DB_NAMESPACE",
                        value: args.db_namespace,
                    });
                }
                if args.db_name.trim().is_empty() {
                    return Err(ConfigError::InvalidSetting {
                        name: "HOOK_DB_NAME",
                        value: args.db_name,
                    });
                }
                StoreSettings::Surreal(SurrealSettings {
                    uri,
                    username,
                    password,
                    namespace: args.db_namespace,
                    database: args.db_name,
                })
            }
        };

        let credentials = if args.gcp_anonymous {
            GcpCredentials::Anonymous
        } else if let Some(token) = non_blank(args.gcp_access_token) {
            GcpCredentials::StaticToken(token)
        } else {
            GcpCredentials::MetadataServer
        };

        Ok(Self {
            gemini: GeminiConfig::new(gemini_api_key)
                .with_model(args.gemini_model)
                .with_base_url(args.gemini_base_url),
            vision: VisionConfig::new().with_base_url(args.vision_base_url),
            listen_addr: SocketAddr::new(args.bind_host, args.port),
            max_body_bytes: args.max_body_bytes,
            store,
            credentials,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            gemini_api_key: Some("test-key".to_string()),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            vision_base_url: DEFAULT_VISION_BASE_URL.to_string(),
            port: DEFAULT_PORT,
            bind_host: DEFAULT_BIND_HOST.parse().expect("valid bind host"),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            store: StoreBackend::Firestore,
            gcp_project: Some("demo".to_string()),
            firestore_database: DEFAULT_FIRESTORE_DATABASE.to_string(),
            firestore_base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            gcp_access_token: None,
            gcp_anonymous: false,
            db_uri: None,
            db_username: None,
            db_password: None,
            db_namespace: DEFAULT_DB_NAMESPACE.to_string(),
            db_name: DEFAULT_DB_NAME.to_string(),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn defaults_listen_on_port_8080() {
        let config = HookConfig::try_from(base_args()).expect("config should parse");

        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse::<SocketAddr>().expect("valid addr"));
        assert_eq!(config.credentials, GcpCredentials::MetadataServer);
        assert!(matches!(config.store, StoreSettings::Firestore(_)));
    }

    #[test]
    fn missing_gemini_key_is_fatal() {
        let mut args = base_args();
        args.gemini_api_key = None;

        let err = HookConfig::try_from(args).err().expect("config should fail");

        assert!(matches!(err, ConfigError::MissingSetting("GEMINI_API_KEY")));
    }

    #[test]
    fn blank_gemini_key_is_fatal() {
        let mut args = base_args();
        args.gemini_api_key = Some("   ".to_string());

        assert!(HookConfig::try_from(args).is_err());
    }

    #[test]
    fn firestore_requires_project() {
        let mut args = base_args();
        args.gcp_project = None;

        let err = HookConfig::try_from(args).err().expect("config should fail");

        assert!(matches!(
            err,
            ConfigError::MissingSetting("GOOGLE_CLOUD_PROJECT")
        ));
    }

    #[test]
    fn surreal_without_uri_runs_in_memory() {
        let mut args = base_args();
        args.store = StoreBackend::Surreal;
        args.gcp_project = None;

        let config = HookConfig::try_from(args).expect("config should parse");

        let StoreSettings::Surreal(settings) = config.store else {
            panic!("expected surreal settings");
        };
        assert!(settings.uri.is_none());
    }

    #[test]
    fn remote_surreal_requires_credentials() {
        let mut args = base_args();
        args.store = StoreBackend::Surreal;
        args.db_uri = Some("ws://localhost:8000".to_string());

        let err = HookConfig::try_from(args).err().expect("config should fail");

        assert!(matches!(err, ConfigError::MissingSetting("HOOK_DB_USERNAME")));
    }

    #[test]
    fn static_token_takes_precedence_over_metadata() {
        let mut args = base_args();
        args.gcp_access_token = Some("ya29.static".to_string());

        let config = HookConfig::try_from(args).expect("config should parse");

        assert_eq!(
            config.credentials,
            GcpCredentials::StaticToken("ya29.static".to_string())
        );
    }
}
