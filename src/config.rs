//! Application configuration loaded from environment variables and Key Vault.
//!
//! Endpoint settings may live in Key Vault; they are fetched once at startup
//! and fall back to environment variables when the vault is unavailable.

use crate::services::key_vault::SecretSource;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Key Vault secret holding the GraphQL endpoint.
pub const API_URL_SECRET: &str = "APIURL";
/// Key Vault secret holding the Azure OpenAI endpoint.
pub const OPENAI_ENDPOINT_SECRET: &str = "AZUREOPENAIENDPOINT";
/// Key Vault secret holding the Azure OpenAI deployment name.
pub const OPENAI_DEPLOYMENT_SECRET: &str = "AZUREOPENAIDEPLOYMENTNAME";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Azure identity ---
    /// Application ID URI of the GraphQL API (token audience)
    pub api_app_id_uri: String,
    /// Key Vault name; enables secret loading when set
    pub key_vault_name: Option<String>,
    /// Client ID of a user-assigned managed identity
    pub azure_client_id: Option<String>,
    /// Running on a developer machine (Azure CLI credential)
    pub is_localhost: bool,

    // --- Endpoints (may be overridden from Key Vault) ---
    pub api_url: Option<String>,
    pub openai_endpoint: Option<String>,
    pub openai_deployment: Option<String>,

    // --- HTTP server ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// HS256 key for session tokens (raw bytes)
    pub session_signing_key: Vec<u8>,

    // --- Tuning ---
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub token_refresh_margin: Duration,
    pub recommendation_max_attempts: u32,
    pub recommendation_retry_delay: Duration,
    pub recommendation_timeout: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            api_app_id_uri: "api://todo-api".to_string(),
            key_vault_name: None,
            azure_client_id: None,
            is_localhost: true,
            api_url: Some("http://localhost:5000/graphql".to_string()),
            openai_endpoint: Some("http://localhost:5001".to_string()),
            openai_deployment: Some("gpt-test".to_string()),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            session_signing_key: b"test_session_key_32_bytes_min!!!".to_vec(),
            cache_ttl: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            token_refresh_margin: Duration::from_secs(120),
            recommendation_max_attempts: 3,
            recommendation_retry_delay: Duration::from_millis(1000),
            recommendation_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_app_id_uri = env::var("API_APP_ID_URI")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("API_APP_ID_URI"))?;
        if api_app_id_uri.is_empty() {
            return Err(ConfigError::Missing("API_APP_ID_URI"));
        }

        Ok(Self {
            api_app_id_uri,
            key_vault_name: env_opt("KEY_VAULT_NAME"),
            azure_client_id: env_opt("AZURE_CLIENT_ID"),
            is_localhost: env::var("IS_LOCALHOST")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),

            api_url: env_opt("API_URL"),
            openai_endpoint: env_opt("AZURE_OPENAI_ENDPOINT"),
            openai_deployment: env_opt("AZURE_OPENAI_DEPLOYMENT_NAME"),

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env_parse("PORT", 8080),
            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
                .into_bytes(),

            cache_ttl: Duration::from_secs(env_parse("TODO_CACHE_TTL_SECS", 60)),
            request_timeout: Duration::from_secs(env_parse("API_REQUEST_TIMEOUT_SECS", 30)),
            token_refresh_margin: Duration::from_secs(env_parse("TOKEN_REFRESH_MARGIN_SECS", 120)),
            recommendation_max_attempts: env_parse("RECOMMENDATION_MAX_RETRIES", 3),
            recommendation_retry_delay: Duration::from_millis(env_parse(
                "RECOMMENDATION_RETRY_DELAY_MS",
                1000,
            )),
            recommendation_timeout: Duration::from_secs(env_parse(
                "RECOMMENDATION_TIMEOUT_SECS",
                30,
            )),
        })
    }

    /// OAuth scope for the GraphQL API.
    pub fn api_scope(&self) -> String {
        format!("{}/.default", self.api_app_id_uri.trim_end_matches('/'))
    }

    /// Key Vault base URL, if a vault is configured.
    pub fn key_vault_url(&self) -> Option<String> {
        self.key_vault_name
            .as_ref()
            .map(|name| format!("https://{}.vault.azure.net", name))
    }

    /// Resolve remote endpoints, preferring Key Vault secrets over environment values.
    pub async fn resolve_endpoints(
        &self,
        secrets: Option<&dyn SecretSource>,
    ) -> Result<Endpoints, ConfigError> {
        let api_url = resolve_setting(secrets, API_URL_SECRET, &self.api_url)
            .await
            .ok_or(ConfigError::Missing("API_URL"))?;
        let openai_endpoint = resolve_setting(secrets, OPENAI_ENDPOINT_SECRET, &self.openai_endpoint)
            .await
            .ok_or(ConfigError::Missing("AZURE_OPENAI_ENDPOINT"))?;
        let openai_deployment =
            resolve_setting(secrets, OPENAI_DEPLOYMENT_SECRET, &self.openai_deployment)
                .await
                .ok_or(ConfigError::Missing("AZURE_OPENAI_DEPLOYMENT_NAME"))?;

        Ok(Endpoints {
            api_url,
            openai_endpoint,
            openai_deployment,
        })
    }
}

/// Remote endpoints resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_url: String,
    pub openai_endpoint: String,
    pub openai_deployment: String,
}

async fn resolve_setting(
    secrets: Option<&dyn SecretSource>,
    secret_name: &str,
    fallback: &Option<String>,
) -> Option<String> {
    if let Some(source) = secrets {
        match source.get_secret(secret_name).await {
            Ok(Some(value)) if !value.trim().is_empty() => return Some(value.trim().to_string()),
            Ok(_) => {
                tracing::debug!(secret = secret_name, "Secret not set in Key Vault");
            }
            Err(e) => {
                tracing::warn!(
                    secret = secret_name,
                    error = %e,
                    "Key Vault lookup failed, falling back to environment"
                );
            }
        }
    }

    fallback.clone()
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Key Vault error: {0}")]
    KeyVault(String),
}
