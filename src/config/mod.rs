//! Configuration module for the Callbridge server
//!
//! Configuration is an explicit immutable value built once at startup from
//! environment variables (with `.env` support via `dotenvy` in `main`) and
//! passed into session construction. Missing required credentials are a
//! fatal setup error, reported before the server binds.
//!
//! # Example
//! ```rust,no_run
//! use callbridge::config::RelayConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayConfig::from_env()?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use crate::core::realtime::{RealtimeModel, RealtimeVoice};

/// Default system instructions for the assistant.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful and friendly phone assistant. \
     Keep answers short and conversational; the caller hears you over a phone line. \
     Use the available tools to look up products, search the web, or answer \
     store questions instead of guessing.";

/// Default greeting the assistant opens the call with.
pub const DEFAULT_GREETING: &str =
    "Greet the caller warmly and ask how you can help them today.";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Everything the relay needs to run: bind address, the public hostname
/// callers' streams are directed to, model session settings, capability
/// provider endpoints, and timeouts.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Public hostname used when building the stream-connect directive for
    /// the telephony network (e.g. an ngrok or load-balancer hostname).
    /// Falls back to the request's Host header when unset.
    pub public_host: Option<String>,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Model session settings
    /// OpenAI API key for the Realtime API
    pub openai_api_key: String,
    pub model: RealtimeModel,
    pub voice: RealtimeVoice,
    pub instructions: String,
    /// Server VAD activation threshold (0.0 - 1.0)
    pub vad_threshold: Option<f32>,
    pub temperature: Option<f32>,

    // Capability provider settings
    /// Product catalog search API base URL
    pub catalog_api_url: Option<String>,
    /// Web search API key (the provider owns the HTTP call)
    pub search_api_key: Option<String>,
    /// Web search API endpoint
    pub search_api_url: Option<String>,

    // Timeouts (the relay never waits unbounded on an external collaborator)
    pub connect_timeout_secs: u64,
    pub tool_timeout_secs: u64,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("TLS requires both TLS_CERT_PATH and TLS_KEY_PATH")]
    IncompleteTls,
}

impl RelayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key =
            env_var("OPENAI_API_KEY").ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        let host = env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var("PORT", 5050)?;

        let tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        Ok(Self {
            host,
            port,
            public_host: env_var("PUBLIC_HOST"),
            tls,
            openai_api_key,
            model: RealtimeModel::from_str_or_default(
                env_var("REALTIME_MODEL").as_deref().unwrap_or(""),
            ),
            voice: RealtimeVoice::from_str_or_default(
                env_var("REALTIME_VOICE").as_deref().unwrap_or(""),
            ),
            instructions: env_var("ASSISTANT_INSTRUCTIONS")
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            vad_threshold: env_var("VAD_THRESHOLD").and_then(|v| v.parse().ok()),
            temperature: env_var("MODEL_TEMPERATURE").and_then(|v| v.parse().ok()),
            catalog_api_url: env_var("CATALOG_API_URL"),
            search_api_key: env_var("SEARCH_API_KEY"),
            search_api_url: env_var("SEARCH_API_URL"),
            connect_timeout_secs: parse_var("MODEL_CONNECT_TIMEOUT_SECS", 15)?,
            tool_timeout_secs: parse_var("TOOL_TIMEOUT_SECS", 10)?,
        })
    }

    /// The socket address string the server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether TLS serving is enabled.
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

/// Read an environment variable, treating empty strings as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var: name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_formats_host_and_port() {
        let config = RelayConfig {
            host: "127.0.0.1".to_string(),
            port: 5050,
            public_host: None,
            tls: None,
            openai_api_key: "sk-test".to_string(),
            model: RealtimeModel::default(),
            voice: RealtimeVoice::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            vad_threshold: None,
            temperature: None,
            catalog_api_url: None,
            search_api_key: None,
            search_api_url: None,
            connect_timeout_secs: 15,
            tool_timeout_secs: 10,
        };
        assert_eq!(config.address(), "127.0.0.1:5050");
        assert!(!config.is_tls_enabled());
    }
}
