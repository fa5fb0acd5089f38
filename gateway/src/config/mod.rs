//! Configuration module for the voice turn gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use voice_turn_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Phrases that end the call when spoken by the caller
pub const DEFAULT_GOODBYE_PHRASES: &[&str] =
    &["goodbye", "bye", "hang up", "that's all", "end call"];

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// External gateway endpoints, models and call bounds
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Base URL for the OpenAI API (transcription and generation)
    pub openai_base_url: String,
    /// Base URL for the ElevenLabs API (synthesis)
    pub elevenlabs_base_url: String,
    pub transcription_model: String,
    pub generation_model: String,
    pub generation_max_tokens: u32,
    /// System prompt prepended to every generation request
    pub system_prompt: String,
    pub synthesis_voice_id: String,
    pub synthesis_model_id: Option<String>,
    /// Language hint for transcription and `<Say>`/`<Gather>` (e.g. "en-US")
    pub speech_language: Option<String>,
    pub transcription_timeout_ms: u64,
    pub generation_timeout_ms: u64,
    pub synthesis_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            elevenlabs_base_url: DEFAULT_ELEVENLABS_BASE_URL.to_string(),
            transcription_model: "whisper-1".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            generation_max_tokens: 500,
            system_prompt: "You are a helpful voice assistant on a phone call. \
                            Answer in one or two short spoken sentences."
                .to_string(),
            synthesis_voice_id: "alloy".to_string(),
            synthesis_model_id: None,
            speech_language: None,
            transcription_timeout_ms: 15_000,
            generation_timeout_ms: 8_000,
            synthesis_timeout_ms: 8_000,
        }
    }
}

impl GatewayConfig {
    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_millis(self.transcription_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }
}

/// Conversation policy: session lifetime, end-of-call detection and canned replies
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationConfig {
    /// Idle time after which a session is discarded
    pub session_ttl_seconds: u64,
    /// Period of the background eviction sweep
    pub eviction_interval_seconds: u64,
    /// Consecutive empty caller turns that end the call
    pub max_empty_turns: u32,
    pub goodbye_phrases: Vec<String>,
    pub greeting_text: String,
    pub closing_text: String,
    /// Spoken when a gateway fails or times out
    pub fallback_text: String,
    /// Spoken after an empty caller turn below the limit
    pub reprompt_text: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 30 * 60,
            eviction_interval_seconds: 60,
            max_empty_turns: 3,
            goodbye_phrases: DEFAULT_GOODBYE_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            greeting_text: "Hello! How can I help you today?".to_string(),
            closing_text: "Thanks for calling. Goodbye!".to_string(),
            fallback_text: "Sorry, please repeat that.".to_string(),
            reprompt_text: "Sorry, I didn't catch that. Could you say it again?".to_string(),
        }
    }
}

impl ConversationConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_seconds)
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS, public URL)
/// - Provider API keys (OpenAI, ElevenLabs, Twilio)
/// - Gateway endpoints and timeouts
/// - Conversation policy (session TTL, end-of-call intents, canned replies)
/// - Clip cache settings
/// - Authentication and security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Externally reachable base URL; markup links are relative when unset
    pub public_url: Option<String>,

    // Provider credentials
    /// OpenAI API key for transcription (Whisper) and generation (Chat Completions)
    pub openai_api_key: Option<String>,
    /// ElevenLabs API key for speech synthesis
    pub elevenlabs_api_key: Option<String>,
    /// Twilio account SID for authenticated recording downloads
    pub twilio_account_sid: Option<String>,
    /// Twilio auth token for authenticated recording downloads
    pub twilio_auth_token: Option<String>,

    pub gateways: GatewayConfig,
    pub conversation: ConversationConfig,

    // Synthesized clip cache
    pub audio_cache_ttl_seconds: u64,
    pub audio_cache_max_entries: u64,

    /// Allow http:// and loopback recording URLs (development only)
    pub allow_insecure_recording_urls: bool,

    // Authentication configuration
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub auth_required: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.elevenlabs_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
        for secret in &mut self.auth_api_secrets {
            secret.secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values (loaded in main.rs)
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if API secret authentication is configured
    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// Build an absolute (or root-relative) URL for a path served by this gateway
    pub fn url_for(&self, path: &str) -> String {
        match self.public_url.as_deref() {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => path.to_string(),
        }
    }

    /// Get API key for a specific provider
    ///
    /// # Arguments
    /// * `provider` - The name of the provider ("openai", "elevenlabs", "twilio")
    ///
    /// # Returns
    /// * `Result<String, String>` - The API key on success, or an error message on failure
    pub fn get_api_key(&self, provider: &str) -> Result<String, String> {
        match provider.to_lowercase().as_str() {
            "openai" | "whisper" | "gpt" => self
                .openai_api_key
                .as_ref()
                .cloned()
                .ok_or_else(|| "OpenAI API key not configured in server environment".to_string()),
            "elevenlabs" | "eleven-labs" | "eleven_labs" => {
                self.elevenlabs_api_key.as_ref().cloned().ok_or_else(|| {
                    "ElevenLabs API key not configured in server environment".to_string()
                })
            }
            "twilio" => self
                .twilio_auth_token
                .as_ref()
                .cloned()
                .ok_or_else(|| "Twilio auth token not configured in server environment".to_string()),
            _ => Err(format!("Unsupported provider: {provider}")),
        }
    }

    /// Get Twilio basic-auth credentials (account SID, auth token) when both are set
    pub fn twilio_credentials(&self) -> Option<(String, String)> {
        match (&self.twilio_account_sid, &self.twilio_auth_token) {
            (Some(sid), Some(token)) => Some((sid.clone(), token.clone())),
            _ => None,
        }
    }
}

pub(crate) fn parse_auth_api_secrets_json(
    json_str: &str,
) -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid AUTH_API_SECRETS_JSON format: {e}"))?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}
