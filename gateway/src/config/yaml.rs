use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   public_url: "https://voice.example.com"
///
/// providers:
///   openai_api_key: "sk-..."
///   elevenlabs_api_key: "el-..."
///   twilio_account_sid: "AC..."
///   twilio_auth_token: "..."
///
/// gateways:
///   generation_model: "gpt-4o-mini"
///   generation_timeout_ms: 8000
///   synthesis_voice_id: "alloy"
///
/// conversation:
///   session_ttl_seconds: 1800
///   max_empty_turns: 3
///   goodbye_phrases: ["goodbye", "bye"]
///
/// audio_cache:
///   ttl_seconds: 600
///   max_entries: 1000
///
/// auth:
///   required: true
///   api_secrets:
///     - id: "ops"
///       secret: "your-api-secret"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub gateways: Option<GatewaysYaml>,
    pub conversation: Option<ConversationYaml>,
    pub audio_cache: Option<AudioCacheYaml>,
    pub recordings: Option<RecordingsYaml>,
    pub auth: Option<AuthYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Externally reachable base URL used in voice markup links
    pub public_url: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// OpenAI API key for transcription (Whisper) and reply generation
    pub openai_api_key: Option<String>,
    /// ElevenLabs API key for speech synthesis
    pub elevenlabs_api_key: Option<String>,
    /// Twilio account SID, used to fetch protected call recordings
    pub twilio_account_sid: Option<String>,
    /// Twilio auth token paired with the account SID
    pub twilio_auth_token: Option<String>,
}

/// Gateway endpoints, models and timeouts from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GatewaysYaml {
    pub openai_base_url: Option<String>,
    pub elevenlabs_base_url: Option<String>,
    pub transcription_model: Option<String>,
    pub generation_model: Option<String>,
    pub generation_max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub synthesis_voice_id: Option<String>,
    pub synthesis_model_id: Option<String>,
    pub speech_language: Option<String>,
    pub transcription_timeout_ms: Option<u64>,
    pub generation_timeout_ms: Option<u64>,
    pub synthesis_timeout_ms: Option<u64>,
}

/// Conversation policy from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConversationYaml {
    pub session_ttl_seconds: Option<u64>,
    pub eviction_interval_seconds: Option<u64>,
    pub max_empty_turns: Option<u32>,
    /// Replaces the default phrase list when present
    pub goodbye_phrases: Option<Vec<String>>,
    pub greeting_text: Option<String>,
    pub closing_text: Option<String>,
    pub fallback_text: Option<String>,
    pub reprompt_text: Option<String>,
}

/// Synthesized clip cache from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioCacheYaml {
    pub ttl_seconds: Option<u64>,
    pub max_entries: Option<u64>,
}

/// Recording download policy from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecordingsYaml {
    /// Permit http:// and loopback recording URLs (development only)
    pub allow_insecure_urls: Option<bool>,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    /// Preferred multi-secret form. If non-empty, it takes precedence over api_secret.
    #[serde(default)]
    pub api_secrets: Vec<AuthApiSecretYaml>,
    /// Legacy single-secret alias. Ignored when api_secrets is non-empty.
    pub api_secret: Option<String>,
}

/// API secret authentication entry in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AuthApiSecretYaml {
    pub id: String,
    pub secret: String,
}

/// Security configuration from YAML
///
/// # Example YAML structure
/// ```yaml
/// security:
///   cors_allowed_origins: "https://example.com,https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
