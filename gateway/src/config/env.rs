use std::path::PathBuf;

use super::utils::{env_bool, env_list, env_parse, env_string};
use super::{
    AuthApiSecret, ConversationConfig, GatewayConfig, ServerConfig, TlsConfig,
    parse_auth_api_secrets_json,
};

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Unset variables fall back to defaults. The result is validated before it is returned.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = super::merge::merge_config(None)?;
        super::validation::validate_config(&config)?;
        Ok(config)
    }
}

/// Build a configuration from environment variables layered over defaults
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let host = env_string("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port = env_parse::<u16>("PORT")?.unwrap_or(3001);

    let tls = load_tls()?;

    let gateways = load_gateways()?;
    let conversation = load_conversation()?;

    let auth_api_secrets = load_auth_api_secrets()?;
    let auth_required = env_bool("AUTH_REQUIRED")?.unwrap_or(false);

    Ok(ServerConfig {
        host,
        port,
        tls,
        public_url: env_string("PUBLIC_URL"),
        openai_api_key: env_string("OPENAI_API_KEY"),
        elevenlabs_api_key: env_string("ELEVENLABS_API_KEY"),
        twilio_account_sid: env_string("TWILIO_ACCOUNT_SID"),
        twilio_auth_token: env_string("TWILIO_AUTH_TOKEN"),
        gateways,
        conversation,
        audio_cache_ttl_seconds: env_parse("AUDIO_CACHE_TTL_SECONDS")?.unwrap_or(600),
        audio_cache_max_entries: env_parse("AUDIO_CACHE_MAX_ENTRIES")?.unwrap_or(1000),
        allow_insecure_recording_urls: env_bool("ALLOW_INSECURE_RECORDING_URLS")?
            .unwrap_or(false),
        auth_api_secrets,
        auth_required,
        cors_allowed_origins: env_string("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(60),
        rate_limit_burst_size: env_parse("RATE_LIMIT_BURST_SIZE")?.unwrap_or(10),
    })
}

fn load_tls() -> Result<Option<TlsConfig>, String> {
    if !env_bool("TLS_ENABLED")?.unwrap_or(false) {
        return Ok(None);
    }

    match (env_string("TLS_CERT_PATH"), env_string("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        _ => Err("TLS_ENABLED is true but TLS_CERT_PATH or TLS_KEY_PATH is not set".to_string()),
    }
}

fn load_gateways() -> Result<GatewayConfig, String> {
    let defaults = GatewayConfig::default();

    Ok(GatewayConfig {
        openai_base_url: env_string("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
        elevenlabs_base_url: env_string("ELEVENLABS_BASE_URL")
            .unwrap_or(defaults.elevenlabs_base_url),
        transcription_model: env_string("TRANSCRIPTION_MODEL")
            .unwrap_or(defaults.transcription_model),
        generation_model: env_string("GENERATION_MODEL").unwrap_or(defaults.generation_model),
        generation_max_tokens: env_parse("GENERATION_MAX_TOKENS")?
            .unwrap_or(defaults.generation_max_tokens),
        system_prompt: env_string("SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
        synthesis_voice_id: env_string("SYNTHESIS_VOICE_ID")
            .unwrap_or(defaults.synthesis_voice_id),
        synthesis_model_id: env_string("SYNTHESIS_MODEL_ID").or(defaults.synthesis_model_id),
        speech_language: env_string("SPEECH_LANGUAGE").or(defaults.speech_language),
        transcription_timeout_ms: env_parse("TRANSCRIPTION_TIMEOUT_MS")?
            .unwrap_or(defaults.transcription_timeout_ms),
        generation_timeout_ms: env_parse("GENERATION_TIMEOUT_MS")?
            .unwrap_or(defaults.generation_timeout_ms),
        synthesis_timeout_ms: env_parse("SYNTHESIS_TIMEOUT_MS")?
            .unwrap_or(defaults.synthesis_timeout_ms),
    })
}

fn load_conversation() -> Result<ConversationConfig, String> {
    let defaults = ConversationConfig::default();

    Ok(ConversationConfig {
        session_ttl_seconds: env_parse("SESSION_TTL_SECONDS")?
            .unwrap_or(defaults.session_ttl_seconds),
        eviction_interval_seconds: env_parse("SESSION_EVICTION_INTERVAL_SECONDS")?
            .unwrap_or(defaults.eviction_interval_seconds),
        max_empty_turns: env_parse("MAX_EMPTY_TURNS")?.unwrap_or(defaults.max_empty_turns),
        goodbye_phrases: env_list("GOODBYE_PHRASES").unwrap_or(defaults.goodbye_phrases),
        greeting_text: env_string("GREETING_TEXT").unwrap_or(defaults.greeting_text),
        closing_text: env_string("CLOSING_TEXT").unwrap_or(defaults.closing_text),
        fallback_text: env_string("FALLBACK_TEXT").unwrap_or(defaults.fallback_text),
        reprompt_text: env_string("REPROMPT_TEXT").unwrap_or(defaults.reprompt_text),
    })
}

/// AUTH_API_SECRETS_JSON wins over the single AUTH_API_SECRET form
fn load_auth_api_secrets() -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    if let Some(json) = env_string("AUTH_API_SECRETS_JSON") {
        return parse_auth_api_secrets_json(&json);
    }

    Ok(env_string("AUTH_API_SECRET")
        .map(|secret| {
            vec![AuthApiSecret {
                id: env_string("AUTH_API_SECRET_ID").unwrap_or_else(|| "default".to_string()),
                secret,
            }]
        })
        .unwrap_or_default())
}
