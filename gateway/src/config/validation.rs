use std::collections::HashSet;

use url::Url;

use super::ServerConfig;

/// Validate the merged configuration
///
/// Checks cross-field constraints that cannot be expressed while parsing:
/// TLS files exist, authentication has secrets when required, durations
/// and limits are non-zero, and URLs are well formed.
pub(super) fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_tls(config)?;
    validate_auth(config)?;
    validate_urls(config)?;
    validate_limits(config)?;
    Ok(())
}

fn validate_tls(config: &ServerConfig) -> Result<(), String> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };

    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate file not found: {}",
            tls.cert_path.display()
        ));
    }
    if !tls.key_path.exists() {
        return Err(format!(
            "TLS private key file not found: {}",
            tls.key_path.display()
        ));
    }
    Ok(())
}

fn validate_auth(config: &ServerConfig) -> Result<(), String> {
    if config.auth_required && !config.has_api_secret_auth() {
        return Err(
            "AUTH_REQUIRED is enabled but no API secret is configured \
             (set AUTH_API_SECRETS_JSON or AUTH_API_SECRET)"
                .to_string(),
        );
    }

    let mut seen = HashSet::new();
    for entry in &config.auth_api_secrets {
        if entry.id.trim().is_empty() {
            return Err("API secret entries must have a non-empty id".to_string());
        }
        if entry.secret.is_empty() {
            return Err(format!("API secret '{}' is empty", entry.id));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(format!("Duplicate API secret id: {}", entry.id));
        }
    }
    Ok(())
}

fn validate_urls(config: &ServerConfig) -> Result<(), String> {
    if let Some(public_url) = &config.public_url {
        validate_http_url("PUBLIC_URL", public_url)?;
    }
    validate_http_url("OPENAI_BASE_URL", &config.gateways.openai_base_url)?;
    validate_http_url("ELEVENLABS_BASE_URL", &config.gateways.elevenlabs_base_url)?;
    Ok(())
}

fn validate_http_url(name: &str, raw: &str) -> Result<(), String> {
    let parsed = Url::parse(raw).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{name} must use http or https, got '{other}'")),
    }
}

fn validate_limits(config: &ServerConfig) -> Result<(), String> {
    let gateways = &config.gateways;
    let conversation = &config.conversation;

    let non_zero = [
        ("TRANSCRIPTION_TIMEOUT_MS", gateways.transcription_timeout_ms),
        ("GENERATION_TIMEOUT_MS", gateways.generation_timeout_ms),
        ("SYNTHESIS_TIMEOUT_MS", gateways.synthesis_timeout_ms),
        ("SESSION_TTL_SECONDS", conversation.session_ttl_seconds),
        (
            "SESSION_EVICTION_INTERVAL_SECONDS",
            conversation.eviction_interval_seconds,
        ),
        ("AUDIO_CACHE_TTL_SECONDS", config.audio_cache_ttl_seconds),
        ("AUDIO_CACHE_MAX_ENTRIES", config.audio_cache_max_entries),
        (
            "RATE_LIMIT_REQUESTS_PER_SECOND",
            u64::from(config.rate_limit_requests_per_second),
        ),
        ("RATE_LIMIT_BURST_SIZE", u64::from(config.rate_limit_burst_size)),
        (
            "GENERATION_MAX_TOKENS",
            u64::from(gateways.generation_max_tokens),
        ),
    ];

    for (name, value) in non_zero {
        if value == 0 {
            return Err(format!("{name} must be greater than zero"));
        }
    }

    if conversation.max_empty_turns == 0 {
        return Err("MAX_EMPTY_TURNS must be at least 1".to_string());
    }
    if gateways.synthesis_voice_id.contains('/') {
        return Err("SYNTHESIS_VOICE_ID must not contain '/'".to_string());
    }
    Ok(())
}
