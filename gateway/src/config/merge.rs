use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{AuthApiSecret, ServerConfig, TlsConfig};

/// Merge YAML configuration over the environment-derived configuration
///
/// Every value present in YAML replaces the corresponding environment value.
/// Sections or fields that YAML omits keep their environment (or default) value.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = super::env::load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if server.public_url.is_some() {
            config.public_url = server.public_url;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                Some(true) => {
                    let (Some(cert), Some(key)) = (tls.cert_path, tls.key_path) else {
                        return Err(
                            "server.tls.enabled is true but cert_path or key_path is missing"
                                .into(),
                        );
                    };
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    });
                }
                None => {}
            }
        }
    }

    if let Some(providers) = yaml.providers {
        if providers.openai_api_key.is_some() {
            config.openai_api_key = providers.openai_api_key;
        }
        if providers.elevenlabs_api_key.is_some() {
            config.elevenlabs_api_key = providers.elevenlabs_api_key;
        }
        if providers.twilio_account_sid.is_some() {
            config.twilio_account_sid = providers.twilio_account_sid;
        }
        if providers.twilio_auth_token.is_some() {
            config.twilio_auth_token = providers.twilio_auth_token;
        }
    }

    if let Some(gateways) = yaml.gateways {
        let target = &mut config.gateways;
        if let Some(v) = gateways.openai_base_url {
            target.openai_base_url = v;
        }
        if let Some(v) = gateways.elevenlabs_base_url {
            target.elevenlabs_base_url = v;
        }
        if let Some(v) = gateways.transcription_model {
            target.transcription_model = v;
        }
        if let Some(v) = gateways.generation_model {
            target.generation_model = v;
        }
        if let Some(v) = gateways.generation_max_tokens {
            target.generation_max_tokens = v;
        }
        if let Some(v) = gateways.system_prompt {
            target.system_prompt = v;
        }
        if let Some(v) = gateways.synthesis_voice_id {
            target.synthesis_voice_id = v;
        }
        if gateways.synthesis_model_id.is_some() {
            target.synthesis_model_id = gateways.synthesis_model_id;
        }
        if gateways.speech_language.is_some() {
            target.speech_language = gateways.speech_language;
        }
        if let Some(v) = gateways.transcription_timeout_ms {
            target.transcription_timeout_ms = v;
        }
        if let Some(v) = gateways.generation_timeout_ms {
            target.generation_timeout_ms = v;
        }
        if let Some(v) = gateways.synthesis_timeout_ms {
            target.synthesis_timeout_ms = v;
        }
    }

    if let Some(conversation) = yaml.conversation {
        let target = &mut config.conversation;
        if let Some(v) = conversation.session_ttl_seconds {
            target.session_ttl_seconds = v;
        }
        if let Some(v) = conversation.eviction_interval_seconds {
            target.eviction_interval_seconds = v;
        }
        if let Some(v) = conversation.max_empty_turns {
            target.max_empty_turns = v;
        }
        if let Some(phrases) = conversation.goodbye_phrases {
            target.goodbye_phrases = phrases
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(v) = conversation.greeting_text {
            target.greeting_text = v;
        }
        if let Some(v) = conversation.closing_text {
            target.closing_text = v;
        }
        if let Some(v) = conversation.fallback_text {
            target.fallback_text = v;
        }
        if let Some(v) = conversation.reprompt_text {
            target.reprompt_text = v;
        }
    }

    if let Some(cache) = yaml.audio_cache {
        if let Some(v) = cache.ttl_seconds {
            config.audio_cache_ttl_seconds = v;
        }
        if let Some(v) = cache.max_entries {
            config.audio_cache_max_entries = v;
        }
    }

    if let Some(recordings) = yaml.recordings
        && let Some(v) = recordings.allow_insecure_urls
    {
        config.allow_insecure_recording_urls = v;
    }

    if let Some(auth) = yaml.auth {
        if let Some(required) = auth.required {
            config.auth_required = required;
        }
        if !auth.api_secrets.is_empty() {
            config.auth_api_secrets = auth
                .api_secrets
                .into_iter()
                .map(|entry| AuthApiSecret {
                    id: entry.id,
                    secret: entry.secret,
                })
                .collect();
        } else if let Some(secret) = auth.api_secret {
            config.auth_api_secrets = vec![AuthApiSecret {
                id: "default".to_string(),
                secret,
            }];
        }
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
        if let Some(v) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = v;
        }
        if let Some(v) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = v;
        }
    }

    Ok(config)
}
