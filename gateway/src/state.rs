use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::audio::{AudioClipCache, ReplyVoicer};
use crate::core::gateway::{
    ElevenLabsSynthesizer, OpenAIGenerator, OpenAITranscriber, RecordingFetcher,
    ResponseGenerator, SpeechSynthesizer, TranscriptionGateway,
};
use crate::core::session::{InMemorySessionStore, SessionLocks, SessionStore};
use crate::core::turn::TurnController;
use crate::errors::app_error::AppError;

/// Shared application state handed to every handler
pub struct AppState {
    pub config: ServerConfig,
    pub controller: TurnController,
    pub voicer: ReplyVoicer,
    pub transcriber: Option<Arc<dyn TranscriptionGateway>>,
    pub recordings: RecordingFetcher,
}

impl AppState {
    /// Build state with provider gateways for every configured API key
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, AppError> {
        Self::builder(config).provider_gateways()?.build()
    }

    pub fn builder(config: ServerConfig) -> AppStateBuilder {
        AppStateBuilder {
            config,
            store: None,
            locks: None,
            generator: None,
            transcriber: None,
            synthesizer: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        self.controller.store()
    }

    pub fn locks(&self) -> &Arc<SessionLocks> {
        self.controller.locks()
    }

    /// Absolute (or root-relative) URL of the voice webhook, used as the Gather action
    pub fn voice_action(&self) -> String {
        self.config.url_for("/voice")
    }
}

/// Assembles [`AppState`], letting tests inject gateways and stores
pub struct AppStateBuilder {
    config: ServerConfig,
    store: Option<Arc<dyn SessionStore>>,
    locks: Option<Arc<SessionLocks>>,
    generator: Option<Arc<dyn ResponseGenerator>>,
    transcriber: Option<Arc<dyn TranscriptionGateway>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl AppStateBuilder {
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn session_locks(mut self, locks: Arc<SessionLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn transcriber(mut self, transcriber: Arc<dyn TranscriptionGateway>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Construct HTTP gateways for each provider whose API key is configured.
    ///
    /// Gateways already injected are left untouched.
    pub fn provider_gateways(mut self) -> Result<Self, AppError> {
        let gateways = &self.config.gateways;

        match self.config.get_api_key("openai") {
            Ok(key) => {
                if self.generator.is_none() {
                    self.generator = Some(Arc::new(OpenAIGenerator::new(key.clone(), gateways)?));
                }
                if self.transcriber.is_none() {
                    self.transcriber = Some(Arc::new(OpenAITranscriber::new(key, gateways)?));
                }
                info!(model = %gateways.generation_model, "OpenAI gateways configured");
            }
            Err(_) if self.generator.is_none() => {
                warn!("OPENAI_API_KEY not set; every reply will use the fallback text");
            }
            Err(_) => {}
        }

        match self.config.get_api_key("elevenlabs") {
            Ok(key) if self.synthesizer.is_none() => {
                self.synthesizer = Some(Arc::new(ElevenLabsSynthesizer::new(key, gateways)?));
                info!(voice_id = %gateways.synthesis_voice_id, "ElevenLabs synthesis configured");
            }
            Ok(_) => {}
            Err(_) => info!("ELEVENLABS_API_KEY not set; replies will be spoken with <Say>"),
        }

        Ok(self)
    }

    pub fn build(self) -> Result<Arc<AppState>, AppError> {
        let config = self.config;

        let store = self.store.unwrap_or_else(|| {
            Arc::new(InMemorySessionStore::new(config.conversation.session_ttl()))
        });
        let locks = self.locks.unwrap_or_default();

        let controller = TurnController::new(
            store,
            locks,
            self.generator,
            &config.conversation,
            config.gateways.generation_timeout(),
        )
        .map_err(|e| AppError::Internal(format!("invalid goodbye phrases: {e}")))?;

        let cache = AudioClipCache::new(
            config.audio_cache_max_entries,
            Duration::from_secs(config.audio_cache_ttl_seconds),
        );
        let voicer = ReplyVoicer::new(
            self.synthesizer,
            cache,
            config.gateways.synthesis_voice_id.clone(),
            config.gateways.synthesis_timeout(),
            config.public_url.clone(),
        );

        let recordings = RecordingFetcher::new(
            config.twilio_credentials(),
            config.allow_insecure_recording_urls,
            config.gateways.transcription_timeout(),
        )?;

        Ok(Arc::new(AppState {
            config,
            controller,
            voicer,
            transcriber: self.transcriber,
            recordings,
        }))
    }
}
