//! Synthesized reply audio: a short-lived clip cache and the voicer that fills it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_128;

use crate::core::gateway::{SpeechSynthesizer, with_timeout};
use crate::core::markup::Spoken;

/// Content address of a clip: 128-bit xxh3 of `voice_id|text`, hex encoded
pub fn clip_id(voice_id: &str, text: &str) -> String {
    let mut key = String::with_capacity(voice_id.len() + text.len() + 1);
    key.push_str(voice_id);
    key.push('|');
    key.push_str(text);
    let hash = xxh3_128(key.as_bytes());
    format!("{hash:032x}")
}

/// Clip ids are exactly 32 lowercase hex digits
pub fn is_valid_clip_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Bounded, expiring store of synthesized clips served back to the telephony provider
#[derive(Clone)]
pub struct AudioClipCache {
    clips: Cache<String, Bytes>,
}

impl AudioClipCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            clips: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Bytes> {
        self.clips.get(id).await
    }

    pub async fn insert(&self, id: String, audio: Bytes) {
        self.clips.insert(id, audio).await;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clips.contains_key(id)
    }
}

/// Turns reply text into something the caller hears.
///
/// With a synthesizer the reply is synthesized (or reused from the cache) and
/// played from `/audio/{id}.mp3`. Without one, or when synthesis fails, the
/// text is spoken with `<Say>`.
pub struct ReplyVoicer {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    cache: AudioClipCache,
    voice_id: String,
    timeout: Duration,
    public_url: Option<String>,
}

impl ReplyVoicer {
    pub fn new(
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        cache: AudioClipCache,
        voice_id: String,
        timeout: Duration,
        public_url: Option<String>,
    ) -> Self {
        Self {
            synthesizer,
            cache,
            voice_id,
            timeout,
            public_url: public_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn cache(&self) -> &AudioClipCache {
        &self.cache
    }

    pub async fn voice(&self, text: &str) -> Spoken {
        let Some(synthesizer) = &self.synthesizer else {
            return Spoken::Say(text.to_string());
        };

        let id = clip_id(&self.voice_id, text);
        if self.cache.contains(&id) {
            debug!(clip_id = %id, "Reusing cached clip");
            return Spoken::Play(self.clip_url(&id));
        }

        match with_timeout(self.timeout, synthesizer.synthesize(text, &self.voice_id)).await {
            Ok(audio) => {
                debug!(clip_id = %id, bytes = audio.len(), "Cached synthesized clip");
                self.cache.insert(id.clone(), audio).await;
                Spoken::Play(self.clip_url(&id))
            }
            Err(e) => {
                warn!(
                    synthesizer = synthesizer.name(),
                    error = %e,
                    "Speech synthesis failed, falling back to <Say>"
                );
                Spoken::Say(text.to_string())
            }
        }
    }

    fn clip_url(&self, id: &str) -> String {
        format!("{}/audio/{id}.mp3", self.public_url.as_deref().unwrap_or(""))
    }
}
