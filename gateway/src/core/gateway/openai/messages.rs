//! OpenAI API request and response types.

use serde::{Deserialize, Serialize};

use crate::core::session::{Role, Turn};

// =============================================================================
// Transcription
// =============================================================================

/// Response from `/v1/audio/transcriptions` with `response_format=json`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// Container formats accepted by Whisper, detected from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioInputFormat {
    #[default]
    Wav,
    Mp3,
    Ogg,
    Webm,
}

impl AudioInputFormat {
    /// Sniff the container from magic bytes. Unknown data is sent as WAV.
    pub fn detect(audio: &[u8]) -> Self {
        match audio {
            [b'R', b'I', b'F', b'F', ..] => Self::Wav,
            [b'I', b'D', b'3', ..] => Self::Mp3,
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Self::Mp3,
            [b'O', b'g', b'g', b'S', ..] => Self::Ogg,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Self::Webm,
            _ => Self::Wav,
        }
    }

    #[inline]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::Webm => "audio/webm",
        }
    }

    #[inline]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Wav => "recording.wav",
            Self::Mp3 => "recording.mp3",
            Self::Ogg => "recording.ogg",
            Self::Webm => "recording.webm",
        }
    }
}

// =============================================================================
// Chat Completions
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn system(content: &'a str) -> Self {
        Self {
            role: "system",
            content,
        }
    }

    pub fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }

    /// Caller turns become `user` messages and system turns `assistant` messages
    pub fn from_turn(turn: &'a Turn) -> Self {
        let role = match turn.role {
            Role::Caller => "user",
            Role::System => "assistant",
        };
        Self {
            role,
            content: &turn.text,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed content of the first choice, if non-empty
    pub fn reply(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// OpenAI API error response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIError,
}

/// OpenAI API error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIError {
    pub message: String,

    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,
}

/// Human-readable detail for an error body, preferring the structured OpenAI form
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => match parsed.error.error_type {
            Some(kind) => format!("{} ({kind})", parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.chars().take(200).collect(),
    }
}
