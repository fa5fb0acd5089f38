//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `audio` - Synthesized clip download
//! - `conversation` - Transcript inspection, text turns and explicit end
//! - `voice` - Telephony voice webhook and status callback

pub mod api;
pub mod audio;
pub mod conversation;
pub mod voice;

pub use voice::{voice_status, voice_webhook};
