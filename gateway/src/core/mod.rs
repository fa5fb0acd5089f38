pub mod audio;
pub mod gateway;
pub mod markup;
pub mod session;
pub mod turn;

// Re-export commonly used types for convenience
pub use audio::{AudioClipCache, ReplyVoicer, clip_id};
pub use gateway::{
    GatewayError, ResponseGenerator, SpeechSynthesizer, TranscriptionGateway,
};
pub use markup::{MarkupError, Spoken, VoiceResponse};
pub use session::{
    InMemorySessionStore, Role, Session, SessionError, SessionLocks, SessionStatus, SessionStore,
    Turn,
};
pub use turn::{TurnController, TurnOutcome, TurnState};
