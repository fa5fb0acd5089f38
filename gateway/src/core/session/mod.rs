//! Per-call conversation sessions
//!
//! - [`SessionStore`]: storage trait, injected as `Arc<dyn SessionStore>`
//! - [`InMemorySessionStore`]: sharded in-memory implementation with idle TTL
//! - [`SessionLocks`]: keyed async locks that serialize turns within a session
//! - [`spawn_eviction_task`]: background sweep of idle sessions

mod eviction;
mod locks;
mod memory;
mod store;
mod types;

pub use eviction::spawn_eviction_task;
pub use locks::{SessionGuard, SessionLocks};
pub use memory::InMemorySessionStore;
pub use store::SessionStore;
pub use types::{Role, Session, SessionError, SessionStatus, Turn};
