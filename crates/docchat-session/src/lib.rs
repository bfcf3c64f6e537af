//! # docchat-session
//!
//! Everything a docchat session keeps in memory and how it stays in step
//! with the server.
//!
//! - [`SessionState`]: stores, active store, File Map, models and transcript
//! - [`StateSync`]: store/file/model refreshes, store lifecycle, API key
//! - [`Conversation`]: chat turns, placeholder handling, clear and welcome
//! - [`render`]: HTML and terminal rendering with citation resolution
//! - [`spawn_heartbeat`]: the periodic liveness ping
//!
//! A [`Session`] wires these together around one [`KnowledgeApi`].

use std::sync::Arc;

use docchat_core::KnowledgeApi;

pub mod config;
pub mod conversation;
pub mod heartbeat;
pub mod render;
pub mod state;
pub mod sync;
pub mod templates;

pub use config::SessionConfig;
pub use conversation::{Conversation, SendOutcome};
pub use heartbeat::{spawn_heartbeat, HeartbeatConfig, HeartbeatHandle};
pub use render::CitationFallback;
pub use state::{FileListing, SessionState};
pub use sync::StateSync;
pub use templates::Template;

/// One connected session: shared state plus the components that act on it.
pub struct Session {
    pub api: Arc<dyn KnowledgeApi>,
    pub state: Arc<SessionState>,
    pub sync: StateSync,
    pub conversation: Arc<Conversation>,
    pub config: SessionConfig,
}

impl Session {
    pub fn new(api: Arc<dyn KnowledgeApi>, config: SessionConfig) -> Self {
        let state = Arc::new(SessionState::new(config.pending_store_ttl));
        let sync = StateSync::new(api.clone(), state.clone());
        let conversation = Arc::new(
            Conversation::new(api.clone(), state.clone())
                .with_citation_fallback(config.citation_fallback)
                .with_reseed_on_clear(config.reseed_on_clear),
        );
        Self {
            api,
            state,
            sync,
            conversation,
            config,
        }
    }

    /// Start the heartbeat configured for this session.
    pub fn start_heartbeat(&self) -> Option<HeartbeatHandle> {
        spawn_heartbeat(self.api.clone(), &self.config.heartbeat)
    }
}
