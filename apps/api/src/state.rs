use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::TextModel;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Hosted model behind every generation stage. Default: Gemini `LlmClient`.
    pub model: Arc<dyn TextModel>,
    pub sessions: SessionStore,
    pub config: Config,
}
