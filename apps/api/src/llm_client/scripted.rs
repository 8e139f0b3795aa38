//! In-process `TextModel` that replays canned responses, for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{LlmError, TextModel};

enum Reply {
    Text(String),
    Held(String, Arc<Notify>),
    Fail(u16),
}

/// Replays queued replies in order and records every call it receives.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Text(text.to_string()));
        self
    }

    /// Queues a reply that is only returned once `release` is notified.
    pub fn reply_after(self, text: &str, release: Arc<Notify>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Held(text.to_string(), release));
        self
    }

    /// Queues a provider error with the given HTTP status.
    pub fn fail(self, status: u16) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Fail(status));
        self
    }

    /// Prompts received so far, with their output budgets.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_output_tokens));
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Held(text, release)) => {
                release.notified().await;
                Ok(text)
            }
            Some(Reply::Fail(status)) => Err(LlmError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(LlmError::EmptyContent),
        }
    }
}
