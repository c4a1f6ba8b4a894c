//! Scripted chat model for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{ChatMessage, ChatModel};

/// Replays canned replies in order and records every conversation it saw
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, String>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Queue an error reply
    pub fn then_fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Conversations received so far
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }

    /// Concatenated content of the n-th call
    pub fn prompt(&self, index: usize) -> String {
        self.calls()
            .get(index)
            .map(|msgs| {
                msgs.iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Err(anyhow::anyhow!("scripted chat exhausted")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
