//! Seam to the natural-language interpreter.
//!
//! The interpreter is a black box: it takes the conversation so far plus a
//! schema description and returns raw structured output as a string. Parsing
//! that output into an intent (and degrading gracefully when it is garbage)
//! happens on our side, in `voxcrm_core::intent`.

use anyhow::Result;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(&self, messages: &[ChatMessage], schema: &str) -> Result<String>;
}
