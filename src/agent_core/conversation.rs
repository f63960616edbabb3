//! ConversationHistory: the running message history across turns.
//!
//! Responsibilities:
//! - Hold the ordered `ConversationMessage`s for one conversation
//! - Cap the history to the most recent entries between turns
//! - Keep the window well-formed after trimming (no orphaned tool results)
//! - Build `Vec<ChatMessage>` for the inference client

use crate::inference::types::ChatMessage;

use super::types::{ConversationMessage, DEFAULT_HISTORY_LIMIT};

// ─── ConversationHistory ────────────────────────────────────────────────────

/// Ordered conversation history with an entry cap.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<ConversationMessage>,
    limit: usize,
}

impl ConversationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything after the first `len` entries (turn rollback).
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Drop the oldest entries until at most `limit` remain.
    ///
    /// Tool results left at the front without their request are dropped
    /// too, so the window may end up shorter than the limit. Call between
    /// turns only: trimming mid-round could split a request from its
    /// results at the back.
    pub fn trim(&mut self) -> usize {
        let before = self.messages.len();

        if self.messages.len() > self.limit {
            let excess = self.messages.len() - self.limit;
            self.messages.drain(..excess);
        }

        let orphans = self
            .messages
            .iter()
            .take_while(|m| m.is_tool_result())
            .count();
        if orphans > 0 {
            self.messages.drain(..orphans);
        }

        let dropped = before - self.messages.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = self.messages.len(), "trimmed conversation history");
        }
        dropped
    }

    /// Wire messages for the next model request.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(|m| m.to_chat_message()).collect()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
