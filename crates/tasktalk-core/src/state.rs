//! UI-agnostic conversation state types
//!
//! These are shared between the controller and any front-end that renders
//! the chat screen. Nothing here depends on a UI framework.

use serde::{Deserialize, Serialize};

/// One persisted message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: i64,
    pub text: String,
    pub direction: Direction,
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    /// Column value used by the `chat_message` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sent => "SEND",
            Direction::Received => "RECEIVE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SEND" => Some(Direction::Sent),
            "RECEIVE" => Some(Direction::Received),
            _ => None,
        }
    }
}

/// Outbound request shape for a completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Multi-turn chat: the fixed coaching history followed by this text.
    Freeform(String),
    /// A single structured instruction block ending with this text.
    Structured(String),
}

/// Reply from a completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    Success(String),
    Failure(String),
}

/// How the current exchange was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InteractionMode {
    #[default]
    Text,
    Voice,
}

/// Where the turn-taking state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversationPhase {
    /// Idle, waiting for typed text or a microphone tap.
    #[default]
    Typing,
    /// Waiting on the completion provider.
    Loading,
    /// Waiting on the speech recognizer.
    Listening,
    /// Reading the reply aloud.
    Speaking,
}

impl ConversationPhase {
    pub fn label(&self) -> &'static str {
        match self {
            ConversationPhase::Typing => "Typing",
            ConversationPhase::Loading => "Thinking",
            ConversationPhase::Listening => "Listening",
            ConversationPhase::Speaking => "Speaking",
        }
    }
}

/// Microphone permission dialog state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPrompt {
    pub visible: bool,
    pub rationale: Option<String>,
}

/// Snapshot published to the UI after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub turns: Vec<ChatTurn>,
    pub pending_input: String,
    pub last_error: Option<String>,
    pub mode: InteractionMode,
    pub phase: ConversationPhase,
    pub permission_prompt: PermissionPrompt,
}

impl ConversationState {
    /// The UI should refuse new input while a reply is outstanding.
    pub fn input_enabled(&self) -> bool {
        self.phase != ConversationPhase::Loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_column_values_round_trip() {
        assert_eq!(Direction::from_str(Direction::Sent.as_str()), Some(Direction::Sent));
        assert_eq!(Direction::from_str("RECEIVE"), Some(Direction::Received));
        assert_eq!(Direction::from_str("send"), None);
    }

    #[test]
    fn default_state_is_idle_text_mode() {
        let state = ConversationState::default();
        assert_eq!(state.phase, ConversationPhase::Typing);
        assert_eq!(state.mode, InteractionMode::Text);
        assert!(state.input_enabled());
        assert!(!state.permission_prompt.visible);
    }
}
