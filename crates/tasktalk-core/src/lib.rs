pub mod ai;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod permission;
pub mod provider;
pub mod saved_state;
pub mod screens;
pub mod speech;
pub mod state;
pub mod statistics;
pub mod task;

// Re-export main types for convenience
pub use ai::{CompletionSource, GeminiClient, OllamaClient};
pub use config::Config;
pub use controller::{Collaborators, ControllerEvent, ControllerHandle, ConversationController};
pub use db::{ChatRepository, Database, SqliteChatRepository, SqliteTaskRepository, TaskRepository};
pub use error::{Result, TaskTalkError};
pub use permission::{ConfigPermission, MicrophonePermission, MicrophoneStatus};
pub use provider::Provider;
pub use saved_state::{JsonSavedState, MemorySavedState, SavedState};
pub use speech::{CommandRecognizer, CommandSpeechSink, RecognitionSource, SpeechSink};
pub use state::{
    ChatTurn, CompletionResult, ConversationPhase, ConversationState, Direction, InteractionMode,
    Prompt,
};
pub use statistics::TaskStatistics;
pub use task::{Task, TaskFilter};
