//! Speech recognition and text-to-speech collaborators.
//!
//! Both are callback driven: a session is started with a listener and the
//! outcome arrives later on whatever task the implementation runs. Listeners
//! must be cheap and non-blocking; the controller's listener only forwards
//! into its event channel.

pub mod command;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use command::{CommandRecognizer, CommandSpeechSink};

/// Receives the outcome of one listening session.
pub trait RecognitionListener: Send + Sync {
    fn on_result(&self, text: String);
    fn on_error(&self, message: String);
}

/// Speech-to-text. At most one result is delivered per start/stop cycle, and
/// nothing is guaranteed to arrive once `stop_listening` has been called.
#[async_trait]
pub trait RecognitionSource: Send + Sync {
    fn is_available(&self) -> bool;
    async fn start_listening(&self, listener: Arc<dyn RecognitionListener>) -> Result<()>;
    async fn stop_listening(&self);
}

/// Progress of one `speak` call.
pub trait SpeechListener: Send + Sync {
    fn on_start(&self);
    fn on_done(&self);
    fn on_error(&self, message: String);
}

/// Text-to-speech. Exactly one of `on_done`/`on_error` fires per `speak`
/// unless the utterance is interrupted with `stop`.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str, listener: Arc<dyn SpeechListener>) -> Result<()>;
    async fn stop(&self);
    /// Release the engine; later `speak` calls fail.
    async fn shutdown(&self);
}
