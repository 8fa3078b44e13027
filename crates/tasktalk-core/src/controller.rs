//! Turn-taking controller for the chat screen.
//!
//! The controller is the only writer of [`ConversationState`]. UI actions and
//! collaborator callbacks all arrive as [`ControllerEvent`]s on one channel
//! and are applied by [`ConversationController::handle`], one at a time.
//! Each `Loading`, `Listening` or `Speaking` phase is paired with exactly one
//! outstanding external call, and the phase changes before that call is made.
//!
//! Callbacks carry the generation they were issued under. `stop()` bumps the
//! generation and aborts an outstanding completion, so anything that arrives
//! from an earlier session is dropped instead of reopening `Speaking` or
//! `Listening`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ai::CompletionSource;
use crate::db::ChatRepository;
use crate::permission::{MicrophonePermission, MicrophoneStatus};
use crate::saved_state::{SavedState, USER_LAST_INPUT_KEY};
use crate::speech::{RecognitionListener, RecognitionSource, SpeechListener, SpeechSink};
use crate::state::{
    ChatTurn, CompletionResult, ConversationPhase, ConversationState, Direction, InteractionMode,
    PermissionPrompt, Prompt,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    UpdatePendingInput(String),
    /// Send the pending input.
    Submit,
    ToggleMicrophone,
    Stop,
    DismissPermissionPrompt,
    RecordPermissionRationale(String),
    GrantMicrophone,
    DenyMicrophone,
    ClearHistory,
    Shutdown,

    Recognized { generation: u64, text: String },
    RecognitionFailed { generation: u64, message: String },
    CompletionFinished { request: u64, result: CompletionResult },
    SpeechStarted { generation: u64 },
    SpeechFinished { generation: u64, error: Option<String> },
}

/// Everything the controller talks to, injected by the caller.
#[derive(Clone)]
pub struct Collaborators {
    pub chats: Arc<dyn ChatRepository>,
    pub completion: Arc<dyn CompletionSource>,
    pub recognizer: Arc<dyn RecognitionSource>,
    pub speech: Arc<dyn SpeechSink>,
    pub permission: Arc<dyn MicrophonePermission>,
    pub saved_state: Arc<dyn SavedState>,
}

struct InFlight {
    request: u64,
    task: JoinHandle<()>,
}

/// Forwards collaborator callbacks into the controller's event channel.
struct EventForwarder {
    generation: u64,
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl EventForwarder {
    fn send(&self, event: ControllerEvent) {
        if self.tx.send(event).is_err() {
            debug!("controller gone; dropping callback");
        }
    }
}

impl RecognitionListener for EventForwarder {
    fn on_result(&self, text: String) {
        self.send(ControllerEvent::Recognized {
            generation: self.generation,
            text,
        });
    }

    fn on_error(&self, message: String) {
        self.send(ControllerEvent::RecognitionFailed {
            generation: self.generation,
            message,
        });
    }
}

impl SpeechListener for EventForwarder {
    fn on_start(&self) {
        self.send(ControllerEvent::SpeechStarted {
            generation: self.generation,
        });
    }

    fn on_done(&self) {
        self.send(ControllerEvent::SpeechFinished {
            generation: self.generation,
            error: None,
        });
    }

    fn on_error(&self, message: String) {
        self.send(ControllerEvent::SpeechFinished {
            generation: self.generation,
            error: Some(message),
        });
    }
}

pub struct ConversationController {
    deps: Collaborators,
    events: mpsc::UnboundedSender<ControllerEvent>,
    state: ConversationState,
    state_tx: watch::Sender<ConversationState>,
    turns_rx: watch::Receiver<Vec<ChatTurn>>,
    generation: u64,
    next_request: u64,
    in_flight: Option<InFlight>,
}

impl ConversationController {
    /// Build a controller and the receiving end of its event channel.
    ///
    /// Pending input is restored from saved state.
    pub fn new(deps: Collaborators) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let mut turns_rx = deps.chats.observe();
        let state = ConversationState {
            turns: turns_rx.borrow_and_update().clone(),
            pending_input: deps.saved_state.get(USER_LAST_INPUT_KEY).unwrap_or_default(),
            ..ConversationState::default()
        };
        let (state_tx, _) = watch::channel(state.clone());

        let controller = Self {
            deps,
            events,
            state,
            state_tx,
            turns_rx,
            generation: 0,
            next_request: 0,
            in_flight: None,
        };
        (controller, rx)
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_tx.subscribe()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<ControllerEvent> {
        self.events.clone()
    }

    /// Run the controller on its own task.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<ControllerEvent>) -> ControllerHandle {
        let tx = self.sender();
        let state_rx = self.subscribe();
        let task = tokio::spawn(self.run(rx));
        ControllerHandle { tx, state_rx, task }
    }

    /// Apply events until `Shutdown`, re-deriving turns whenever the store changes.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControllerEvent>) {
        let mut store_open = true;
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ControllerEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event).await,
                },
                changed = self.turns_rx.changed(), if store_open => {
                    if changed.is_err() {
                        warn!("chat store closed; turns will no longer refresh");
                        store_open = false;
                    } else {
                        self.sync_turns();
                        self.publish();
                    }
                }
            }
        }
        self.release().await;
        info!("conversation controller stopped");
    }

    /// The single transition function.
    pub async fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::UpdatePendingInput(text) => self.update_pending_input(text),
            ControllerEvent::Submit => self.submit().await,
            ControllerEvent::ToggleMicrophone => self.toggle_microphone().await,
            ControllerEvent::Stop => self.stop().await,
            ControllerEvent::DismissPermissionPrompt => {
                self.state.permission_prompt.visible = false;
                self.publish();
            }
            ControllerEvent::RecordPermissionRationale(message) => {
                self.state.permission_prompt.rationale = Some(message);
                self.publish();
            }
            ControllerEvent::GrantMicrophone => {
                self.deps.permission.grant().await;
                self.state.permission_prompt = PermissionPrompt::default();
                self.publish();
                self.toggle_microphone().await;
            }
            ControllerEvent::DenyMicrophone => {
                self.deps.permission.deny().await;
                self.state.permission_prompt.visible = false;
                self.publish();
            }
            ControllerEvent::ClearHistory => self.clear_history().await,
            ControllerEvent::Shutdown => self.release().await,

            ControllerEvent::Recognized { generation, text } => {
                if self.is_current(generation, ConversationPhase::Listening) {
                    self.on_utterance(text).await;
                } else {
                    debug!(generation, "stale recognition result dropped");
                }
            }
            ControllerEvent::RecognitionFailed { generation, message } => {
                if self.is_current(generation, ConversationPhase::Listening) {
                    warn!(%message, "speech recognition failed");
                    self.state.last_error = Some(message);
                    self.state.mode = InteractionMode::Text;
                    self.set_phase(ConversationPhase::Typing);
                }
            }
            ControllerEvent::CompletionFinished { request, result } => {
                match self.in_flight.take() {
                    Some(in_flight) if in_flight.request == request => {
                        self.on_completion(result).await;
                    }
                    other => {
                        self.in_flight = other;
                        debug!(request, "reply for a superseded request dropped");
                    }
                }
            }
            ControllerEvent::SpeechStarted { generation } => {
                debug!(generation, "speaking");
            }
            ControllerEvent::SpeechFinished { generation, error } => {
                if self.is_current(generation, ConversationPhase::Speaking) {
                    if let Some(message) = error {
                        warn!(%message, "speech output failed");
                    }
                    self.deps.speech.stop().await;
                    self.begin_listening().await;
                }
            }
        }
    }

    fn is_current(&self, generation: u64, phase: ConversationPhase) -> bool {
        generation == self.generation && self.state.phase == phase
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn set_phase(&mut self, phase: ConversationPhase) {
        if self.state.phase != phase {
            info!(from = ?self.state.phase, to = ?phase, mode = ?self.state.mode, "conversation phase");
        }
        self.state.phase = phase;
        self.publish();
    }

    fn sync_turns(&mut self) {
        self.state.turns = self.turns_rx.borrow_and_update().clone();
    }

    fn update_pending_input(&mut self, text: String) {
        self.deps.saved_state.set(USER_LAST_INPUT_KEY, &text);
        self.state.pending_input = text;
        self.publish();
    }

    async fn submit(&mut self) {
        if self.in_flight.is_some() {
            info!("reply still outstanding; submit ignored");
            return;
        }
        let text = self.state.pending_input.trim().to_string();
        if text.is_empty() {
            debug!("empty input ignored");
            return;
        }

        match self.state.phase {
            ConversationPhase::Listening => self.deps.recognizer.stop_listening().await,
            ConversationPhase::Speaking => self.deps.speech.stop().await,
            _ => {}
        }
        self.generation += 1;
        self.state.mode = InteractionMode::Text;
        self.state.last_error = None;

        self.persist(&text, Direction::Sent).await;
        self.update_pending_input(String::new());
        self.set_phase(ConversationPhase::Loading);
        self.request_completion(Prompt::Structured(text));
    }

    async fn toggle_microphone(&mut self) {
        if !self.state.pending_input.trim().is_empty() {
            self.submit().await;
            return;
        }

        match self.state.phase {
            ConversationPhase::Typing => {}
            ConversationPhase::Listening | ConversationPhase::Speaking => {
                self.stop().await;
                return;
            }
            ConversationPhase::Loading => {
                debug!("microphone ignored while waiting for a reply");
                return;
            }
        }

        if !self.deps.recognizer.is_available() {
            warn!("speech recognizer is not available");
            return;
        }

        if self.deps.permission.status() != MicrophoneStatus::Granted {
            info!("microphone permission required");
            self.state.permission_prompt = PermissionPrompt {
                visible: true,
                rationale: self.deps.permission.rationale(),
            };
            self.publish();
            return;
        }

        self.state.mode = InteractionMode::Voice;
        self.state.last_error = None;
        self.begin_listening().await;
    }

    async fn stop(&mut self) {
        self.generation += 1;
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            info!(request = in_flight.request, "outstanding reply cancelled");
        }
        self.deps.recognizer.stop_listening().await;
        self.deps.speech.stop().await;
        self.state.mode = InteractionMode::Text;
        self.set_phase(ConversationPhase::Typing);
    }

    async fn clear_history(&mut self) {
        if let Err(e) = self.deps.chats.clear().await {
            warn!(error = %e, "failed to clear chat history");
            self.state.last_error = Some(format!("could not clear history: {e}"));
        }
        self.sync_turns();
        self.publish();
    }

    /// Stop everything, release the speech engine and write pending input.
    async fn release(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        self.generation += 1;
        self.deps.recognizer.stop_listening().await;
        self.deps.speech.shutdown().await;
        if let Err(e) = self.deps.saved_state.flush().await {
            warn!(error = %e, "failed to write unsent input");
        }
    }

    async fn on_utterance(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            debug!("empty utterance ignored");
            self.state.mode = InteractionMode::Text;
            self.set_phase(ConversationPhase::Typing);
            return;
        }

        self.persist(&text, Direction::Sent).await;
        self.set_phase(ConversationPhase::Loading);
        self.request_completion(Prompt::Freeform(text));
    }

    async fn on_completion(&mut self, result: CompletionResult) {
        let reply = match result {
            CompletionResult::Success(text) if !text.trim().is_empty() => text.trim().to_string(),
            CompletionResult::Success(_) => {
                self.on_completion_failure("empty reply".to_string()).await;
                return;
            }
            CompletionResult::Failure(message) => {
                self.on_completion_failure(message).await;
                return;
            }
        };

        self.persist(&reply, Direction::Received).await;
        match self.state.mode {
            InteractionMode::Voice => {
                self.set_phase(ConversationPhase::Speaking);
                let listener = Arc::new(self.forwarder());
                if let Err(e) = self.deps.speech.speak(&reply, listener).await {
                    warn!(error = %e, "could not start speech output");
                    self.deps.speech.stop().await;
                    self.begin_listening().await;
                }
            }
            InteractionMode::Text => self.set_phase(ConversationPhase::Typing),
        }
    }

    async fn on_completion_failure(&mut self, message: String) {
        warn!(%message, "completion failed");
        self.state.last_error = Some(message);
        match self.state.mode {
            InteractionMode::Voice => self.begin_listening().await,
            InteractionMode::Text => self.set_phase(ConversationPhase::Typing),
        }
    }

    async fn begin_listening(&mut self) {
        if !self.deps.recognizer.is_available() {
            warn!("speech recognizer is not available");
            self.state.mode = InteractionMode::Text;
            self.set_phase(ConversationPhase::Typing);
            return;
        }

        self.set_phase(ConversationPhase::Listening);
        let listener = Arc::new(self.forwarder());
        if let Err(e) = self.deps.recognizer.start_listening(listener).await {
            warn!(error = %e, "could not start listening");
            self.state.last_error = Some(e.to_string());
            self.state.mode = InteractionMode::Text;
            self.set_phase(ConversationPhase::Typing);
        }
    }

    fn forwarder(&self) -> EventForwarder {
        EventForwarder {
            generation: self.generation,
            tx: self.events.clone(),
        }
    }

    fn request_completion(&mut self, prompt: Prompt) {
        let request = self.next_request;
        self.next_request += 1;

        let completion = Arc::clone(&self.deps.completion);
        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            let result = completion.complete(&prompt).await;
            let _ = tx.send(ControllerEvent::CompletionFinished { request, result });
        });
        self.in_flight = Some(InFlight { request, task });
    }

    /// Best effort: a failed write is logged and surfaced, never retried.
    async fn persist(&mut self, text: &str, direction: Direction) {
        match self.deps.chats.append(text, direction).await {
            Ok(turn) => {
                debug!(id = turn.id, ?direction, "turn saved");
                self.sync_turns();
            }
            Err(e) => {
                warn!(error = %e, ?direction, "failed to save chat turn");
                self.state.last_error = Some(format!("could not save message: {e}"));
            }
        }
    }
}

/// Front-end side of a running controller.
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControllerEvent>,
    state_rx: watch::Receiver<ConversationState>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    fn send(&self, event: ControllerEvent) {
        if self.tx.send(event).is_err() {
            warn!("conversation controller is not running");
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_rx.clone()
    }

    pub fn update_pending_input(&self, text: impl Into<String>) {
        self.send(ControllerEvent::UpdatePendingInput(text.into()));
    }

    pub fn submit(&self) {
        self.send(ControllerEvent::Submit);
    }

    /// Replace the pending input with `text` and send it.
    pub fn submit_text(&self, text: impl Into<String>) {
        self.update_pending_input(text);
        self.submit();
    }

    pub fn toggle_microphone(&self) {
        self.send(ControllerEvent::ToggleMicrophone);
    }

    pub fn stop(&self) {
        self.send(ControllerEvent::Stop);
    }

    pub fn dismiss_permission_prompt(&self) {
        self.send(ControllerEvent::DismissPermissionPrompt);
    }

    pub fn record_permission_rationale(&self, message: impl Into<String>) {
        self.send(ControllerEvent::RecordPermissionRationale(message.into()));
    }

    pub fn grant_microphone(&self) {
        self.send(ControllerEvent::GrantMicrophone);
    }

    pub fn deny_microphone(&self) {
        self.send(ControllerEvent::DenyMicrophone);
    }

    pub fn clear_history(&self) {
        self.send(ControllerEvent::ClearHistory);
    }

    /// Stop the controller and wait for it to release its collaborators.
    pub async fn shutdown(self) {
        self.send(ControllerEvent::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "controller task ended abnormally");
        }
    }
}
