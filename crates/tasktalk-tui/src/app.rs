use std::sync::Arc;

use ratatui::widgets::ListState;
use tasktalk_core::controller::ControllerHandle;
use tasktalk_core::db::TaskRepository;
use tasktalk_core::provider::Provider;
use tasktalk_core::saved_state::SavedState;
use tasktalk_core::screens::{AddEditModel, StatisticsModel, TaskDetailModel, TaskListModel};
use tasktalk_core::state::{ConversationPhase, ConversationState};
use tasktalk_core::task::{Task, TaskFilter};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Tasks,
    TaskDetail,
    AddEdit,
    Statistics,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditField {
    #[default]
    Title,
    Description,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Task screens
    pub tasks: Arc<dyn TaskRepository>,
    pub task_list: TaskListModel,
    pub task_state: ListState,
    pub detail: Option<TaskDetailModel>,
    pub add_edit: Option<AddEditModel>,
    pub edit_field: EditField,
    pub statistics: StatisticsModel,

    // Chat
    pub conversation: ControllerHandle,
    pub chat: ConversationState,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input, in chars
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_chat: bool,

    // Header info
    pub provider: Provider,
    pub model: String,

    /// Errors that have no better place to go.
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        saved_state: Arc<dyn SavedState>,
        conversation: ControllerHandle,
        provider: Provider,
        model: String,
    ) -> Self {
        let task_list = TaskListModel::new(Arc::clone(&tasks), saved_state);
        let statistics = StatisticsModel::new(&tasks);
        let chat = conversation.state();
        let chat_input = chat.pending_input.clone();
        let chat_cursor = chat_input.chars().count();

        let mut app = Self {
            should_quit: false,
            screen: Screen::Tasks,
            input_mode: InputMode::Normal,

            tasks,
            task_list,
            task_state: ListState::default(),
            detail: None,
            add_edit: None,
            edit_field: EditField::default(),
            statistics,

            conversation,
            chat,
            chat_input,
            chat_cursor,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_chat: true,

            provider,
            model,
            status: None,
            animation_frame: 0,
        };
        app.clamp_task_selection();
        app
    }

    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;
    }

    // ===== Task list =====

    pub fn visible_tasks(&self) -> Vec<Task> {
        self.task_list.visible()
    }

    pub fn selected_task(&self) -> Option<Task> {
        let idx = self.task_state.selected()?;
        self.visible_tasks().into_iter().nth(idx)
    }

    pub fn tasks_changed(&mut self) {
        if self.task_list.sync() {
            self.clamp_task_selection();
        }
    }

    pub fn clamp_task_selection(&mut self) {
        let len = self.visible_tasks().len();
        let selected = match (len, self.task_state.selected()) {
            (0, _) => None,
            (_, None) => Some(0),
            (len, Some(i)) => Some(i.min(len - 1)),
        };
        self.task_state.select(selected);
    }

    pub fn task_down(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            return;
        }
        let i = self.task_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.task_state.select(Some(i));
    }

    pub fn task_up(&mut self) {
        let i = self.task_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.task_state.select(Some(i));
    }

    pub fn cycle_filter(&mut self) {
        let next = next_filter(self.task_list.filter());
        self.task_list.set_filter(next);
        self.task_state.select(None);
        self.clamp_task_selection();
    }

    pub fn report(&mut self, context: &str, error: impl std::fmt::Display) {
        warn!(%error, "{context}");
        self.status = Some(format!("{context}: {error}"));
    }

    // ===== Chat =====

    pub fn conversation_changed(&mut self, state: ConversationState) {
        if state.turns.len() != self.chat.turns.len() {
            self.follow_chat = true;
        }
        self.chat = state;
    }

    pub fn chat_is_busy(&self) -> bool {
        !matches!(self.chat.phase, ConversationPhase::Typing)
    }

    pub fn push_chat_char(&mut self, c: char) {
        let idx = char_to_byte_index(&self.chat_input, self.chat_cursor);
        self.chat_input.insert(idx, c);
        self.chat_cursor += 1;
        self.conversation.update_pending_input(self.chat_input.clone());
    }

    pub fn delete_chat_char(&mut self) {
        if self.chat_cursor == 0 {
            return;
        }
        self.chat_cursor -= 1;
        let idx = char_to_byte_index(&self.chat_input, self.chat_cursor);
        self.chat_input.remove(idx);
        self.conversation.update_pending_input(self.chat_input.clone());
    }

    pub fn chat_cursor_left(&mut self) {
        self.chat_cursor = self.chat_cursor.saturating_sub(1);
    }

    pub fn chat_cursor_right(&mut self) {
        self.chat_cursor = (self.chat_cursor + 1).min(self.chat_input.chars().count());
    }

    /// Send whatever is in the input box. The controller ignores empty input.
    pub fn submit_chat(&mut self) {
        if !self.chat.input_enabled() {
            return;
        }
        self.conversation.submit();
        if !self.chat_input.trim().is_empty() {
            self.chat_input.clear();
            self.chat_cursor = 0;
        }
        self.follow_chat = true;
    }

    /// With text in the box this sends it, so the box is cleared the same
    /// way `submit_chat` clears it. While a reply is outstanding nothing is
    /// sent and the box keeps its text.
    pub fn toggle_microphone(&mut self) {
        if !self.chat.input_enabled() {
            return;
        }
        self.conversation.toggle_microphone();
        if !self.chat_input.trim().is_empty() {
            self.chat_input.clear();
            self.chat_cursor = 0;
        }
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
        self.follow_chat = false;
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
        self.follow_chat = false;
    }

    /// Scroll offset that keeps the last line visible, given the rendered line count.
    pub fn bottom_scroll(&self, total_lines: u16) -> u16 {
        total_lines.saturating_sub(self.chat_height)
    }
}

pub fn next_filter(filter: TaskFilter) -> TaskFilter {
    match filter {
        TaskFilter::All => TaskFilter::Active,
        TaskFilter::Active => TaskFilter::Completed,
        TaskFilter::Completed => TaskFilter::All,
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tasktalk_core::ai::UnavailableCompletion;
    use tasktalk_core::controller::{Collaborators, ConversationController};
    use tasktalk_core::db::{Database, SqliteChatRepository, SqliteTaskRepository};
    use tasktalk_core::permission::{ConfigPermission, MicrophoneStatus};
    use tasktalk_core::saved_state::MemorySavedState;
    use tasktalk_core::speech::{CommandRecognizer, CommandSpeechSink};

    use super::*;

    fn chat_app() -> App {
        let db = Database::open_in_memory().unwrap();
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(db.clone()).unwrap());
        let saved: Arc<dyn SavedState> = Arc::new(MemorySavedState::default());
        let (controller, events) = ConversationController::new(Collaborators {
            chats: Arc::new(SqliteChatRepository::new(db).unwrap()),
            completion: Arc::new(UnavailableCompletion::new("offline")),
            recognizer: Arc::new(CommandRecognizer::new(None)),
            speech: Arc::new(CommandSpeechSink::new(None)),
            permission: Arc::new(ConfigPermission::in_memory(MicrophoneStatus::Granted)),
            saved_state: Arc::clone(&saved),
        });
        let mut app = App::new(tasks, saved, controller.spawn(events), Provider::Ollama, "test".to_string());
        app.screen = Screen::Chat;
        app
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.push_chat_char(c);
        }
    }

    #[tokio::test]
    async fn microphone_key_keeps_typed_text_while_reply_is_pending() {
        let mut app = chat_app();
        app.chat.phase = ConversationPhase::Loading;

        type_text(&mut app, "xyz");
        app.toggle_microphone();
        assert_eq!(app.chat_input, "xyz");
        assert_eq!(app.chat_cursor, 3);

        app.push_chat_char('q');
        assert_eq!(app.chat_input, "xyzq");
        app.conversation.shutdown().await;
    }

    #[tokio::test]
    async fn microphone_key_sends_typed_text_when_idle() {
        let mut app = chat_app();
        type_text(&mut app, "hello");
        app.toggle_microphone();
        assert!(app.chat_input.is_empty());
        assert_eq!(app.chat_cursor, 0);

        let mut states = app.conversation.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if states.borrow_and_update().turns.iter().any(|t| t.text == "hello") {
                    break;
                }
                states.changed().await.unwrap();
            }
        })
        .await
        .expect("typed text was not sent");
        app.conversation.shutdown().await;
    }

    #[test]
    fn filter_cycles_through_all_three() {
        assert_eq!(next_filter(TaskFilter::All), TaskFilter::Active);
        assert_eq!(next_filter(TaskFilter::Active), TaskFilter::Completed);
        assert_eq!(next_filter(TaskFilter::Completed), TaskFilter::All);
    }

    #[test]
    fn char_index_handles_multibyte_text() {
        let s = "café au lait";
        assert_eq!(char_to_byte_index(s, 3), 3);
        assert_eq!(char_to_byte_index(s, 4), 5);
        assert_eq!(char_to_byte_index(s, 100), s.len());
    }
}
