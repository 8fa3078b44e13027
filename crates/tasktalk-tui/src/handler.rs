use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tasktalk_core::screens::{AddEditModel, SaveOutcome, TaskDetailModel, MSG_TASK_DELETED};
use tracing::debug;

use crate::app::{App, EditField, InputMode, Screen};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Conversation(state) => app.conversation_changed(state),
        AppEvent::TasksChanged => app.tasks_changed(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // The permission dialog is modal.
    if app.screen == Screen::Chat && app.chat.permission_prompt.visible {
        handle_permission_dialog(app, key);
        return Ok(());
    }

    match app.screen {
        Screen::Tasks => handle_tasks(app, key).await?,
        Screen::TaskDetail => handle_detail(app, key).await?,
        Screen::AddEdit => handle_add_edit(app, key).await?,
        Screen::Statistics => handle_statistics(app, key),
        Screen::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_chat_editing(app, key),
        },
    }
    Ok(())
}

async fn handle_tasks(app: &mut App, key: KeyEvent) -> Result<()> {
    app.task_list.dismiss_snackbar();
    app.status = None;

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('j') | KeyCode::Down => app.task_down(),
        KeyCode::Char('k') | KeyCode::Up => app.task_up(),

        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
            if let Some(id) = app.selected_task().and_then(|t| t.id) {
                open_detail(app, id).await;
            }
        }
        KeyCode::Char(' ') | KeyCode::Char('x') => {
            if let Some(task) = app.selected_task() {
                if let Err(e) = app.task_list.toggle_completed(&task).await {
                    app.report("Could not update task", e);
                }
            }
        }
        KeyCode::Char('a') if app.task_list.add_visible() => {
            app.add_edit = Some(AddEditModel::new_task(app.tasks.clone()));
            app.edit_field = EditField::Title;
            app.screen = Screen::AddEdit;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('f') => app.cycle_filter(),
        KeyCode::Char('C') => {
            if let Err(e) = app.task_list.clear_completed().await {
                app.report("Could not clear completed tasks", e);
            }
            app.clamp_task_selection();
        }
        KeyCode::Char('r') => {
            if let Err(e) = app.task_list.refresh().await {
                app.report("Could not load tasks", e);
            }
            app.clamp_task_selection();
        }
        KeyCode::Char('s') => app.screen = Screen::Statistics,
        KeyCode::Char('c') | KeyCode::Tab => {
            app.screen = Screen::Chat;
            app.input_mode = InputMode::Editing;
        }
        _ => {}
    }
    Ok(())
}

async fn open_detail(app: &mut App, id: i64) {
    match TaskDetailModel::load(app.tasks.clone(), id).await {
        Ok(detail) => {
            app.detail = Some(detail);
            app.screen = Screen::TaskDetail;
        }
        Err(e) => app.report("Could not open task", e),
    }
}

async fn handle_detail(app: &mut App, key: KeyEvent) -> Result<()> {
    let Some(detail) = app.detail.as_mut() else {
        app.screen = Screen::Tasks;
        return Ok(());
    };

    match key.code {
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('q') => {
            app.detail = None;
            app.screen = Screen::Tasks;
        }
        KeyCode::Char(' ') | KeyCode::Char('x') => {
            if let Err(e) = detail.toggle_completed().await {
                app.report("Could not update task", e);
            }
        }
        KeyCode::Char('e') => {
            let id = detail.id();
            match AddEditModel::edit(app.tasks.clone(), id).await {
                Ok(model) => {
                    app.add_edit = Some(model);
                    app.edit_field = EditField::Title;
                    app.screen = Screen::AddEdit;
                    app.input_mode = InputMode::Editing;
                }
                Err(e) => app.report("Could not edit task", e),
            }
        }
        KeyCode::Char('d') => match detail.delete().await {
            Ok(()) => {
                let message = detail.snackbar().unwrap_or(MSG_TASK_DELETED).to_string();
                app.detail = None;
                app.task_list.show_message(message);
                app.screen = Screen::Tasks;
                app.tasks_changed();
            }
            Err(e) => app.report("Could not delete task", e),
        },
        _ => {}
    }
    Ok(())
}

async fn handle_add_edit(app: &mut App, key: KeyEvent) -> Result<()> {
    let Some(form) = app.add_edit.as_mut() else {
        app.screen = Screen::Tasks;
        return Ok(());
    };

    let field = match app.edit_field {
        EditField::Title => &mut form.title,
        EditField::Description => &mut form.description,
    };

    match key.code {
        KeyCode::Esc => {
            app.add_edit = None;
            app.input_mode = InputMode::Normal;
            app.screen = if app.detail.is_some() {
                Screen::TaskDetail
            } else {
                Screen::Tasks
            };
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.edit_field = match app.edit_field {
                EditField::Title => EditField::Description,
                EditField::Description => EditField::Title,
            };
        }
        KeyCode::Backspace => {
            field.pop();
        }
        KeyCode::Enter if app.edit_field == EditField::Description && key.modifiers.contains(KeyModifiers::ALT) => {
            field.push('\n');
        }
        KeyCode::Enter => match form.save().await {
            Ok(SaveOutcome::Rejected) => {}
            Ok(outcome) => {
                debug!(?outcome, "task saved");
                app.add_edit = None;
                app.detail = None;
                app.input_mode = InputMode::Normal;
                app.screen = Screen::Tasks;
                app.tasks_changed();
                app.task_list.show_edit_result(outcome);
            }
            Err(e) => app.report("Could not save task", e),
        },
        KeyCode::Char(c) => field.push(c),
        _ => {}
    }
    Ok(())
}

fn handle_statistics(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('s') => {
            app.screen = Screen::Tasks;
        }
        KeyCode::Char('q') => app.should_quit = true,
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc | KeyCode::Tab => {
            app.screen = Screen::Tasks;
        }
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('m') => app.toggle_microphone(),
        KeyCode::Char('s') => app.conversation.stop(),
        KeyCode::Char('X') => app.conversation.clear_history(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('G') => app.follow_chat = true,
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit_chat(),
        // Ctrl-Space toggles the microphone without leaving the input box
        KeyCode::Char(' ') if key.modifiers.contains(KeyModifiers::CONTROL) => app.toggle_microphone(),
        KeyCode::Backspace => app.delete_chat_char(),
        KeyCode::Left => app.chat_cursor_left(),
        KeyCode::Right => app.chat_cursor_right(),
        KeyCode::Char(c) => app.push_chat_char(c),
        _ => {}
    }
}

fn handle_permission_dialog(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => app.conversation.grant_microphone(),
        KeyCode::Char('n') => app.conversation.deny_microphone(),
        KeyCode::Esc => app.conversation.dismiss_permission_prompt(),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match (app.screen, mouse.kind) {
        (Screen::Chat, MouseEventKind::ScrollDown) => app.scroll_chat_down(),
        (Screen::Chat, MouseEventKind::ScrollUp) => app.scroll_chat_up(),
        (Screen::Tasks, MouseEventKind::ScrollDown) => app.task_down(),
        (Screen::Tasks, MouseEventKind::ScrollUp) => app.task_up(),
        _ => {}
    }
}
