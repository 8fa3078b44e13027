//! View-models for the task screens.
//!
//! Each model owns what its screen shows and exposes the actions the screen
//! can take. Front-ends render from these and never touch a repository
//! directly.

pub mod add_edit;
pub mod detail;
pub mod statistics;
pub mod tasks;

pub use add_edit::{AddEditModel, SaveOutcome};
pub use detail::TaskDetailModel;
pub use statistics::StatisticsModel;
pub use tasks::TaskListModel;

pub const MSG_MARKED_COMPLETE: &str = "Task marked complete";
pub const MSG_MARKED_ACTIVE: &str = "Task marked active";
pub const MSG_COMPLETED_CLEARED: &str = "Completed tasks cleared";
pub const MSG_TASK_DELETED: &str = "Task was deleted";
pub const MSG_TASK_ADDED: &str = "Task added";
pub const MSG_TASK_SAVED: &str = "Task saved";
pub const MSG_EMPTY_TASK: &str = "Tasks cannot be empty";

fn completion_message(completed: bool) -> &'static str {
    if completed {
        MSG_MARKED_COMPLETE
    } else {
        MSG_MARKED_ACTIVE
    }
}
