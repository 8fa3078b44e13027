use tasktalk_core::db::{
    ChatRepository, Database, SqliteChatRepository, SqliteTaskRepository, TaskRepository,
    SCHEMA_VERSION,
};
use tasktalk_core::state::Direction;
use tasktalk_core::task::Task;
use tasktalk_core::TaskTalkError;

#[tokio::test]
async fn chat_turns_keep_insertion_order_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("tasktalk.db");

    {
        let db = Database::open(&path).unwrap();
        let chats = SqliteChatRepository::new(db).unwrap();
        let mut rx = chats.observe();
        assert!(rx.borrow_and_update().is_empty());

        let sent = chats.append("Hello", Direction::Sent).await.unwrap();
        let received = chats.append("Hi there", Direction::Received).await.unwrap();
        assert!(sent.id < received.id);

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot, vec![sent, received]);
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    let chats = SqliteChatRepository::new(db).unwrap();
    let turns = chats.list().await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, "Hello");
    assert_eq!(turns[0].direction, Direction::Sent);
    assert_eq!(turns[1].direction, Direction::Received);
    assert_eq!(*chats.observe().borrow(), turns);
}

#[tokio::test]
async fn chat_clear_removes_every_turn_and_ids_keep_growing() {
    let chats = SqliteChatRepository::new(Database::open_in_memory().unwrap()).unwrap();
    chats.append("one", Direction::Sent).await.unwrap();
    let second = chats.append("two", Direction::Received).await.unwrap();

    chats.clear().await.unwrap();
    assert!(chats.observe().borrow().is_empty());
    assert!(chats.list().await.unwrap().is_empty());

    let next = chats.append("three", Direction::Sent).await.unwrap();
    assert!(next.id > second.id);
    assert_eq!(chats.list().await.unwrap(), vec![next]);
}

#[tokio::test]
async fn tasks_and_chat_share_one_database() {
    let db = Database::open_in_memory().unwrap();
    let tasks = SqliteTaskRepository::new(db.clone()).unwrap();
    let chats = SqliteChatRepository::new(db).unwrap();

    let id = tasks.insert(Task::new("Practice", "ten minutes of speaking")).await.unwrap();
    chats.append("Hello", Direction::Sent).await.unwrap();

    let mut task = tasks.get(id).await.unwrap().unwrap();
    task.title = "Practice English".to_string();
    assert_eq!(tasks.update(task).await.unwrap(), 1);
    assert_eq!(tasks.set_completed(id, true).await.unwrap(), 1);

    let stored = tasks.get(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Practice English");
    assert!(stored.completed);
    assert_eq!(chats.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_completed_reports_count() {
    let tasks = SqliteTaskRepository::new(Database::open_in_memory().unwrap()).unwrap();
    for i in 0..4 {
        let id = tasks.insert(Task::new(&format!("task {i}"), "")).await.unwrap();
        if i % 2 == 0 {
            tasks.set_completed(id, true).await.unwrap();
        }
    }

    assert_eq!(tasks.delete_completed().await.unwrap(), 2);
    let remaining = tasks.observe().borrow().clone();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|t| !t.completed));

    assert_eq!(tasks.delete(remaining[0].id.unwrap()).await.unwrap(), 1);
    assert_eq!(tasks.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn updating_unsaved_task_is_an_error() {
    let tasks = SqliteTaskRepository::new(Database::open_in_memory().unwrap()).unwrap();
    let err = tasks.update(Task::new("never inserted", "")).await.unwrap_err();
    assert!(matches!(err, TaskTalkError::InvalidData(_)));
}
