use hellolove_bus::BusPublisher;
use hellolove_schema::{BusMessage, Priority, Task, TaskId};
use tokio::sync::RwLock;

/// Ordered task list. Stored order is insertion order; any re-sorting is a
/// display concern.
pub struct TaskStore {
    tasks: RwLock<Vec<Task>>,
    publisher: BusPublisher,
}

impl TaskStore {
    pub fn new(publisher: BusPublisher) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            publisher,
        }
    }

    pub async fn create(&self, title: impl Into<String>, priority: Priority) -> Task {
        let task = Task::new(title, priority);
        self.tasks.write().await.push(task.clone());
        tracing::info!(id = %task.id, priority = task.priority.as_str(), "task created");
        self.notify(BusMessage::TaskCreated { task: task.clone() })
            .await;
        task
    }

    /// Flips `completed`. Returns the new value, or `None` when the id is unknown.
    pub async fn toggle_completed(&self, id: &TaskId) -> Option<bool> {
        let completed = {
            let mut tasks = self.tasks.write().await;
            let task = tasks.iter_mut().find(|t| &t.id == id)?;
            task.completed = !task.completed;
            task.completed
        };
        self.notify(BusMessage::TaskToggled {
            task_id: id.clone(),
            completed,
        })
        .await;
        Some(completed)
    }

    /// Removes the task. Returns `false` when the id is unknown.
    pub async fn delete(&self, id: &TaskId) -> bool {
        let removed = {
            let mut tasks = self.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            tasks.len() != before
        };
        if removed {
            tracing::info!(id = %id, "task deleted");
            self.notify(BusMessage::TaskDeleted {
                task_id: id.clone(),
            })
            .await;
        } else {
            tracing::debug!(id = %id, "delete ignored, task not found");
        }
        removed
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().await.iter().find(|t| &t.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    async fn notify(&self, msg: BusMessage) {
        if let Err(err) = self.publisher.publish(msg).await {
            tracing::warn!("failed to publish task event: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hellolove_bus::{EventBus, Topic};
    use tokio::time::{timeout, Duration};

    fn store() -> TaskStore {
        TaskStore::new(EventBus::new(8).publisher())
    }

    #[tokio::test]
    async fn create_assigns_defaults() {
        let store = store();
        let task = store.create("Walk dog", Priority::Medium).await;
        assert_eq!(task.title, "Walk dog");
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn ids_are_unique_and_order_is_insertion() {
        let store = store();
        let a = store.create("a", Priority::High).await;
        let b = store.create("b", Priority::Low).await;
        let c = store.create("c", Priority::Medium).await;
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);

        let titles: Vec<String> = store.list().await.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn toggle_twice_restores_value() {
        let store = store();
        let task = store.create("Walk dog", Priority::Medium).await;

        assert_eq!(store.toggle_completed(&task.id).await, Some(true));
        assert_eq!(store.toggle_completed(&task.id).await, Some(false));
        assert!(!store.get(&task.id).await.unwrap().completed);
    }

    #[tokio::test]
    async fn toggle_unknown_id_is_noop() {
        let store = store();
        store.create("Walk dog", Priority::Medium).await;
        let before = store.list().await;

        assert_eq!(store.toggle_completed(&TaskId("nope".into())).await, None);
        assert_eq!(store.list().await, before);
    }

    #[tokio::test]
    async fn delete_unknown_id_leaves_store_unchanged() {
        let store = store();
        store.create("Walk dog", Priority::Medium).await;
        let before = store.list().await;

        assert!(!store.delete(&TaskId("nope".into())).await);
        assert_eq!(store.list().await, before);
    }

    #[tokio::test]
    async fn delete_removes_and_notifies_once() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::TaskDeleted).await;
        let store = TaskStore::new(bus.publisher());
        let task = store.create("Walk dog", Priority::Medium).await;

        assert!(store.delete(&task.id).await);
        assert!(!store.delete(&task.id).await);
        assert!(store.is_empty().await);

        let first = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(
            first,
            Ok(Some(BusMessage::TaskDeleted { ref task_id })) if task_id == &task.id
        ));
        let second = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(second.is_err());
    }
}
