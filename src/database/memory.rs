use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{NewTask, NewUser, Store, StoreError, Task, TaskChanges, User};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    tasks: BTreeMap<i64, Task>,
    last_user_id: i64,
    last_task_id: i64,
}

/// In-process store with the same constraints as the Postgres schema:
/// unique usernames and emails, and tasks must reference an existing user.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(format!(
                "email '{}' already exists",
                user.email
            )));
        }

        tables.last_user_id += 1;
        let created = User {
            id: tables.last_user_id,
            username: user.username,
            email: user.email,
            hashed_password: user.hashed_password,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&task.user_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "user {} does not exist",
                task.user_id
            )));
        }

        tables.last_task_id += 1;
        let now = Utc::now();
        let created = Task {
            id: tables.last_task_id,
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            done: false,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Task>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);

        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_task(&self, id: i64, changes: TaskChanges) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", id)))?;

        task.title = changes.title;
        task.description = changes.description;
        task.done = changes.done;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("task {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            hashed_password: "salt$digest".to_string(),
        }
    }

    fn new_task(user_id: i64, title: &str) -> NewTask {
        NewTask {
            user_id,
            title: title.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_a_unique_violation() {
        let store = MemoryStore::new();
        store.create_user(new_user("nicolas")).await.unwrap();

        let err = store.create_user(new_user("nicolas")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let mut same_email = new_user("other");
        same_email.email = "nicolas@example.com".to_string();
        let err = store.create_user(same_email).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn task_requires_existing_owner() {
        let store = MemoryStore::new();
        let err = store.create_task(new_task(99, "orphan")).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn list_tasks_filters_by_owner_and_pages() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let bob = store.create_user(new_user("bob")).await.unwrap();

        for i in 0..5 {
            store.create_task(new_task(alice.id, &format!("alice {}", i))).await.unwrap();
        }
        store.create_task(new_task(bob.id, "bob 0")).await.unwrap();

        let page = store.list_tasks(alice.id, 2, 1).await.unwrap();
        let titles: Vec<_> = page.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["alice 1", "alice 2"]);

        let all = store.list_tasks(alice.id, 100, 0).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|t| t.user_id == alice.id));
    }

    #[tokio::test]
    async fn update_and_delete_missing_task() {
        let store = MemoryStore::new();
        let changes = TaskChanges {
            title: "x".to_string(),
            description: String::new(),
            done: true,
        };
        assert!(matches!(store.update_task(1, changes).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_task(1).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_keeps_owner() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let task = store.create_task(new_task(alice.id, "write report")).await.unwrap();

        let updated = store
            .update_task(
                task.id,
                TaskChanges {
                    title: "write tests".to_string(),
                    description: "all of them".to_string(),
                    done: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.user_id, alice.id);
        assert_eq!(updated.title, "write tests");
        assert!(updated.done);
        assert!(updated.updated_at >= task.updated_at);
    }
}
