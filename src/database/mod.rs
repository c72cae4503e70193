use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use models::{NewTask, NewUser, Task, TaskChanges, User};
pub use postgres::PgStore;

/// Errors from a [`Store`] backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique violation: {0}")]
    UniqueViolation(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code().map(|code| code.into_owned()));

        match code.as_deref() {
            Some(postgres::UNIQUE_VIOLATION) => StoreError::UniqueViolation(err.to_string()),
            Some(postgres::FOREIGN_KEY_VIOLATION) => StoreError::ForeignKeyViolation(err.to_string()),
            _ => StoreError::Sqlx(err),
        }
    }
}

/// Persistence for users and tasks.
///
/// Lookups return `Ok(None)` for missing rows so callers can tell absence
/// apart from backend failure before any ownership check.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;
    async fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError>;
    /// Tasks owned by `user_id`, oldest first.
    async fn list_tasks(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Task>, StoreError>;
    async fn update_task(&self, id: i64, changes: TaskChanges) -> Result<Task, StoreError>;
    async fn delete_task(&self, id: i64) -> Result<(), StoreError>;
}
