use thiserror::Error;
use tracing::warn;

use crate::database::{Database, DatabaseError};
use crate::models::{Subtask, Task, TaskPatch, TaskStatus};
use crate::reminder::{ReminderRequest, ReminderSink};
use crate::utils;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("No task with id {0}")]
    NotFound(i64),
    #[error("Persistence error: {0}")]
    Persistence(DatabaseError),
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Persistence(other),
        }
    }
}

/// Input for creating a task; absent optionals take the documented defaults.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub status: TaskStatus,
    pub progress: f64,
    pub description: Option<String>,
    /// Store-format timestamp (see `utils::parse_due` for user input)
    pub due_date: Option<String>,
    pub photos: Vec<Vec<u8>>,
    /// Schedule a one-shot reminder at the due date; ignored without one
    pub remind: bool,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: TaskStatus::Todo,
            progress: 0.0,
            description: None,
            due_date: None,
            photos: Vec::new(),
            remind: false,
        }
    }
}

/// The only component allowed to mutate task state. Every mutation is
/// committed to the store before the call returns; store failures come
/// back as `ServiceError::Persistence`, never a panic.
pub struct TaskService {
    db: Database,
    sink: Box<dyn ReminderSink>,
}

impl TaskService {
    pub fn new(db: Database, sink: Box<dyn ReminderSink>) -> Self {
        Self { db, sink }
    }

    /// Create a task and return its id.
    ///
    /// If a due date is present and `remind` is set, a one-shot reminder
    /// keyed by the task id is handed to the sink after the commit; a sink
    /// error is logged and swallowed.
    pub fn add_task(&mut self, new: NewTask) -> Result<i64, ServiceError> {
        validate_title(&new.title)?;
        validate_progress(new.progress)?;
        let due_at = match new.due_date.as_deref() {
            Some(due) => Some(utils::parse_timestamp(due).map_err(|e| {
                ServiceError::Validation(format!("invalid due date '{}': {}", due, e))
            })?),
            None => None,
        };

        let mut task = Task::new(new.title);
        task.status = new.status;
        task.progress = new.progress;
        task.description = new.description.filter(|d| !d.is_empty());
        task.due_date = new.due_date;
        task.photos = new.photos;

        let id = self.db.insert_task(&task)?;

        if new.remind {
            if let Some(fire_at) = due_at {
                let request = ReminderRequest::for_task(id, fire_at, &task.title);
                if let Err(e) = self.sink.schedule(request) {
                    // Fire-and-forget: the task mutation already committed
                    warn!(task_id = id, error = %e, "failed to schedule reminder");
                }
            }
        }

        Ok(id)
    }

    /// Create a subtask under an existing task and return its id
    pub fn add_subtask(
        &mut self,
        parent_id: i64,
        title: String,
        is_completed: bool,
    ) -> Result<i64, ServiceError> {
        if !self.db.task_exists(parent_id)? {
            return Err(ServiceError::NotFound(parent_id));
        }
        let subtask = Subtask::new(parent_id, title, is_completed);
        Ok(self.db.insert_subtask(&subtask)?)
    }

    /// Apply a partial update; fields the patch leaves `None` are untouched
    pub fn update_task(&mut self, id: i64, patch: TaskPatch) -> Result<(), ServiceError> {
        if let Some(title) = patch.title.as_deref() {
            validate_title(title)?;
        }
        if let Some(progress) = patch.progress {
            validate_progress(progress)?;
        }
        if let Some(Some(due)) = patch.due_date.as_ref() {
            utils::parse_timestamp(due).map_err(|e| {
                ServiceError::Validation(format!("invalid due date '{}': {}", due, e))
            })?;
        }

        let mut task = self.db.get_task(id)?;
        patch.apply_to(&mut task);
        self.db.update_task(&task)?;
        Ok(())
    }

    /// Move a task to the recycle bin. Idempotent: deleting an already
    /// deleted task refreshes its deletion timestamp.
    pub fn soft_delete_task(&mut self, id: i64) -> Result<(), ServiceError> {
        let mut task = self.db.get_task(id)?;
        task.deleted_at = Some(utils::now_string());
        task.updated_at = utils::now_string();
        self.db.update_task(&task)?;
        Ok(())
    }

    /// Bring a task back from the recycle bin; no-op when already active
    pub fn restore_task(&mut self, id: i64) -> Result<(), ServiceError> {
        let mut task = self.db.get_task(id)?;
        if task.deleted_at.is_none() {
            return Ok(());
        }
        task.deleted_at = None;
        task.updated_at = utils::now_string();
        self.db.update_task(&task)?;
        Ok(())
    }

    /// Permanently remove a task and its subtasks and photos. Irreversible.
    pub fn purge_task(&mut self, id: i64) -> Result<(), ServiceError> {
        Ok(self.db.delete_task(id)?)
    }

    /// Purge every recycle-bin entry deleted more than `retention_days`
    /// ago; returns how many were removed
    pub fn sweep_recycle_bin(&mut self, retention_days: u32) -> Result<usize, ServiceError> {
        let cutoff = utils::format_timestamp(
            chrono::Utc::now() - chrono::Duration::days(i64::from(retention_days)),
        );
        let expired = self.db.get_deleted_tasks_before(&cutoff)?;
        let mut purged = 0;
        for task in &expired {
            if let Some(id) = task.id {
                self.db.delete_task(id)?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Active tasks ordered by creation time, optionally filtered by status
    pub fn list_active_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, ServiceError> {
        Ok(self.db.get_active_tasks(status)?)
    }

    /// Recycle-bin contents ordered by deletion time
    pub fn list_deleted_tasks(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(self.db.get_deleted_tasks()?)
    }

    pub fn get_task(&self, id: i64) -> Result<Task, ServiceError> {
        Ok(self.db.get_task(id)?)
    }

    pub fn list_subtasks(&self, task_id: i64) -> Result<Vec<Subtask>, ServiceError> {
        if !self.db.task_exists(task_id)? {
            return Err(ServiceError::NotFound(task_id));
        }
        Ok(self.db.get_subtasks(task_id)?)
    }
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
    if title.trim().is_empty() {
        return Err(ServiceError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

fn validate_progress(progress: f64) -> Result<(), ServiceError> {
    if !(0.0..=1.0).contains(&progress) || progress.is_nan() {
        return Err(ServiceError::Validation(format!(
            "progress must be between 0.0 and 1.0, got {}",
            progress
        )));
    }
    Ok(())
}
