use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workflow status of a task.
///
/// Stored as its lowercase string form; `description()` is the human label.
/// Status and progress are independent: marking a task done never touches
/// its progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Done];

    /// Storage/CLI form: "todo", "doing", "done"
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }

    /// Human-readable label for display
    pub fn description(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::Doing => "Doing",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    /// Completion fraction in [0.0, 1.0]
    pub progress: f64,
    pub due_date: Option<String>, // YYYY-MM-DD HH:MM:SS (UTC)
    /// None = active, Some = sitting in the recycle bin since this timestamp
    pub deleted_at: Option<String>,
    /// Ordered photo attachments; opaque bytes, decoded only by callers
    #[serde(skip)]
    pub photos: Vec<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn new(title: String) -> Self {
        let now = crate::utils::now_string();
        Self {
            id: None,
            title,
            description: None,
            status: TaskStatus::Todo,
            progress: 0.0,
            due_date: None,
            deleted_at: None,
            photos: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Checklist item owned by a task; purging the task removes its subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Option<i64>,
    pub task_id: i64,
    pub title: String,
    pub is_completed: bool,
    pub created_at: String,
}

impl Subtask {
    pub fn new(task_id: i64, title: String, is_completed: bool) -> Self {
        Self {
            id: None,
            task_id,
            title,
            is_completed,
            created_at: crate::utils::now_string(),
        }
    }
}

/// Partial update for a task. `None` leaves the field untouched.
///
/// `description` and `due_date` are clearable, so they nest an Option:
/// `Some(None)` clears, `Some(Some(..))` replaces, `None` keeps.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub progress: Option<f64>,
    pub due_date: Option<Option<String>>,
    pub photos: Option<Vec<Vec<u8>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.progress.is_none()
            && self.due_date.is_none()
            && self.photos.is_none()
    }

    /// Apply the patch to a task in place, refreshing `updated_at`.
    /// Does not validate; the service validates before calling this.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(progress) = self.progress {
            task.progress = progress;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(photos) = self.photos {
            task.photos = photos;
        }
        task.updated_at = crate::utils::now_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
    }

    #[test]
    fn status_rejects_unknown_strings() {
        assert!("archived".parse::<TaskStatus>().is_err());
        assert!("To Do".parse::<TaskStatus>().is_err());
        assert!("".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn new_task_defaults() {
        let task = Task::new("Buy milk".to_string());
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.progress, 0.0);
        assert!(task.deleted_at.is_none());
        assert!(task.due_date.is_none());
        assert!(task.photos.is_empty());
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn empty_patch_changes_nothing_but_updated_at() {
        let mut task = Task::new("Keep me".to_string());
        let before = task.clone();
        TaskPatch::default().apply_to(&mut task);
        assert_eq!(task.title, before.title);
        assert_eq!(task.status, before.status);
        assert_eq!(task.progress, before.progress);
        assert_eq!(task.due_date, before.due_date);
    }

    #[test]
    fn patch_distinguishes_clear_from_untouched() {
        let mut task = Task::new("t".to_string());
        task.description = Some("details".to_string());

        TaskPatch {
            progress: Some(0.5),
            ..Default::default()
        }
        .apply_to(&mut task);
        assert_eq!(task.description.as_deref(), Some("details"));

        TaskPatch {
            description: Some(None),
            ..Default::default()
        }
        .apply_to(&mut task);
        assert!(task.description.is_none());
    }
}
