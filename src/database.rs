use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Subtask, Task, TaskStatus};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("No task with id {0}")]
    NotFound(i64),
    #[error("Entity has no id (not yet inserted)")]
    MissingId,
}

// Status is persisted as its lowercase string form.
impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse::<TaskStatus>()
            .map_err(|e| FromSqlError::Other(e.into()))
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        // Cascade from tasks to subtasks/photos relies on this pragma
        conn.pragma_update(None, "foreign_keys", true)?;

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                description     TEXT,
                status          TEXT NOT NULL DEFAULT 'todo',
                progress        REAL NOT NULL DEFAULT 0.0,
                due_date        TEXT,
                deleted_at      TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS subtasks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id         INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                is_completed    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        // Ordered photo attachments; blobs are opaque to everything above
        // this layer
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS photos (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id         INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                position        INTEGER NOT NULL,
                data            BLOB NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_deleted_at ON tasks(deleted_at)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_subtasks_task_id ON subtasks(task_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_photos_task_id ON photos(task_id)",
            [],
        )?;

        Ok(())
    }

    /// Insert a task (with its photos) and return its ID
    pub fn insert_task(&self, task: &Task) -> Result<i64, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO tasks (title, description, status, progress, due_date, deleted_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                task.title,
                task.description,
                task.status,
                task.progress,
                task.due_date,
                task.deleted_at,
                task.created_at,
                task.updated_at
            ],
        )?;
        let id = tx.last_insert_rowid();
        Self::write_photos(&tx, id, &task.photos)?;
        tx.commit()?;
        Ok(id)
    }

    fn write_photos(
        tx: &rusqlite::Transaction<'_>,
        task_id: i64,
        photos: &[Vec<u8>],
    ) -> Result<(), DatabaseError> {
        tx.execute(
            "DELETE FROM photos WHERE task_id = ?1",
            rusqlite::params![task_id],
        )?;
        let mut stmt =
            tx.prepare("INSERT INTO photos (task_id, position, data) VALUES (?1, ?2, ?3)")?;
        for (position, data) in photos.iter().enumerate() {
            stmt.execute(rusqlite::params![task_id, position as i64, data])?;
        }
        Ok(())
    }

    fn load_photos(&self, task_id: i64) -> Result<Vec<Vec<u8>>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM photos WHERE task_id = ?1 ORDER BY position ASC")?;
        let photos = stmt
            .query_map(rusqlite::params![task_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Helper function to map a row to a Task (photos loaded separately)
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        Ok(Task {
            id: Some(row.get(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            status: row.get(3)?,
            progress: row.get(4)?,
            due_date: row.get(5)?,
            deleted_at: row.get(6)?,
            photos: Vec::new(),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    const TASK_COLUMNS: &'static str =
        "id, title, description, status, progress, due_date, deleted_at, created_at, updated_at";

    /// Get a single task by ID, photos included
    pub fn get_task(&self, id: i64) -> Result<Task, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE id = ?1",
            Self::TASK_COLUMNS
        ))?;

        let mut task = stmt
            .query_row(rusqlite::params![id], Self::row_to_task)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound(id),
                other => DatabaseError::SqliteError(other),
            })?;
        task.photos = self.load_photos(id)?;
        Ok(task)
    }

    /// Get active tasks (not in the recycle bin) ordered by creation time,
    /// optionally filtered by status
    pub fn get_active_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, DatabaseError> {
        let mut tasks = if let Some(status) = status {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE deleted_at IS NULL AND status = ?1
                 ORDER BY created_at ASC, id ASC",
                Self::TASK_COLUMNS
            ))?;
            stmt.query_map(rusqlite::params![status], Self::row_to_task)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE deleted_at IS NULL
                 ORDER BY created_at ASC, id ASC",
                Self::TASK_COLUMNS
            ))?;
            stmt.query_map([], Self::row_to_task)?
                .collect::<Result<Vec<_>, _>>()?
        };
        self.attach_photos(&mut tasks)?;
        Ok(tasks)
    }

    /// Get soft-deleted tasks ordered by deletion time
    pub fn get_deleted_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE deleted_at IS NOT NULL
             ORDER BY deleted_at ASC, id ASC",
            Self::TASK_COLUMNS
        ))?;
        let mut tasks = stmt
            .query_map([], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_photos(&mut tasks)?;
        Ok(tasks)
    }

    /// Get soft-deleted tasks whose deletion timestamp is strictly older
    /// than the cutoff (store timestamp format; string order is time order)
    pub fn get_deleted_tasks_before(&self, cutoff: &str) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE deleted_at IS NOT NULL AND deleted_at < ?1
             ORDER BY deleted_at ASC, id ASC",
            Self::TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(rusqlite::params![cutoff], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    fn attach_photos(&self, tasks: &mut [Task]) -> Result<(), DatabaseError> {
        for task in tasks.iter_mut() {
            if let Some(id) = task.id {
                task.photos = self.load_photos(id)?;
            }
        }
        Ok(())
    }

    /// Update an existing task (all columns and photos)
    pub fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let id = task.id.ok_or(DatabaseError::MissingId)?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, progress = ?4,
             due_date = ?5, deleted_at = ?6, updated_at = ?7 WHERE id = ?8",
            rusqlite::params![
                task.title,
                task.description,
                task.status,
                task.progress,
                task.due_date,
                task.deleted_at,
                task.updated_at,
                id
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(id));
        }
        Self::write_photos(&tx, id, &task.photos)?;
        tx.commit()?;
        Ok(())
    }

    /// Permanently delete a task by ID; subtasks and photos cascade
    pub fn delete_task(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert a subtask and return its ID
    pub fn insert_subtask(&self, subtask: &Subtask) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO subtasks (task_id, title, is_completed, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                subtask.task_id,
                subtask.title,
                if subtask.is_completed { 1 } else { 0 },
                subtask.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get all subtasks of a task, oldest first
    pub fn get_subtasks(&self, task_id: i64) -> Result<Vec<Subtask>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, title, is_completed, created_at
             FROM subtasks WHERE task_id = ?1 ORDER BY id ASC",
        )?;
        let subtasks = stmt
            .query_map(rusqlite::params![task_id], |row| {
                Ok(Subtask {
                    id: Some(row.get(0)?),
                    task_id: row.get(1)?,
                    title: row.get(2)?,
                    is_completed: row.get::<_, i64>(3)? != 0,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subtasks)
    }

    /// Whether a task row exists at all (active or in the bin)
    pub fn task_exists(&self, id: i64) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Subtask, Task, TaskStatus};

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = db();
        let mut task = Task::new("Water the plants".to_string());
        task.description = Some("balcony only".to_string());
        task.status = TaskStatus::Doing;
        task.progress = 0.25;
        task.photos = vec![vec![0x89, 0x50, 0x4e, 0x47], vec![0xff, 0xd8]];

        let id = db.insert_task(&task).unwrap();
        let loaded = db.get_task(id).unwrap();

        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.title, "Water the plants");
        assert_eq!(loaded.description.as_deref(), Some("balcony only"));
        assert_eq!(loaded.status, TaskStatus::Doing);
        assert_eq!(loaded.progress, 0.25);
        assert!(loaded.deleted_at.is_none());
        assert_eq!(loaded.photos, task.photos);
    }

    #[test]
    fn photo_order_is_preserved() {
        let db = db();
        let mut task = Task::new("photos".to_string());
        task.photos = vec![vec![1], vec![2], vec![3]];
        let id = db.insert_task(&task).unwrap();

        let mut loaded = db.get_task(id).unwrap();
        assert_eq!(loaded.photos, vec![vec![1], vec![2], vec![3]]);

        loaded.photos = vec![vec![3], vec![1]];
        db.update_task(&loaded).unwrap();
        assert_eq!(db.get_task(id).unwrap().photos, vec![vec![3], vec![1]]);
    }

    #[test]
    fn get_unknown_task_is_not_found() {
        let db = db();
        match db.get_task(42) {
            Err(DatabaseError::NotFound(42)) => {}
            other => panic!("expected NotFound(42), got {:?}", other.map(|t| t.id)),
        }
    }

    #[test]
    fn active_listing_orders_by_creation_and_filters_status() {
        let db = db();
        let mut a = Task::new("a".to_string());
        a.created_at = "2025-01-01 10:00:00".to_string();
        a.updated_at = a.created_at.clone();
        let mut b = Task::new("b".to_string());
        b.created_at = "2025-01-01 09:00:00".to_string();
        b.updated_at = b.created_at.clone();
        b.status = TaskStatus::Done;
        db.insert_task(&a).unwrap();
        db.insert_task(&b).unwrap();

        let all = db.get_active_tasks(None).unwrap();
        assert_eq!(
            all.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );

        let done = db.get_active_tasks(Some(TaskStatus::Done)).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].title, "b");
    }

    #[test]
    fn deleted_listing_orders_by_deletion_time() {
        let db = db();
        let id_first = db.insert_task(&Task::new("first".to_string())).unwrap();
        let id_second = db.insert_task(&Task::new("second".to_string())).unwrap();

        let mut second = db.get_task(id_second).unwrap();
        second.deleted_at = Some("2025-01-01 08:00:00".to_string());
        db.update_task(&second).unwrap();

        let mut first = db.get_task(id_first).unwrap();
        first.deleted_at = Some("2025-01-02 08:00:00".to_string());
        db.update_task(&first).unwrap();

        let deleted = db.get_deleted_tasks().unwrap();
        assert_eq!(
            deleted.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["second", "first"]
        );
        assert!(db.get_active_tasks(None).unwrap().is_empty());

        let old = db.get_deleted_tasks_before("2025-01-02 00:00:00").unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].title, "second");
    }

    #[test]
    fn delete_cascades_to_subtasks_and_photos() {
        let db = db();
        let mut task = Task::new("parent".to_string());
        task.photos = vec![vec![7]];
        let id = db.insert_task(&task).unwrap();
        db.insert_subtask(&Subtask::new(id, "child".to_string(), false))
            .unwrap();

        db.delete_task(id).unwrap();

        assert!(matches!(db.get_task(id), Err(DatabaseError::NotFound(_))));
        assert!(db.get_subtasks(id).unwrap().is_empty());
        let orphan_photos: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphan_photos, 0);
    }

    #[test]
    fn delete_unknown_task_is_not_found() {
        let db = db();
        assert!(matches!(db.delete_task(9), Err(DatabaseError::NotFound(9))));
    }

    #[test]
    fn new_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();
        db.insert_task(&Task::new("persisted".to_string())).unwrap();
        assert!(path.exists());

        // Reopening sees the committed data
        drop(db);
        let db = Database::new(path.to_str().unwrap()).unwrap();
        assert_eq!(db.get_active_tasks(None).unwrap().len(), 1);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let db = db();
        let first = db.insert_task(&Task::new("one".to_string())).unwrap();
        db.delete_task(first).unwrap();
        let second = db.insert_task(&Task::new("two".to_string())).unwrap();
        assert!(second > first);
    }
}
