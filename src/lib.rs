pub mod cli;
pub mod config;
pub mod database;
pub mod models;
pub mod reminder;
pub mod service;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use models::{Subtask, Task, TaskPatch, TaskStatus};
pub use reminder::{LogSink, ReminderRequest, ReminderSink};
pub use service::{NewTask, ServiceError, TaskService};
pub use utils::Profile;
