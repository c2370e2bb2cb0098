use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::Config;
use crate::models::{Task, TaskPatch, TaskStatus};
use crate::service::{NewTask, ServiceError, TaskService};
use crate::utils;

#[derive(Parser)]
#[command(name = "remind")]
#[command(about = "Personal task tracker with a recycle bin")]
#[command(version)]
pub struct Cli {
    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Longer description
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
        #[arg(long)]
        due: Option<String>,
        /// Initial status (todo, doing, done)
        #[arg(long, default_value = "todo")]
        status: TaskStatus,
        /// Initial progress (0.0 to 1.0)
        #[arg(long, default_value_t = 0.0)]
        progress: f64,
        /// Schedule a reminder at the due date
        #[arg(long, requires = "due")]
        remind: bool,
    },
    /// List active tasks, oldest first
    List {
        /// Only tasks with this status (todo, doing, done)
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one task with its subtasks
    Show {
        /// Task ID
        id: i64,
    },
    /// Update fields of an existing task; omitted fields are untouched
    Update {
        /// Task ID
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description
        #[arg(long)]
        clear_description: bool,
        /// Due date (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Progress (0.0 to 1.0)
        #[arg(long)]
        progress: Option<f64>,
    },
    /// Add a subtask under a task
    Subtask {
        /// Parent task ID
        id: i64,
        /// Subtask title
        title: String,
        /// Create it already completed
        #[arg(long)]
        done: bool,
    },
    /// Move a task to the recycle bin
    Delete {
        /// Task ID
        id: i64,
    },
    /// Restore a task from the recycle bin
    Restore {
        /// Task ID
        id: i64,
    },
    /// List the recycle bin, oldest deletion first
    Bin {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Permanently delete a task (cannot be undone)
    Purge {
        /// Task ID
        id: i64,
    },
    /// Purge recycle-bin entries older than the retention window
    Sweep {
        /// Override the configured retention in days
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    ServiceError(#[from] ServiceError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Failed to encode JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Dispatch a parsed command against the service
pub fn run_command(
    command: Commands,
    service: &mut TaskService,
    config: &Config,
) -> Result<(), CliError> {
    match command {
        Commands::Add {
            title,
            description,
            due,
            status,
            progress,
            remind,
        } => handle_add(title, description, due, status, progress, remind, config, service),
        Commands::List { status, json } => handle_list(status, json, service),
        Commands::Show { id } => handle_show(id, service),
        Commands::Update {
            id,
            title,
            description,
            clear_description,
            due,
            clear_due,
            status,
            progress,
        } => {
            let patch = build_patch(
                title,
                description,
                clear_description,
                due,
                clear_due,
                status,
                progress,
            )?;
            service.update_task(id, patch)?;
            println!("Task {} updated", id);
            Ok(())
        }
        Commands::Subtask { id, title, done } => {
            let sub_id = service.add_subtask(id, title, done)?;
            println!("Subtask created successfully (ID: {})", sub_id);
            Ok(())
        }
        Commands::Delete { id } => {
            service.soft_delete_task(id)?;
            println!("Task {} moved to the recycle bin", id);
            Ok(())
        }
        Commands::Restore { id } => {
            service.restore_task(id)?;
            println!("Task {} restored", id);
            Ok(())
        }
        Commands::Bin { json } => handle_bin(json, service, config),
        Commands::Purge { id } => {
            service.purge_task(id)?;
            println!("Task {} permanently deleted", id);
            Ok(())
        }
        Commands::Sweep { days } => {
            let retention = days.unwrap_or(config.recycle_retention_days);
            let purged = service.sweep_recycle_bin(retention)?;
            println!(
                "Purged {} task(s) deleted more than {} days ago",
                purged, retention
            );
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_add(
    title: String,
    description: Option<String>,
    due: Option<String>,
    status: TaskStatus,
    progress: f64,
    remind: bool,
    config: &Config,
    service: &mut TaskService,
) -> Result<(), CliError> {
    let due_date = due
        .map(|d| utils::parse_due(&d).map_err(CliError::DateParseError))
        .transpose()?;

    let new = NewTask {
        title,
        status,
        progress,
        description,
        due_date,
        photos: Vec::new(),
        remind: remind && config.reminders_enabled,
    };
    let id = service.add_task(new)?;
    println!("Task created successfully (ID: {})", id);
    Ok(())
}

fn handle_list(
    status: Option<TaskStatus>,
    json: bool,
    service: &TaskService,
) -> Result<(), CliError> {
    let tasks = service.list_active_tasks(status)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No active tasks");
        return Ok(());
    }
    for task in &tasks {
        println!("{}", format_task_line(task));
    }
    Ok(())
}

fn handle_show(id: i64, service: &TaskService) -> Result<(), CliError> {
    let task = service.get_task(id)?;
    println!("{}", format_task_line(&task));
    if let Some(description) = &task.description {
        println!("  {}", description);
    }
    if !task.photos.is_empty() {
        println!("  {} photo attachment(s)", task.photos.len());
    }
    if let Some(deleted_at) = &task.deleted_at {
        println!("  In recycle bin since {}", deleted_at);
    }
    let subtasks = service.list_subtasks(id)?;
    for sub in &subtasks {
        let mark = if sub.is_completed { "x" } else { " " };
        println!("  [{}] {} (ID: {})", mark, sub.title, sub.id.unwrap_or(0));
    }
    Ok(())
}

fn handle_bin(json: bool, service: &TaskService, config: &Config) -> Result<(), CliError> {
    let tasks = service.list_deleted_tasks()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("Recycle bin is empty");
        return Ok(());
    }
    println!(
        "Entries older than {} days are removed by `remind sweep`:",
        config.recycle_retention_days
    );
    for task in &tasks {
        let deleted_at = task.deleted_at.as_deref().unwrap_or("?");
        println!(
            "  {} (ID: {}) deleted {}",
            task.title,
            task.id.unwrap_or(0),
            deleted_at
        );
    }
    Ok(())
}

fn build_patch(
    title: Option<String>,
    description: Option<String>,
    clear_description: bool,
    due: Option<String>,
    clear_due: bool,
    status: Option<TaskStatus>,
    progress: Option<f64>,
) -> Result<TaskPatch, CliError> {
    let description = if clear_description {
        Some(None)
    } else {
        description.map(Some)
    };
    let due_date = if clear_due {
        Some(None)
    } else {
        due.map(|d| utils::parse_due(&d).map_err(CliError::DateParseError))
            .transpose()?
            .map(Some)
    };
    Ok(TaskPatch {
        title,
        description,
        status,
        progress,
        due_date,
        photos: None,
    })
}

fn format_task_line(task: &Task) -> String {
    let due = task
        .due_date
        .as_deref()
        .map(|d| format!(" due {}", d))
        .unwrap_or_default();
    format!(
        "[{}] {} (ID: {}) {:.0}%{}",
        task.status.description(),
        task.title,
        task.id.unwrap_or(0),
        task.progress * 100.0,
        due
    )
}
