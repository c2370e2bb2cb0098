use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

/// One-shot notification request handed to the sink.
///
/// `identifier` is keyed by the owning task's id so a later reschedule
/// for the same task replaces the earlier request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub identifier: String,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

impl ReminderRequest {
    pub fn for_task(task_id: i64, fire_at: DateTime<Utc>, title: &str) -> Self {
        Self {
            identifier: format!("task-{}", task_id),
            fire_at,
            title: title.to_string(),
            body: format!("'{}' is due", title),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Reminder sink rejected request '{identifier}': {reason}")]
    Rejected { identifier: String, reason: String },
}

/// Delivery mechanism for one-shot reminders.
///
/// Acceptance does not guarantee delivery; callers never await it, and a
/// scheduling failure must never fail the mutation that triggered it.
pub trait ReminderSink {
    fn schedule(&self, request: ReminderRequest) -> Result<(), ReminderError>;
}

/// Default sink for the CLI: records the reminder in the log and nothing
/// else. A desktop-notification backend can replace it behind the same
/// trait.
#[derive(Debug, Default)]
pub struct LogSink;

impl ReminderSink for LogSink {
    fn schedule(&self, request: ReminderRequest) -> Result<(), ReminderError> {
        info!(
            identifier = %request.identifier,
            fire_at = %request.fire_at,
            title = %request.title,
            "reminder scheduled"
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every request; optionally fails to exercise the
    /// fire-and-forget path.
    pub struct RecordingSink {
        pub requests: Rc<RefCell<Vec<ReminderRequest>>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn new() -> (Self, Rc<RefCell<Vec<ReminderRequest>>>) {
            let requests = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    requests: Rc::clone(&requests),
                    fail: false,
                },
                requests,
            )
        }

        pub fn failing() -> Self {
            Self {
                requests: Rc::new(RefCell::new(Vec::new())),
                fail: true,
            }
        }
    }

    impl ReminderSink for RecordingSink {
        fn schedule(&self, request: ReminderRequest) -> Result<(), ReminderError> {
            if self.fail {
                return Err(ReminderError::Rejected {
                    identifier: request.identifier,
                    reason: "sink offline".to_string(),
                });
            }
            self.requests.borrow_mut().push(request);
            Ok(())
        }
    }
}
