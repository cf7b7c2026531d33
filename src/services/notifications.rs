use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{error, warn};
use uuid::Uuid;

use crate::errors::{ErrorCategory, ServiceError};

const MAX_PENDING: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Queue of transient messages for the UI, oldest first.
#[derive(Debug, Default)]
pub struct Notifier {
    queue: VecDeque<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self, message: impl Into<String>) -> Uuid {
        self.push(NotificationKind::Success, message.into())
    }

    pub fn info(&mut self, message: impl Into<String>) -> Uuid {
        self.push(NotificationKind::Info, message.into())
    }

    pub fn error(&mut self, message: impl Into<String>) -> Uuid {
        self.push(NotificationKind::Error, message.into())
    }

    /// Logs `err` and queues its user-facing message.
    pub fn failure(&mut self, context: &str, err: &ServiceError) -> Uuid {
        match err.category() {
            ErrorCategory::Validation => warn!(context, error = %err, "Request rejected"),
            _ => error!(context, error = %err, "Operation failed"),
        }
        self.error(err.user_message())
    }

    pub fn pending(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.queue.back()
    }

    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.queue.len();
        self.queue.retain(|n| n.id != id);
        self.queue.len() != before
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    fn push(&mut self, kind: NotificationKind, message: String) -> Uuid {
        if self.queue.len() == MAX_PENDING {
            self.queue.pop_front();
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            kind,
            message,
            created_at: Utc::now(),
        };
        let id = notification.id;
        self.queue.push_back(notification);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_use_the_user_message() {
        let mut notifier = Notifier::new();
        notifier.failure("checkout", &ServiceError::HashError("bad salt".into()));
        notifier.failure(
            "sign_in",
            &ServiceError::AuthError("Invalid login credentials".into()),
        );

        let messages: Vec<_> = notifier.pending().map(|n| n.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["An unexpected error occurred", "Invalid login credentials"]
        );
        assert_eq!(notifier.latest().unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn queue_is_bounded_and_dismissable() {
        let mut notifier = Notifier::new();
        let first = notifier.info("first");
        for i in 0..MAX_PENDING {
            notifier.info(format!("msg {i}"));
        }
        assert!(!notifier.dismiss(first));
        assert_eq!(notifier.pending().count(), MAX_PENDING);
        assert_eq!(notifier.drain().len(), MAX_PENDING);
        assert!(notifier.latest().is_none());
    }
}
