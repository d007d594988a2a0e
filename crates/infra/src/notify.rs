//! Transient notifications ("toasts") queued per user and shown on the next
//! rendered page.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crm_core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: Variant::Default,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            title: "Erreur".to_string(),
            description: description.into(),
            variant: Variant::Destructive,
        }
    }
}

/// Per-user backlog kept until the next rendered page; older entries are dropped first.
const MAX_PENDING: usize = 20;

#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: Mutex<HashMap<UserId, Vec<Notification>>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, user: UserId, notification: Notification) {
        if let Ok(mut pending) = self.pending.lock() {
            let queue = pending.entry(user).or_default();
            if queue.len() == MAX_PENDING {
                queue.remove(0);
            }
            queue.push(notification);
        }
    }

    /// Take every queued notification of `user`, oldest first.
    pub fn drain(&self, user: UserId) -> Vec<Notification> {
        self.pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(&user))
            .unwrap_or_default()
    }
}
