use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IssueStatus;

/// Client-side view of an [`Update`](super::Update). Never stored server-side;
/// rebuilt on every load and overlaid with the local read state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// `update_<updateId>`. Stable across reloads.
    pub id: String,
    pub issue_id: i64,
    pub title: String,
    pub r#type: NotificationType,
    pub message: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn id_for_update(update_id: i64) -> String {
        format!("update_{}", update_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    NewReport,
    UpdateRequest,
    IssueResolved,
}

impl NotificationType {
    pub fn for_status(status: IssueStatus) -> Self {
        match status {
            IssueStatus::Completed => NotificationType::IssueResolved,
            IssueStatus::InProgress => NotificationType::UpdateRequest,
            _ => NotificationType::NewReport,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NotificationType::NewReport => "New report",
            NotificationType::UpdateRequest => "In progress",
            NotificationType::IssueResolved => "Resolved",
        }
    }
}
