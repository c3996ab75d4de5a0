use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IssueStatus;

/// One entry in an issue's append-only history, written by operations staff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub id: i64,
    #[serde(default)]
    pub issue_id: Option<i64>,
    pub status: IssueStatus,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    #[serde(default = "Utc::now", alias = "createdAt", with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
}
