use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: i64,
    pub description: String,
    pub category: String,
    pub status: IssueStatus,
    #[serde(flatten)]
    pub location: Location,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    #[serde(default = "Utc::now", with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "super::timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Backend id of the reporting user.
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Issue {
    /// Short display title derived from the description.
    pub fn title(&self) -> String {
        const MAX: usize = 60;
        let trimmed = self.description.trim();
        if trimmed.chars().count() <= MAX {
            return trimmed.to_string();
        }
        let cut: String = trimmed.chars().take(MAX - 3).collect();
        format!("{}...", cut.trim_end())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, deserialize_with = "coordinate")]
    pub latitude: f64,
    #[serde(default, deserialize_with = "coordinate")]
    pub longitude: f64,
    /// Human-readable address resolved at report time.
    #[serde(default, rename = "location")]
    pub address: Option<String>,
}

/// Missing or `null` coordinates read as 0.0.
fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Completed,
    /// Any status this client doesn't know about yet.
    #[serde(other)]
    Unknown,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Pending => "PENDING",
            IssueStatus::InProgress => "IN_PROGRESS",
            IssueStatus::Completed => "COMPLETED",
            IssueStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    /// Accepts backend spelling and CLI-friendly forms (`in-progress`, `completed`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PENDING" => Ok(IssueStatus::Pending),
            "IN_PROGRESS" => Ok(IssueStatus::InProgress),
            "COMPLETED" => Ok(IssueStatus::Completed),
            other => Err(format!(
                "unknown status '{}': expected pending, in-progress or completed",
                other
            )),
        }
    }
}
