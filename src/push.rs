//! Inbound push messages.
//!
//! A push carries `issueId`, `updateType` and `status` as string data. It
//! becomes a local notice for display, and the issue is remembered as the
//! pending navigation target so the next foreground can open it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{IssueStatus, NotificationType};
use crate::notification::synth::message_for;
use crate::store::Preferences;

pub const PENDING_NAVIGATION_KEY: &str = "pending_navigation";

#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub issue_id: i64,
    pub update_type: Option<String>,
    pub status: IssueStatus,
    pub comment: Option<String>,
}

impl PushMessage {
    pub fn from_data(data: &HashMap<String, String>) -> Result<Self, AppError> {
        let raw_id = data
            .get("issueId")
            .ok_or_else(|| AppError::InvalidPush("missing issueId".into()))?;
        let issue_id = raw_id
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidPush(format!("issueId is not a number: {}", raw_id)))?;

        let status = data
            .get("status")
            .and_then(|s| s.parse().ok())
            .unwrap_or(IssueStatus::Unknown);

        Ok(Self {
            issue_id,
            update_type: data.get("updateType").cloned().filter(|t| !t.is_empty()),
            status,
            comment: data.get("comment").cloned(),
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let object = value
            .as_object()
            .ok_or_else(|| AppError::InvalidPush("payload is not a JSON object".into()))?;
        // Push data values are strings on the wire, but accept bare numbers too.
        let data: HashMap<String, String> = object
            .iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k.clone(), s.clone())),
                serde_json::Value::Number(n) => Some((k.clone(), n.to_string())),
                _ => None,
            })
            .collect();
        Self::from_data(&data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalNotice {
    pub title: String,
    pub body: String,
    pub issue_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNavigation {
    pub issue_id: i64,
    pub update_type: Option<String>,
    pub status: IssueStatus,
    pub recorded_at: DateTime<Utc>,
}

pub struct PushHandler {
    prefs: Arc<Preferences>,
}

impl PushHandler {
    pub fn new(prefs: Arc<Preferences>) -> Self {
        Self { prefs }
    }

    /// Build the notice to display and record where a tap should lead.
    pub fn handle(&self, msg: &PushMessage) -> Result<LocalNotice, AppError> {
        let kind = NotificationType::for_status(msg.status);
        let notice = LocalNotice {
            title: format!("{}: issue #{}", kind.label(), msg.issue_id),
            body: message_for(kind, msg.comment.as_deref()),
            issue_id: msg.issue_id,
        };

        let pending = PendingNavigation {
            issue_id: msg.issue_id,
            update_type: msg.update_type.clone(),
            status: msg.status,
            recorded_at: Utc::now(),
        };
        self.prefs.put(PENDING_NAVIGATION_KEY, &pending)?;

        tracing::info!(
            issue_id = msg.issue_id,
            status = %msg.status,
            update_type = ?msg.update_type,
            "push message handled"
        );
        Ok(notice)
    }

    pub fn pending_navigation(&self) -> Result<Option<PendingNavigation>, AppError> {
        self.prefs.get(PENDING_NAVIGATION_KEY)
    }

    /// Return the pending target and clear it, so it's only acted on once.
    pub fn take_pending_navigation(&self) -> Result<Option<PendingNavigation>, AppError> {
        self.prefs.take(PENDING_NAVIGATION_KEY)
    }
}
