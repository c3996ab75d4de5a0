//! Presentation-side notification state.
//!
//! `NotificationFeed` owns the current list for one signed-in user and
//! publishes every state change on a `watch` channel, so a UI (or the CLI)
//! renders from one place. Retrying is just calling `refresh` again.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;

use crate::errors::AppError;
use crate::models::{Notification, NotificationType};
use crate::notification::aggregator::NotificationAggregator;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedState {
    Idle,
    Loading,
    Loaded(Vec<Notification>),
    /// Load failed; the list is empty and `message` goes in the error banner.
    Failed { message: String },
}

impl FeedState {
    pub fn notifications(&self) -> &[Notification] {
        match self {
            FeedState::Loaded(list) => list,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Today,
    Yesterday,
    Earlier,
}

impl Section {
    pub fn title(&self) -> &'static str {
        match self {
            Section::Today => "Today",
            Section::Yesterday => "Yesterday",
            Section::Earlier => "Earlier",
        }
    }

    fn of(ts: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let day = ts.date_naive();
        if day >= today {
            Section::Today
        } else if day == today - Duration::days(1) {
            Section::Yesterday
        } else {
            Section::Earlier
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationGroup {
    pub section: Section,
    pub items: Vec<Notification>,
}

pub struct NotificationFeed {
    aggregator: Arc<NotificationAggregator>,
    email: String,
    state: watch::Sender<FeedState>,
}

impl NotificationFeed {
    pub fn new(aggregator: Arc<NotificationAggregator>, email: impl Into<String>) -> Self {
        let (state, _) = watch::channel(FeedState::Idle);
        Self {
            aggregator,
            email: email.into(),
            state,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.borrow().notifications().to_vec()
    }

    /// Re-run the whole aggregation. Errors end up in `FeedState::Failed`.
    pub async fn refresh(&self) -> FeedState {
        self.state.send_replace(FeedState::Loading);

        let next = match self.aggregator.load(&self.email).await {
            Ok(list) => FeedState::Loaded(list),
            Err(e) => {
                tracing::error!(user = %self.email, error = %e, "notification refresh failed");
                FeedState::Failed {
                    message: failure_message(&e),
                }
            }
        };
        self.state.send_replace(next.clone());
        next
    }

    /// Persist `id` as read and flip it in the current list.
    /// Returns whether `id` was in the list.
    pub fn mark_read(&self, id: &str) -> Result<bool, AppError> {
        self.aggregator.read_state().mark_read(&self.email, id)?;

        let mut found = false;
        self.state.send_modify(|state| {
            if let FeedState::Loaded(list) = state {
                if let Some(n) = list.iter_mut().find(|n| n.id == id) {
                    n.read = true;
                    found = true;
                }
            }
        });
        Ok(found)
    }

    /// Mark everything currently listed as read. Returns how many were unread.
    pub fn mark_all_read(&self) -> Result<usize, AppError> {
        let unread: Vec<String> = self
            .state
            .borrow()
            .notifications()
            .iter()
            .filter(|n| !n.read)
            .map(|n| n.id.clone())
            .collect();
        if unread.is_empty() {
            return Ok(0);
        }

        self.aggregator
            .read_state()
            .mark_all_read(&self.email, &unread)?;
        self.state.send_modify(|state| {
            if let FeedState::Loaded(list) = state {
                list.iter_mut().for_each(|n| n.read = true);
            }
        });
        Ok(unread.len())
    }

    pub fn unread_count(&self) -> usize {
        self.state
            .borrow()
            .notifications()
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    /// Today / Yesterday / Earlier sections relative to `now`, newest first,
    /// empty sections left out.
    pub fn grouped(&self, now: DateTime<Utc>) -> Vec<NotificationGroup> {
        group_by_day(self.state.borrow().notifications(), now)
    }

    pub fn filtered(&self, kind: NotificationType) -> Vec<Notification> {
        self.state
            .borrow()
            .notifications()
            .iter()
            .filter(|n| n.r#type == kind)
            .cloned()
            .collect()
    }
}

pub fn group_by_day(list: &[Notification], now: DateTime<Utc>) -> Vec<NotificationGroup> {
    let mut groups: Vec<NotificationGroup> = [Section::Today, Section::Yesterday, Section::Earlier]
        .into_iter()
        .map(|section| NotificationGroup {
            section,
            items: Vec::new(),
        })
        .collect();

    for n in list {
        let idx = match Section::of(n.timestamp, now) {
            Section::Today => 0,
            Section::Yesterday => 1,
            Section::Earlier => 2,
        };
        groups[idx].items.push(n.clone());
    }

    for group in &mut groups {
        group.items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
    groups.retain(|g| !g.items.is_empty());
    groups
}

fn failure_message(e: &AppError) -> String {
    match e {
        AppError::UserNotFound => AppError::UserNotFound.user_message().to_string(),
        other if other.is_transient() => other.user_message().to_string(),
        _ => "Could not load notifications. Tap to retry.".to_string(),
    }
}
