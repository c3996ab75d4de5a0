//! Notification aggregation.
//!
//! Builds a user's notification list from scratch on every call:
//! user lookup -> issues -> per-issue update history -> synthesized
//! notifications -> newest first -> read state overlaid.
//!
//! Failure handling differs by stage. A failed user lookup or issue listing
//! fails the whole load. A failed update fetch for a single issue is logged
//! and that issue is left out; every other issue still contributes.
//!
//! After a load where every issue answered, the read store is compacted
//! against the ids just produced. A partial load skips compaction, since the
//! missing issue's read ids are still valid.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::api::IssueApi;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Issue, Notification};
use crate::notification::synth::synthesize;
use crate::store::ReadStateStore;

/// Upper bound on pages walked when `fetch_all_pages` is on.
const MAX_PAGES: u32 = 100;

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub page_size: u32,
    /// `false` requests page 0 only.
    pub fetch_all_pages: bool,
    /// Max in-flight update fetches. 1 = one issue at a time.
    pub concurrency: usize,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            fetch_all_pages: false,
            concurrency: 1,
        }
    }
}

impl From<&Config> for AggregatorOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            page_size: cfg.page_size,
            fetch_all_pages: cfg.fetch_all_pages,
            concurrency: cfg.fetch_concurrency.max(1),
        }
    }
}

pub struct NotificationAggregator {
    api: Arc<dyn IssueApi>,
    read_state: Arc<dyn ReadStateStore>,
    opts: AggregatorOptions,
}

impl NotificationAggregator {
    pub fn new(
        api: Arc<dyn IssueApi>,
        read_state: Arc<dyn ReadStateStore>,
        opts: AggregatorOptions,
    ) -> Self {
        Self {
            api,
            read_state,
            opts,
        }
    }

    pub fn read_state(&self) -> &Arc<dyn ReadStateStore> {
        &self.read_state
    }

    /// All notifications for `email`, most recent first.
    pub async fn load(&self, email: &str) -> Result<Vec<Notification>, AppError> {
        let user = self.api.find_user_by_email(email).await.map_err(|e| {
            warn!(user = %email, error = %e, "could not resolve user for notifications");
            e
        })?;

        let issues = self.user_issues(user.id).await?;
        debug!(user_id = user.id, issues = issues.len(), "fetched issues for notifications");

        let per_issue: Vec<Option<Vec<Notification>>> = stream::iter(issues.iter())
            .map(|issue| self.notifications_for(issue))
            .buffered(self.opts.concurrency.max(1))
            .collect()
            .await;
        let complete = per_issue.iter().all(Option::is_some);

        let mut notifications: Vec<Notification> = per_issue.into_iter().flatten().flatten().collect();
        // Stable: equal timestamps keep issue/update fetch order.
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        self.overlay_read_state(email, &mut notifications);
        if complete {
            self.compact_read_state(email, &notifications);
        }

        info!(
            user = %email,
            total = notifications.len(),
            unread = notifications.iter().filter(|n| !n.read).count(),
            "notifications loaded"
        );
        Ok(notifications)
    }

    pub async fn unread_count(&self, email: &str) -> Result<usize, AppError> {
        Ok(self.load(email).await?.iter().filter(|n| !n.read).count())
    }

    /// Flag every notification whose id is in the user's read set. A store
    /// failure leaves everything unread rather than failing the load.
    pub fn overlay_read_state(&self, email: &str, notifications: &mut [Notification]) {
        match self.read_state.read_ids(email) {
            Ok(read) => {
                for n in notifications.iter_mut() {
                    n.read = read.contains(&n.id);
                }
            }
            Err(e) => warn!(user = %email, error = %e, "read state unavailable, showing all as unread"),
        }
    }

    fn compact_read_state(&self, email: &str, notifications: &[Notification]) {
        let live: HashSet<String> = notifications.iter().map(|n| n.id.clone()).collect();
        match self.read_state.compact(email, &live) {
            Ok(0) => {}
            Ok(pruned) => debug!(user = %email, pruned, "compacted read state"),
            Err(e) => warn!(user = %email, error = %e, "read state compaction failed"),
        }
    }

    async fn user_issues(&self, user_id: i64) -> Result<Vec<Issue>, AppError> {
        let mut issues = Vec::new();
        let mut page_no = 0;

        loop {
            let page = self
                .api
                .issues_by_user(user_id, page_no, self.opts.page_size)
                .await?;
            let done = !self.opts.fetch_all_pages || page.is_last() || page.content.is_empty();
            issues.extend(page.content);

            if done {
                break;
            }
            page_no += 1;
            if page_no >= MAX_PAGES {
                warn!(user_id, pages = MAX_PAGES, "stopped walking issue pages at limit");
                break;
            }
        }
        Ok(issues)
    }

    /// `None` when the issue's updates could not be fetched.
    async fn notifications_for(&self, issue: &Issue) -> Option<Vec<Notification>> {
        match self.api.issue_updates(issue.id).await {
            Ok(updates) => Some(updates.iter().map(|u| synthesize(u, issue)).collect()),
            Err(e) => {
                warn!(issue_id = issue.id, error = %e, "skipping issue: update fetch failed");
                None
            }
        }
    }
}
