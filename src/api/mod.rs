//! Backend REST API.
//!
//! [`IssueApi`] is the narrow seam the notification aggregator depends on;
//! [`BackendClient`] implements it against the real backend and also exposes
//! the rest of the endpoints the app uses.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Issue, Page, Update, User};

pub mod client;

pub use client::BackendClient;

#[async_trait]
pub trait IssueApi: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<User, AppError>;

    async fn issues_by_user(
        &self,
        user_id: i64,
        page: u32,
        size: u32,
    ) -> Result<Page<Issue>, AppError>;

    async fn issue_updates(&self, issue_id: i64) -> Result<Vec<Update>, AppError>;
}
