//! HTTP client for the campus backend.
//!
//! Endpoints:
//! - `GET    /api/users/email/{email}`
//! - `POST   /api/users`
//! - `POST   /api/users/{id}/fcm-token`, `DELETE /api/users/{id}/fcm-token`
//! - `GET    /api/issues/user/{userId}?page=&size=`
//! - `GET    /api/issues/status/{STATUS}?page=&size=`
//! - `GET    /api/issues/{id}`, `GET /api/issues/{id}/updates`
//! - `POST   /api/issues` (multipart: `issue` JSON part + `files` parts)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::IssueApi;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Issue, IssueStatus, NewUser, Page, Update, User};
use crate::report::{Attachment, IssueDraft};

/// Longest response body kept in an error, in bytes.
const MAX_ERROR_BODY: usize = 512;

pub struct BackendClient {
    base: Url,
    token: Option<String>,
    http: ClientWithMiddleware,
    /// Un-wrapped client for multipart uploads; streaming bodies can't be
    /// replayed by the retry layer and submissions must not be repeated.
    raw: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueSubmission<'a> {
    #[serde(flatten)]
    draft: &'a IssueDraft,
    user_id: i64,
}

#[derive(Serialize)]
struct PushTokenBody<'a> {
    token: &'a str,
}

impl BackendClient {
    pub fn new(cfg: &Config) -> Result<Self, AppError> {
        let raw = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("campusfix/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut builder = ClientBuilder::new(raw.clone());
        if cfg.http_max_retries > 0 {
            let policy = ExponentialBackoff::builder().build_with_max_retries(cfg.http_max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(policy));
        }

        Ok(Self {
            base: cfg.api_url.clone(),
            token: cfg.api_token.clone(),
            http: builder.build(),
            raw,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `base` + `/api/...segments`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("API URL cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        tracing::debug!(%url, "GET");
        let resp = self.authed(self.http.get(url).query(query)).send().await?;
        decode(check(resp).await?).await
    }

    pub async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let url = self.endpoint(&["users"])?;
        let resp = self.authed(self.http.post(url).json(new_user)).send().await?;
        let user: User = decode(check(resp).await?).await?;
        tracing::info!(user_id = user.id, email = %user.email, "created backend user");
        Ok(user)
    }

    /// Look the user up and create them on first sign-in.
    pub async fn ensure_user(&self, email: &str, name: &str) -> Result<User, AppError> {
        match self.find_user_by_email(email).await {
            Ok(user) => Ok(user),
            Err(AppError::UserNotFound) => {
                self.create_user(&NewUser {
                    email: email.to_string(),
                    name: name.to_string(),
                })
                .await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn issues_by_status(
        &self,
        status: IssueStatus,
        page: u32,
        size: u32,
    ) -> Result<Page<Issue>, AppError> {
        let url = self.endpoint(&["issues", "status", status.as_str()])?;
        self.get_json(url, &[("page", page.to_string()), ("size", size.to_string())])
            .await
    }

    pub async fn issue(&self, issue_id: i64) -> Result<Issue, AppError> {
        let url = self.endpoint(&["issues", &issue_id.to_string()])?;
        match self.get_json(url, &[]).await {
            Err(AppError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(AppError::IssueNotFound(issue_id))
            }
            other => other,
        }
    }

    pub async fn submit_issue(
        &self,
        user_id: i64,
        draft: &IssueDraft,
        attachments: &[Attachment],
    ) -> Result<Issue, AppError> {
        let url = self.endpoint(&["issues"])?;
        let issue_json = serde_json::to_string(&IssueSubmission { draft, user_id })?;

        let mut form = Form::new().part("issue", Part::text(issue_json).mime_str("application/json")?);
        for attachment in attachments {
            let part = Part::bytes(attachment.bytes.clone())
                .file_name(attachment.file_name.clone())
                .mime_str(attachment.mime)?;
            form = form.part("files", part);
        }

        let mut req = self.raw.post(url).multipart(form);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let issue: Issue = decode(check(resp).await?).await?;
        tracing::info!(
            issue_id = issue.id,
            user_id,
            attachments = attachments.len(),
            "issue submitted"
        );
        Ok(issue)
    }

    pub async fn register_push_token(&self, user_id: i64, token: &str) -> Result<(), AppError> {
        let url = self.endpoint(&["users", &user_id.to_string(), "fcm-token"])?;
        let resp = self
            .authed(self.http.post(url).json(&PushTokenBody { token }))
            .send()
            .await?;
        check(resp).await?;
        tracing::info!(user_id, "push token registered");
        Ok(())
    }

    pub async fn remove_push_token(&self, user_id: i64) -> Result<(), AppError> {
        let url = self.endpoint(&["users", &user_id.to_string(), "fcm-token"])?;
        let resp = self.authed(self.http.delete(url)).send().await?;
        check(resp).await?;
        tracing::info!(user_id, "push token removed");
        Ok(())
    }
}

#[async_trait]
impl IssueApi for BackendClient {
    async fn find_user_by_email(&self, email: &str) -> Result<User, AppError> {
        let url = self.endpoint(&["users", "email", email.trim()])?;
        match self.get_json(url, &[]).await {
            Err(AppError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(AppError::UserNotFound)
            }
            other => other,
        }
    }

    async fn issues_by_user(
        &self,
        user_id: i64,
        page: u32,
        size: u32,
    ) -> Result<Page<Issue>, AppError> {
        let url = self.endpoint(&["issues", "user", &user_id.to_string()])?;
        self.get_json(url, &[("page", page.to_string()), ("size", size.to_string())])
            .await
    }

    async fn issue_updates(&self, issue_id: i64) -> Result<Vec<Update>, AppError> {
        let url = self.endpoint(&["issues", &issue_id.to_string(), "updates"])?;
        self.get_json(url, &[]).await
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    tracing::debug!(%status, body = %body, "backend returned non-success status");
    Err(AppError::Status { status, body })
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AppError> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base: &str) -> BackendClient {
        let cfg = Config {
            api_url: Url::parse(base).unwrap(),
            ..Config::default()
        };
        BackendClient::new(&cfg).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client_for("http://localhost:8080");
        let url = client.endpoint(&["issues", "12", "updates"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/issues/12/updates");
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes() {
        let client = client_for("https://campus.example.edu/fix/");
        let url = client.endpoint(&["users", "email", "a b@x.edu"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://campus.example.edu/fix/api/users/email/a%20b@x.edu"
        );
    }
}
