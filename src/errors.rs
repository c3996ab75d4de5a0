use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("user not found")]
    UserNotFound,

    #[error("issue {0} not found")]
    IssueNotFound(i64),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid issue draft: {0}")]
    Validation(String),

    #[error("attachment error: {0}")]
    Attachment(String),

    #[error("invalid push message: {0}")]
    InvalidPush(String),

    #[error("local state error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Text for the error banner shown above an empty screen.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::UserNotFound => "We couldn't find your account. Tap to retry.",
            AppError::IssueNotFound(_) => "This issue is no longer available.",
            AppError::Status { status, .. } if status.is_server_error() => {
                "The server is having trouble. Tap to retry."
            }
            AppError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                "Your session has expired. Please sign in again."
            }
            AppError::Http(_) | AppError::Middleware(_) => {
                "Could not reach the server. Check your connection and tap to retry."
            }
            AppError::Validation(_) | AppError::Attachment(_) => {
                "Please check your report and try again."
            }
            _ => "Something went wrong. Tap to retry.",
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => e.is_timeout() || e.is_connect(),
            AppError::Middleware(_) => true,
            AppError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Store(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}
