use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// campusfix: report campus issues and follow their progress
#[derive(Parser)]
#[command(name = "campusfix", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register the signed-in user with the backend (creates them on first use)
    Login {
        #[arg(long, env = "CAMPUSFIX_USER_EMAIL")]
        email: String,
        #[arg(long)]
        name: String,
        /// Push token to register for update notifications
        #[arg(long)]
        push_token: Option<String>,
    },

    /// Stop push delivery for a user
    Logout {
        #[arg(long, env = "CAMPUSFIX_USER_EMAIL")]
        email: String,
    },

    /// Issue update notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },

    /// Browse issues
    Issues {
        #[command(subcommand)]
        command: IssueCommands,
    },

    /// Submit a new issue report
    Report {
        #[arg(long, env = "CAMPUSFIX_USER_EMAIL")]
        email: String,
        #[arg(long)]
        description: String,
        /// Infrastructure, Electrical, Plumbing, Cleanliness, Safety, IT or Other
        #[arg(long)]
        category: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Human-readable place, e.g. "Library, 2nd floor"
        #[arg(long)]
        address: Option<String>,
        /// Photo to attach (repeatable)
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
        /// Video to attach
        #[arg(long = "video")]
        videos: Vec<PathBuf>,
    },

    /// Inbound push messages
    Push {
        #[command(subcommand)]
        command: PushCommands,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications, most recent first
    List {
        #[arg(long, env = "CAMPUSFIX_USER_EMAIL")]
        email: String,
        #[arg(long)]
        unread_only: bool,
        /// Group into Today / Yesterday / Earlier
        #[arg(long)]
        grouped: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Mark one notification read
    Read {
        #[arg(long, env = "CAMPUSFIX_USER_EMAIL")]
        email: String,
        #[arg(long)]
        id: String,
    },
    /// Mark every current notification read
    ReadAll {
        #[arg(long, env = "CAMPUSFIX_USER_EMAIL")]
        email: String,
    },
}

#[derive(Subcommand)]
pub enum IssueCommands {
    /// Issues reported by a user
    Mine {
        #[arg(long, env = "CAMPUSFIX_USER_EMAIL")]
        email: String,
        #[arg(long, default_value = "0")]
        page: u32,
    },
    /// Issues in a given status (pending, in-progress, completed)
    Status {
        #[arg(long)]
        status: String,
        #[arg(long, default_value = "0")]
        page: u32,
    },
    /// Show one issue
    Show {
        #[arg(long)]
        id: i64,
    },
    /// Update history of one issue
    Updates {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum PushCommands {
    /// Handle a push data payload, e.g. '{"issueId":"12","status":"COMPLETED"}'
    Handle {
        #[arg(long)]
        data: String,
    },
    /// Show the issue a tapped push should open
    Pending {
        /// Clear it after printing
        #[arg(long)]
        take: bool,
    },
}
