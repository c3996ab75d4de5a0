use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campusfix::api::{BackendClient, IssueApi};
use campusfix::config::{self, Config};
use campusfix::models::{timestamp, Issue, IssueStatus, Notification};
use campusfix::notification::{AggregatorOptions, FeedState, NotificationAggregator, NotificationFeed};
use campusfix::push::{PushHandler, PushMessage};
use campusfix::report::{self, Attachment, IssueDraft};
use campusfix::store::{Preferences, PrefsReadStateStore};

mod cli;

/// Everything a command needs, wired once per process.
struct App {
    cfg: Config,
    client: Arc<BackendClient>,
    prefs: Arc<Preferences>,
    aggregator: Arc<NotificationAggregator>,
}

impl App {
    fn build(cfg: Config) -> anyhow::Result<Self> {
        let client = Arc::new(BackendClient::new(&cfg).context("failed to build backend client")?);
        let prefs = Arc::new(Preferences::open(&cfg.state_file));
        let read_state = Arc::new(PrefsReadStateStore::new(prefs.clone(), cfg.read_state_cap));
        let aggregator = Arc::new(NotificationAggregator::new(
            client.clone(),
            read_state,
            AggregatorOptions::from(&cfg),
        ));
        Ok(Self {
            cfg,
            client,
            prefs,
            aggregator,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(cfg.log_json);

    let args = cli::Cli::parse();
    tracing::debug!(api = %cfg.api_url, state = %cfg.state_file.display(), "starting");
    let app = App::build(cfg)?;

    let result = match args.command {
        cli::Commands::Login {
            email,
            name,
            push_token,
        } => handle_login(&app, &email, &name, push_token.as_deref()).await,
        cli::Commands::Logout { email } => handle_logout(&app, &email).await,
        cli::Commands::Notifications { command } => handle_notification_command(&app, command).await,
        cli::Commands::Issues { command } => handle_issue_command(&app, command).await,
        cli::Commands::Report {
            email,
            description,
            category,
            lat,
            lon,
            address,
            photos,
            videos,
        } => {
            let draft = IssueDraft {
                description,
                category,
                latitude: lat,
                longitude: lon,
                address,
            };
            let mut attachments = Vec::new();
            for path in photos.iter().chain(videos.iter()) {
                attachments.push(Attachment::from_path(path).await?);
            }
            handle_report(&app, &email, draft, attachments).await
        }
        cli::Commands::Push { command } => handle_push_command(&app, command),
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("campusfix=info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable (`--json`).
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn handle_login(
    app: &App,
    email: &str,
    name: &str,
    push_token: Option<&str>,
) -> anyhow::Result<()> {
    let user = app.client.ensure_user(email, name).await?;
    if let Some(token) = push_token {
        app.client.register_push_token(user.id, token).await?;
    }
    println!(
        "Signed in:\n  ID:    {}\n  Email: {}\n  Name:  {}\n  Push:  {}",
        user.id,
        user.email,
        user.name.as_deref().unwrap_or(name),
        if push_token.is_some() { "registered" } else { "unchanged" }
    );
    Ok(())
}

async fn handle_logout(app: &App, email: &str) -> anyhow::Result<()> {
    let user = app.client.find_user_by_email(email).await?;
    app.client.remove_push_token(user.id).await?;
    println!("Push notifications disabled for {}.", user.email);
    Ok(())
}

async fn handle_notification_command(
    app: &App,
    cmd: cli::NotificationCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::NotificationCommands::List {
            email,
            unread_only,
            grouped,
            json,
        } => {
            let feed = NotificationFeed::new(app.aggregator.clone(), email);
            if let FeedState::Failed { message } = feed.refresh().await {
                anyhow::bail!(message);
            }

            let mut items = feed.notifications();
            if unread_only {
                items.retain(|n| !n.read);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
                return Ok(());
            }
            if items.is_empty() {
                println!("No notifications.");
                return Ok(());
            }

            if grouped {
                for group in campusfix::notification::feed::group_by_day(&items, Utc::now()) {
                    println!("── {} ──", group.section.title());
                    print_notifications(&group.items);
                }
            } else {
                print_notifications(&items);
            }
            println!("\n{} unread", feed.unread_count());
        }
        cli::NotificationCommands::Read { email, id } => {
            let feed = NotificationFeed::new(app.aggregator.clone(), email);
            feed.mark_read(&id)?;
            println!("Marked {} as read.", id);
        }
        cli::NotificationCommands::ReadAll { email } => {
            let feed = NotificationFeed::new(app.aggregator.clone(), email);
            if let FeedState::Failed { message } = feed.refresh().await {
                anyhow::bail!(message);
            }
            let n = feed.mark_all_read()?;
            println!("Marked {} notification(s) as read.", n);
        }
    }
    Ok(())
}

fn print_notifications(items: &[Notification]) {
    println!(
        "{:<16} {:<4} {:<12} {:<20} MESSAGE",
        "ID", "READ", "TYPE", "WHEN"
    );
    for n in items {
        println!(
            "{:<16} {:<4} {:<12} {:<20} {} ({})",
            n.id,
            if n.read { "" } else { "•" },
            n.r#type.label(),
            n.timestamp.format("%Y-%m-%d %H:%M"),
            n.message,
            n.title
        );
    }
}

async fn handle_issue_command(app: &App, cmd: cli::IssueCommands) -> anyhow::Result<()> {
    let size = app.cfg.page_size;
    match cmd {
        cli::IssueCommands::Mine { email, page } => {
            let user = app.client.find_user_by_email(&email).await?;
            let issues = app.client.issues_by_user(user.id, page, size).await?;
            print_issues(&issues.content);
            println!(
                "\nPage {} of {} ({} issues)",
                issues.number + 1,
                issues.total_pages.max(1),
                issues.total_elements
            );
        }
        cli::IssueCommands::Status { status, page } => {
            let status: IssueStatus = status.parse().map_err(anyhow::Error::msg)?;
            let issues = app.client.issues_by_status(status, page, size).await?;
            print_issues(&issues.content);
        }
        cli::IssueCommands::Show { id } => {
            let issue = app.client.issue(id).await?;
            println!("Issue #{}", issue.id);
            println!("  Status:      {}", issue.status);
            println!("  Category:    {}", issue.category);
            println!("  Description: {}", issue.description);
            println!(
                "  Location:    {:.5}, {:.5}{}",
                issue.location.latitude,
                issue.location.longitude,
                issue
                    .location
                    .address
                    .as_deref()
                    .map(|a| format!(" ({})", a))
                    .unwrap_or_default()
            );
            println!("  Reported:    {}", timestamp::format(&issue.created_at));
            println!("  Updated:     {}", timestamp::format(&issue.updated_at));
            for url in issue.image_urls.iter().chain(issue.video_urls.iter()) {
                println!("  Media:       {}", url);
            }
        }
        cli::IssueCommands::Updates { id } => {
            let updates = app.client.issue_updates(id).await?;
            if updates.is_empty() {
                println!("No updates yet.");
                return Ok(());
            }
            println!("{:<8} {:<12} {:<20} COMMENT", "ID", "STATUS", "WHEN");
            for u in updates {
                println!(
                    "{:<8} {:<12} {:<20} {}",
                    u.id,
                    u.status,
                    timestamp::format(&u.timestamp),
                    u.comment.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

fn print_issues(issues: &[Issue]) {
    if issues.is_empty() {
        println!("No issues found.");
        return;
    }
    println!("{:<8} {:<12} {:<15} {:<20} TITLE", "ID", "STATUS", "CATEGORY", "REPORTED");
    for i in issues {
        println!(
            "{:<8} {:<12} {:<15} {:<20} {}",
            i.id,
            i.status,
            i.category,
            i.created_at.format("%Y-%m-%d %H:%M"),
            i.title()
        );
    }
}

async fn handle_report(
    app: &App,
    email: &str,
    draft: IssueDraft,
    attachments: Vec<Attachment>,
) -> anyhow::Result<()> {
    let issue = report::submit(&app.client, email, draft, &attachments).await?;
    println!(
        "Issue reported:\n  ID:       {}\n  Status:   {}\n  Category: {}\n  Media:    {}",
        issue.id,
        issue.status,
        issue.category,
        issue.image_urls.len() + issue.video_urls.len()
    );
    Ok(())
}

fn handle_push_command(app: &App, cmd: cli::PushCommands) -> anyhow::Result<()> {
    let handler = PushHandler::new(app.prefs.clone());
    match cmd {
        cli::PushCommands::Handle { data } => {
            let msg = PushMessage::from_json(&data)?;
            let notice = handler.handle(&msg)?;
            println!("{}\n{}", notice.title, notice.body);
        }
        cli::PushCommands::Pending { take } => {
            let pending = if take {
                handler.take_pending_navigation()?
            } else {
                handler.pending_navigation()?
            };
            match pending {
                Some(p) => println!(
                    "Open issue #{} (status {}, received {})",
                    p.issue_id,
                    p.status,
                    p.recorded_at.format("%Y-%m-%d %H:%M")
                ),
                None => println!("Nothing pending."),
            }
        }
    }
    Ok(())
}
