use crate::models::{Issue, Notification, NotificationType, Update};

pub const RESOLVED_MESSAGE: &str = "Issue resolved, check now";
pub const IN_PROGRESS_MESSAGE: &str = "Your issue is now in progress";
pub const DEFAULT_MESSAGE: &str = "New update on your report";

/// Display text for a notification of `kind`. Only `NewReport` looks at the comment.
pub fn message_for(kind: NotificationType, comment: Option<&str>) -> String {
    match kind {
        NotificationType::IssueResolved => RESOLVED_MESSAGE.to_string(),
        NotificationType::UpdateRequest => IN_PROGRESS_MESSAGE.to_string(),
        NotificationType::NewReport => comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_MESSAGE)
            .to_string(),
    }
}

pub fn synthesize(update: &Update, issue: &Issue) -> Notification {
    let kind = NotificationType::for_status(update.status);
    Notification {
        id: Notification::id_for_update(update.id),
        issue_id: issue.id,
        title: issue.title(),
        r#type: kind,
        message: message_for(kind, update.comment.as_deref()),
        timestamp: update.timestamp,
        read: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueStatus, Location};
    use chrono::{TimeZone, Utc};

    fn issue() -> Issue {
        Issue {
            id: 5,
            description: "Projector not working in LH-3".into(),
            category: "IT".into(),
            status: IssueStatus::Pending,
            location: Location::default(),
            image_urls: vec![],
            video_urls: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            user_id: Some(1),
        }
    }

    fn update(id: i64, status: IssueStatus, comment: Option<&str>) -> Update {
        Update {
            id,
            issue_id: Some(5),
            status,
            comment: comment.map(String::from),
            image_urls: vec![],
            video_urls: vec![],
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_completed_ignores_comment() {
        let n = synthesize(
            &update(11, IssueStatus::Completed, Some("Replaced the bulb")),
            &issue(),
        );
        assert_eq!(n.r#type, NotificationType::IssueResolved);
        assert_eq!(n.message, "Issue resolved, check now");
    }

    #[test]
    fn test_in_progress_message_is_fixed() {
        let n = synthesize(&update(12, IssueStatus::InProgress, Some("on it")), &issue());
        assert_eq!(n.r#type, NotificationType::UpdateRequest);
        assert_eq!(n.message, IN_PROGRESS_MESSAGE);
    }

    #[test]
    fn test_default_uses_comment_then_fallback() {
        let with_comment = synthesize(
            &update(13, IssueStatus::Pending, Some("  Technician assigned  ")),
            &issue(),
        );
        assert_eq!(with_comment.r#type, NotificationType::NewReport);
        assert_eq!(with_comment.message, "Technician assigned");

        let blank = synthesize(&update(14, IssueStatus::Unknown, Some("   ")), &issue());
        assert_eq!(blank.message, DEFAULT_MESSAGE);

        let none = synthesize(&update(15, IssueStatus::Pending, None), &issue());
        assert_eq!(none.message, DEFAULT_MESSAGE);
    }

    #[test]
    fn test_identity_and_fields_come_from_update() {
        let u = update(99, IssueStatus::Pending, None);
        let n = synthesize(&u, &issue());
        assert_eq!(n.id, "update_99");
        assert_eq!(n.issue_id, 5);
        assert_eq!(n.title, "Projector not working in LH-3");
        assert_eq!(n.timestamp, u.timestamp);
        assert!(!n.read);
    }
}
