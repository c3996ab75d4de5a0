pub mod issue;
pub mod notification;
pub mod page;
pub mod timestamp;
pub mod update;
pub mod user;

pub use issue::{Issue, IssueStatus, Location};
pub use notification::{Notification, NotificationType};
pub use page::Page;
pub use update::Update;
pub use user::{NewUser, User};
