pub use super::daily_digest::Entity as DailyDigest;
pub use super::email_message::Entity as EmailMessage;
