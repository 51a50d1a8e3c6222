pub mod daily_digest;
pub mod email_message;
pub mod prelude;
