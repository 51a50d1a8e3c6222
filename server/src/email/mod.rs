pub mod mailer;
pub mod prepared_message;
pub mod template;
