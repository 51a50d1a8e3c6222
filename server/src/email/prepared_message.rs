use entity::email_message;
use regex::Regex;

const RE_WHITESPACE_STR: &str = r"[\r\t\n]+";
const RE_LONG_SPACE_STR: &str = r" {2,}";
const RE_HTTP_LINK_STR: &str = r"https?:\/\/(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&//=]*)";

/// Upper bound on how much of one email body goes into a summary prompt.
const MAX_PROMPT_BODY_CHARS: usize = 1500;

lazy_static::lazy_static!(
    static ref RE_WHITESPACE: Regex = Regex::new(RE_WHITESPACE_STR).unwrap();
    static ref RE_LONG_SPACE: Regex = Regex::new(RE_LONG_SPACE_STR).unwrap();
    static ref RE_HTTP_LINK: Regex = Regex::new(RE_HTTP_LINK_STR).unwrap();
);

/// Derive a prompt-safe plain text body for a stored message. Prefers the
/// plain body; falls back to stripping the HTML body when the plain one is
/// missing or empty. Links and whitespace runs collapse so they don't eat
/// prompt space.
pub fn prompt_body(msg: &email_message::Model) -> String {
    let raw = match (&msg.body, &msg.html_body) {
        (Some(body), _) if !body.trim().is_empty() => body.clone(),
        (_, Some(html)) => html2text::from_read(html.as_bytes(), 400),
        _ => String::new(),
    };

    let b = RE_HTTP_LINK.replace_all(&raw, "[LINK]");
    let b = RE_WHITESPACE.replace_all(&b, " ");
    let b = RE_LONG_SPACE.replace_all(&b, " ");
    let b = b.trim();

    truncate_chars(b, MAX_PROMPT_BODY_CHARS)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::common::test_message;
    use chrono::Utc;

    #[test]
    fn test_prompt_body_prefers_plain_text() {
        let mut msg = test_message("m1", Utc::now());
        msg.body = Some("Plain body".to_string());
        msg.html_body = Some("<p>Html body</p>".to_string());

        assert_eq!(prompt_body(&msg), "Plain body");
    }

    #[test]
    fn test_prompt_body_falls_back_to_html() {
        let mut msg = test_message("m1", Utc::now());
        msg.body = Some("   ".to_string());
        msg.html_body = Some("<p>Hello <b>there</b></p>".to_string());

        let body = prompt_body(&msg);
        assert!(body.contains("Hello"));
        assert!(body.contains("there"));
        assert!(!body.contains("<p>"));
    }

    #[test]
    fn test_prompt_body_normalizes_whitespace_and_links() {
        let mut msg = test_message("m1", Utc::now());
        msg.body = Some("Check https://example.com/offer\n\nnow    please".to_string());

        let body = prompt_body(&msg);
        assert_eq!(body, "Check [LINK] now please");
    }

    #[test]
    fn test_prompt_body_truncates() {
        let mut msg = test_message("m1", Utc::now());
        msg.body = Some("x".repeat(5000));

        assert_eq!(prompt_body(&msg).chars().count(), MAX_PROMPT_BODY_CHARS);
    }

    #[test]
    fn test_prompt_body_empty_message() {
        let mut msg = test_message("m1", Utc::now());
        msg.body = None;
        msg.html_body = None;

        assert_eq!(prompt_body(&msg), "");
    }
}
