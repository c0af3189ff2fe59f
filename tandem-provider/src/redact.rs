//! Scrubbing of provider text before it reaches logs or clients.

/// Maximum length of provider text carried in an error message.
pub const MAX_PROVIDER_MESSAGE_LEN: usize = 500;

const REDACTED: &str = "[REDACTED]";

/// Remove every occurrence of `secret` and cap the result at
/// [`MAX_PROVIDER_MESSAGE_LEN`] characters.
pub fn redact(text: &str, secret: &str) -> String {
    let scrubbed = if secret.len() >= 4 {
        text.replace(secret, REDACTED)
    } else {
        text.to_string()
    };
    truncate_chars(&scrubbed, MAX_PROVIDER_MESSAGE_LEN)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
