use crate::submission::SubmissionRequest;

/// Renders the chat notification for a submission.
///
/// The text is sent with `parse_mode=HTML`, so interpolated values are
/// escaped; otherwise a stray `<` in a message makes the Bot API reject it.
pub fn format_notification(submission: &SubmissionRequest) -> String {
    format!(
        "📨 New Contact Form Submission\n\n👤 Name: {}\n📧 Email: {}\n💬 Message: {}",
        escape_html(&submission.name),
        escape_html(&submission.email),
        escape_html(&submission.message),
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
