//! Prompt assembly for a chat turn.

use parley_types::PromptMessage;
use tracing::warn;

/// Metadata of one uploaded file. The server never reads file contents into
/// the prompt; the model only sees this summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Parse the `messages` form field.
///
/// A missing or unreadable history is not fatal: the turn proceeds with no
/// prior context.
pub fn parse_history(raw: Option<&str>) -> Vec<PromptMessage> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<PromptMessage>>(raw) {
        Ok(history) => history,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable message history");
            Vec::new()
        }
    }
}

/// `File: <name> (<mime>, <size>KB)` per file, joined with `", "`.
pub fn describe_attachments(files: &[UploadedFile]) -> String {
    files
        .iter()
        .map(|f| {
            let kb = (f.size as f64 / 1024.0).round() as u64;
            format!("File: {} ({}, {kb}KB)", f.name, f.mime_type)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// History followed by the current user turn, with attachment summaries
/// appended to its text.
pub fn build_prompt(
    mut history: Vec<PromptMessage>,
    message: &str,
    files: &[UploadedFile],
) -> Vec<PromptMessage> {
    let mut content = message.to_owned();
    if !files.is_empty() {
        content.push_str("\n\nAttached files: ");
        content.push_str(&describe_attachments(files));
    }
    history.push(PromptMessage::user(content));
    history
}

#[cfg(test)]
mod test {
    use super::*;
    use parley_types::PromptRole;
    use tracing_test::traced_test;

    fn file(name: &str, mime: &str, size: u64) -> UploadedFile {
        UploadedFile {
            name: name.into(),
            mime_type: mime.into(),
            size,
        }
    }

    #[test]
    fn describes_files_with_rounded_kilobytes() {
        let files = [file("a.png", "image/png", 2048), file("b.txt", "text/plain", 1535)];
        assert_eq!(
            describe_attachments(&files),
            "File: a.png (image/png, 2KB), File: b.txt (text/plain, 1KB)"
        );
        assert_eq!(describe_attachments(&[file("c", "x/y", 512)]), "File: c (x/y, 1KB)");
    }

    #[test]
    fn prompt_ends_with_current_turn() {
        let history = parse_history(Some(
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello","id":"x"}]"#,
        ));
        let prompt = build_prompt(history, "what now?", &[]);
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[1].role, PromptRole::Assistant);
        assert_eq!(prompt[2], PromptMessage::user("what now?"));
    }

    #[test]
    fn attachments_are_summarised_in_the_user_turn() {
        let prompt = build_prompt(Vec::new(), "look", &[file("a.png", "image/png", 2048)]);
        assert_eq!(
            prompt[0].content,
            "look\n\nAttached files: File: a.png (image/png, 2KB)"
        );
    }

    #[traced_test]
    #[test]
    fn malformed_history_is_dropped_with_a_warning() {
        assert!(parse_history(Some("not json")).is_empty());
        assert!(logs_contain("ignoring unreadable message history"));
        assert!(parse_history(None).is_empty());
        assert!(parse_history(Some("  ")).is_empty());
    }
}
