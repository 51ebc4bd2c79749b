//! Building attachments from user-selected files.
//!
//! Files are carried inline as data URLs until the turn is sent, at which
//! point [`decode_payload`] turns them back into raw bytes for the multipart
//! request.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parley_types::{Attachment, MAX_ATTACHMENT_BYTES};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("File {name} is too large. Maximum size is {}MB.", .limit / (1024 * 1024))]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("attachment {name} has an invalid inline payload: {reason}")]
    InvalidPayload { name: String, reason: String },

    #[error("failed to read attachment: {0}")]
    Io(#[from] std::io::Error),
}

/// Build an attachment from an in-memory file.
pub fn from_bytes(
    name: impl Into<String>,
    mime_type: impl Into<String>,
    bytes: &[u8],
) -> Result<Attachment, AttachmentError> {
    let name = name.into();
    let size = bytes.len() as u64;
    check_size(&name, size)?;

    let mut mime_type = mime_type.into();
    if mime_type.trim().is_empty() {
        mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
    }
    let data = format!("data:{mime_type};base64,{}", STANDARD.encode(bytes));

    Ok(Attachment {
        id: Uuid::new_v4().to_string(),
        name,
        mime_type,
        size,
        url: None,
        data: Some(data),
    })
}

/// Read a file from disk. The size limit is checked against the file's
/// metadata before any content is read.
pub async fn from_path(path: impl AsRef<Path>) -> Result<Attachment, AttachmentError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_owned());

    let size = tokio::fs::metadata(path).await?.len();
    check_size(&name, size)?;

    let bytes = tokio::fs::read(path).await?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_owned();
    from_bytes(name, mime_type, &bytes)
}

/// Reject attachments over [`MAX_ATTACHMENT_BYTES`].
pub fn ensure_within_limit(attachment: &Attachment) -> Result<(), AttachmentError> {
    check_size(&attachment.name, attachment.size)
}

/// Raw bytes of the inline payload, or `None` if the attachment only has an
/// external reference.
pub fn decode_payload(attachment: &Attachment) -> Result<Option<Vec<u8>>, AttachmentError> {
    let Some(data) = attachment.data.as_deref() else {
        return Ok(None);
    };
    let invalid = |reason: &str| AttachmentError::InvalidPayload {
        name: attachment.name.clone(),
        reason: reason.to_owned(),
    };

    let (header, body) = data.split_once(',').ok_or_else(|| invalid("missing ','"))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(invalid("expected a base64 data URL"));
    }
    STANDARD
        .decode(body)
        .map(Some)
        .map_err(|e| invalid(&e.to_string()))
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `10 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

fn check_size(name: &str, size: u64) -> Result<(), AttachmentError> {
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            name: name.to_owned(),
            size,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payload_survives_encoding() {
        let att = from_bytes("a.bin", "application/octet-stream", &[0, 1, 2, 255]).unwrap();
        assert_eq!(att.size, 4);
        assert!(att.data.as_deref().unwrap().starts_with("data:application/octet-stream;base64,"));
        assert_eq!(decode_payload(&att).unwrap().unwrap(), vec![0, 1, 2, 255]);
    }

    #[test]
    fn eleven_mebibytes_is_rejected() {
        let bytes = vec![0u8; 11 * 1024 * 1024];
        let err = from_bytes("big.pdf", "application/pdf", &bytes).unwrap_err();
        assert!(matches!(err, AttachmentError::TooLarge { size, .. } if size == 11 * 1024 * 1024));
        assert_eq!(err.to_string(), "File big.pdf is too large. Maximum size is 10MB.");
    }

    #[test]
    fn exactly_ten_mebibytes_is_accepted() {
        let bytes = vec![0u8; MAX_ATTACHMENT_BYTES as usize];
        assert!(from_bytes("edge.bin", "application/octet-stream", &bytes).is_ok());
    }

    #[test]
    fn empty_mime_is_guessed_from_name() {
        let att = from_bytes("photo.png", "", b"png").unwrap();
        assert_eq!(att.mime_type, "image/png");
    }

    #[test]
    fn external_reference_has_no_payload() {
        let mut att = from_bytes("x.txt", "text/plain", b"x").unwrap();
        att.data = None;
        att.url = Some("https://example.com/x.txt".into());
        assert!(decode_payload(&att).unwrap().is_none());
    }

    #[test]
    fn non_base64_payload_is_rejected() {
        let mut att = from_bytes("x.txt", "text/plain", b"x").unwrap();
        att.data = Some("data:text/plain,hello".into());
        assert!(matches!(
            decode_payload(&att),
            Err(AttachmentError::InvalidPayload { .. })
        ));
        att.data = Some("data:text/plain;base64,@@@".into());
        assert!(decode_payload(&att).is_err());
    }

    #[test]
    fn tampered_size_is_caught() {
        let mut att = from_bytes("x.txt", "text/plain", b"x").unwrap();
        att.size = MAX_ATTACHMENT_BYTES + 1;
        assert!(ensure_within_limit(&att).is_err());
    }

    #[test]
    fn file_sizes_format_like_the_picker() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }

    #[tokio::test]
    async fn from_path_reads_file_and_guesses_type() {
        let dir = std::env::temp_dir().join(format!("parley-att-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let att = from_path(&path).await.unwrap();
        assert_eq!(att.name, "notes.txt");
        assert_eq!(att.mime_type, "text/plain");
        assert_eq!(decode_payload(&att).unwrap().unwrap(), b"hello");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
