//! Best-effort plain-text extraction from an inbound CV attachment, feeding
//! the priority-5 LLM fallback in [`crate::cascade`] (spec §4.4). Grounded
//! on the `pdf-extract` crate, the pack's precedent for PDF text extraction.

use pdf_extract::extract_text_from_mem;
use tracing::warn;

/// Extract readable text from `content` given its `file_name`'s extension.
/// PDFs go through `pdf-extract`; anything else is treated as UTF-8 (lossy)
/// plain text. Extraction failures return `None` rather than an error — a
/// CV the cascade can't read text from should fall through to
/// [`crate::types::UnmatchedInbound`], not abort the whole upload.
pub fn extract_text(file_name: &str, content: &[u8]) -> Option<String> {
    let is_pdf = file_name.to_lowercase().ends_with(".pdf");
    if is_pdf {
        return match extract_text_from_mem(content) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!(file_name, error = %e, "pdf text extraction failed");
                None
            }
        };
    }

    let text = String::from_utf8_lossy(content).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_attachment_is_read_as_is() {
        let text = extract_text("notes.txt", b"Ana Reyes\nana@example.com");
        assert_eq!(text, Some("Ana Reyes\nana@example.com".to_string()));
    }

    #[test]
    fn empty_attachment_yields_none() {
        assert_eq!(extract_text("empty.txt", b""), None);
    }
}
