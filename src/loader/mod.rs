//! Document loading.
//!
//! Turns uploaded bytes into plain UTF-8 text. The format is picked from
//! the file extension:
//!
//! - `.txt`, `.md`: decoded as UTF-8 (a leading BOM is dropped)
//! - `.pdf`: text layer via `pdf-extract`
//! - `.docx`: `w:t` runs of `word/document.xml`, one line per paragraph
//!
//! Line endings are normalized to `\n` and runs of blank lines collapse to
//! a single blank line so the separator chunker sees stable boundaries.

use crate::error::{BuildError, Result};
use quick_xml::events::Event;
use regex::Regex;
use std::io::Read;
use std::sync::LazyLock;

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

static BLANK_RUNS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+\n").ok());

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Plain text.
    PlainText,
    /// Markdown, treated as plain text.
    Markdown,
    /// PDF with an extractable text layer.
    Pdf,
    /// Office Open XML word processing document.
    Docx,
}

impl DocumentFormat {
    /// Picks the format from a file name's extension.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnsupportedFileType`] for any other extension.
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = std::path::Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("txt") => Ok(Self::PlainText),
            Some("md" | "markdown") => Ok(Self::Markdown),
            Some("pdf") => Ok(Self::Pdf),
            Some("docx") => Ok(Self::Docx),
            _ => Err(BuildError::UnsupportedFileType {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Extracts plain text from an uploaded file.
///
/// # Errors
///
/// - [`BuildError::UnsupportedFileType`] for unknown extensions
/// - [`BuildError::Unreadable`] when decoding or extraction fails
/// - [`BuildError::EmptyDocument`] when no visible text remains
///
/// # Examples
///
/// ```
/// use docqa_rs::loader::load_text;
///
/// let text = load_text("notes.txt", b"first\r\nsecond\r\n").unwrap();
/// assert_eq!(text, "first\nsecond\n");
/// ```
pub fn load_text(name: &str, bytes: &[u8]) -> Result<String> {
    let format = DocumentFormat::from_name(name)?;
    let unreadable = |reason: String| BuildError::Unreadable {
        name: name.to_string(),
        reason,
    };

    let raw = match format {
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8(bytes.to_vec())
                .map_err(|e| unreadable(format!("invalid UTF-8: {e}")))?
        }
        DocumentFormat::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| unreadable(e.to_string()))?
        }
        DocumentFormat::Docx => extract_docx(bytes).map_err(unreadable)?,
    };

    let text = normalize(&raw);
    if text.trim().is_empty() {
        return Err(BuildError::EmptyDocument {
            name: name.to_string(),
        }
        .into());
    }

    tracing::debug!(
        name,
        format = format.as_str(),
        bytes = bytes.len(),
        chars = text.chars().count(),
        "loaded document"
    );
    Ok(text)
}

fn normalize(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    match BLANK_RUNS.as_ref() {
        Some(re) => re.replace_all(&text, "\n\n").into_owned(),
        None => text,
    }
}

fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    extract_paragraphs(&xml)
}

/// Collects `w:t` text, ending each `w:p` with a newline.
fn extract_paragraphs(xml: &[u8]) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| e.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
