//! Complaint markup → plain text.
//!
//! Complaints arrive as XML documents. The text is taken from the first
//! non-empty of a fixed list of fields, cleaned, and rejected if fewer than
//! [`MIN_TEXT_CHARS`] characters remain.

pub mod sanitize;

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};

/// Fields searched for complaint text, in order of preference.
pub const TEXT_FIELDS: &[&str] = &["complaint_text", "description", "message", "subject", "content"];

/// Shortest usable complaint text, after trimming.
pub const MIN_TEXT_CHARS: usize = 5;

/// Normalized complaint text. Never shorter than [`MIN_TEXT_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// Clean `text` and wrap it, or `None` if too little remains.
    pub fn new(text: &str) -> Option<Self> {
        let cleaned = sanitize::clean_text(text);
        (cleaned.chars().count() >= MIN_TEXT_CHARS).then_some(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for ExtractedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Everything read out of one complaint document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintDocument {
    pub text: ExtractedText,
    /// Which field the text came from.
    pub text_field: String,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub category: String,
    pub priority: String,
}

/// Converts the stored complaint markup into usable text.
pub trait TextNormalizer {
    fn normalize(&self, raw: &str) -> Option<ExtractedText>;
}

/// XML complaint reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlTextNormalizer;

impl XmlTextNormalizer {
    /// Parse a full complaint document. Malformed XML or missing text → `None`.
    pub fn parse_document(&self, raw: &str) -> Option<ComplaintDocument> {
        if raw.trim().is_empty() {
            return None;
        }
        let fields = collect_fields(raw)?;

        let (text_field, text) = TEXT_FIELDS.iter().find_map(|name| {
            let value = fields.get(*name)?;
            ExtractedText::new(value).map(|t| (name.to_string(), t))
        })?;

        let field = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Some(ComplaintDocument {
            text,
            text_field,
            user_name: field("user_name"),
            email: field("email"),
            subject: field("subject"),
            category: field("category").unwrap_or_else(|| "general".into()),
            priority: field("priority").unwrap_or_else(|| "normal".into()),
        })
    }
}

impl TextNormalizer for XmlTextNormalizer {
    fn normalize(&self, raw: &str) -> Option<ExtractedText> {
        self.parse_document(raw).map(|doc| doc.text)
    }
}

/// Direct text content of the first element with each local name.
/// Returns `None` if the document is not well-formed.
fn collect_fields(raw: &str) -> Option<HashMap<String, String>> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut fields: HashMap<String, String> = HashMap::new();
    // Open elements with the text gathered so far.
    let mut open: Vec<(String, String)> = Vec::new();
    let mut seen_root = false;

    loop {
        let chunk = match reader.read_event() {
            Ok(Event::Start(e)) => {
                if open.is_empty() && seen_root {
                    tracing::debug!("Complaint XML has more than one root element");
                    return None;
                }
                seen_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                open.push((name, String::new()));
                continue;
            }
            Ok(Event::Empty(_)) => {
                seen_root = true;
                continue;
            }
            Ok(Event::End(_)) => {
                if let Some((name, text)) = open.pop() {
                    fields.entry(name).or_insert(text);
                }
                continue;
            }
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(text) => text.into_owned(),
                Err(e) => {
                    tracing::debug!(error = %e, "Complaint XML has a bad escape");
                    return None;
                }
            },
            Ok(Event::CData(c)) => String::from_utf8_lossy(&c.into_inner()).into_owned(),
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    position = reader.buffer_position(),
                    "Complaint XML is malformed"
                );
                return None;
            }
        };

        match open.last_mut() {
            Some((_, text)) => {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&chunk);
            }
            None if !chunk.trim().is_empty() => {
                tracing::debug!("Complaint XML has text outside the root element");
                return None;
            }
            None => {}
        }
    }

    if !seen_root || !open.is_empty() {
        return None;
    }
    Some(fields)
}
