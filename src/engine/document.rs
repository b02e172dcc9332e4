//! Indexed document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tantivy::schema::Value;
use tantivy::TantivyDocument;

use super::errors::{IndexError, IndexResult};
use super::schema::IndexFields;

/// The indexed projection of one weblog entry.
///
/// Keyed by `entry_id`, scoped by `owner` (the weblog handle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Entry identity
    pub entry_id: String,
    /// Owning weblog
    pub owner: String,
    /// Entry title
    pub title: String,
    /// Entry body text
    pub text: String,
    /// Optional summary
    #[serde(default)]
    pub summary: String,
    /// Author user name
    #[serde(default)]
    pub author: String,
    /// Category names
    #[serde(default)]
    pub categories: Vec<String>,
    /// Tag names
    #[serde(default)]
    pub tags: Vec<String>,
    /// Publication time, microsecond precision once indexed
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl IndexDocument {
    /// Create a document with only identity and title/text set
    pub fn new(
        entry_id: impl Into<String>,
        owner: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            owner: owner.into(),
            title: title.into(),
            text: text.into(),
            summary: String::new(),
            author: String::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            published_at: None,
        }
    }

    pub(crate) fn to_tantivy(&self, fields: &IndexFields) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(fields.entry_id, &self.entry_id);
        doc.add_text(fields.owner, &self.owner);
        doc.add_text(fields.title, &self.title);
        doc.add_text(fields.text, &self.text);
        doc.add_text(fields.summary, &self.summary);
        doc.add_text(fields.author, &self.author);
        for category in &self.categories {
            doc.add_text(fields.categories, category);
        }
        for tag in &self.tags {
            doc.add_text(fields.tags, tag);
        }
        if let Some(published_at) = self.published_at {
            doc.add_i64(fields.published_at, published_at.timestamp_micros());
        }
        doc
    }

    pub(crate) fn from_tantivy(doc: &TantivyDocument, fields: &IndexFields) -> IndexResult<Self> {
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let all = |field| {
            doc.get_all(field)
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect::<Vec<_>>()
        };

        let entry_id = text(fields.entry_id);
        if entry_id.is_empty() {
            return Err(IndexError::InvalidDocument("stored document has no entry id".into()));
        }
        let published_at = match doc.get_first(fields.published_at).and_then(|v| v.as_i64()) {
            Some(micros) => Some(DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                IndexError::InvalidDocument(format!(
                    "{}: publication time {} out of range",
                    entry_id, micros
                ))
            })?),
            None => None,
        };

        Ok(Self {
            owner: text(fields.owner),
            title: text(fields.title),
            text: text(fields.text),
            summary: text(fields.summary),
            author: text(fields.author),
            categories: all(fields.categories),
            tags: all(fields.tags),
            published_at,
            entry_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::schema::index_schema;
    use chrono::TimeZone;

    #[test]
    fn test_multi_valued_fields_keep_order() {
        let fields = IndexFields::resolve(&index_schema()).unwrap();
        let mut doc = IndexDocument::new("e1", "blog", "Title Word", "body text");
        doc.summary = "short".into();
        doc.author = "alice".into();
        doc.categories = vec!["Travel".into(), "Food".into()];
        doc.tags = vec!["rust".into()];
        doc.published_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let stored = IndexDocument::from_tantivy(&doc.to_tantivy(&fields), &fields).unwrap();
        assert_eq!(stored, doc);
    }

    #[test]
    fn test_missing_entry_id_rejected() {
        let fields = IndexFields::resolve(&index_schema()).unwrap();
        let err = IndexDocument::from_tantivy(&TantivyDocument::default(), &fields).unwrap_err();
        assert!(matches!(err, IndexError::InvalidDocument(_)));
    }
}
