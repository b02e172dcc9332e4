//! Index schema
//!
//! `entry_id` and `owner` are raw keyword terms so whole-value deletes and
//! owner filters hit exactly. Every other text field runs through the
//! weblog analyzer and is stored so documents can be read back.

use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};

use super::analyzer::ANALYZER_NAME;
use super::errors::{IndexError, IndexResult};

pub(crate) const ENTRY_ID: &str = "entry_id";
pub(crate) const OWNER: &str = "owner";
pub(crate) const TITLE: &str = "title";
pub(crate) const TEXT: &str = "text";
pub(crate) const SUMMARY: &str = "summary";
pub(crate) const AUTHOR: &str = "author";
pub(crate) const CATEGORIES: &str = "categories";
pub(crate) const TAGS: &str = "tags";
pub(crate) const PUBLISHED_AT: &str = "published_at";

/// Schema every weblog index is created with
pub fn index_schema() -> Schema {
    let analyzed = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(ANALYZER_NAME)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();

    let mut builder = Schema::builder();
    builder.add_text_field(ENTRY_ID, STRING | STORED);
    builder.add_text_field(OWNER, STRING | STORED);
    for name in [TITLE, TEXT, SUMMARY, AUTHOR, CATEGORIES, TAGS] {
        builder.add_text_field(name, analyzed.clone());
    }
    builder.add_i64_field(PUBLISHED_AT, STORED);
    builder.build()
}

/// Field handles resolved against an opened index
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexFields {
    pub entry_id: Field,
    pub owner: Field,
    pub title: Field,
    pub text: Field,
    pub summary: Field,
    pub author: Field,
    pub categories: Field,
    pub tags: Field,
    pub published_at: Field,
}

impl IndexFields {
    /// Resolve every field by name; an index missing one was not built by us
    pub fn resolve(schema: &Schema) -> IndexResult<Self> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| IndexError::SchemaMismatch(format!("missing field {}", name)))
        };
        Ok(Self {
            entry_id: field(ENTRY_ID)?,
            owner: field(OWNER)?,
            title: field(TITLE)?,
            text: field(TEXT)?,
            summary: field(SUMMARY)?,
            author: field(AUTHOR)?,
            categories: field(CATEGORIES)?,
            tags: field(TAGS)?,
            published_at: field(PUBLISHED_AT)?,
        })
    }

    /// Fields searched by free-text queries
    pub fn searchable(&self) -> [Field; 6] {
        [
            self.title,
            self.text,
            self.summary,
            self.author,
            self.categories,
            self.tags,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_resolves() {
        let fields = IndexFields::resolve(&index_schema()).unwrap();
        assert_ne!(fields.entry_id, fields.owner);
        assert_eq!(fields.searchable().len(), 6);
    }

    #[test]
    fn test_foreign_schema_rejected() {
        let mut builder = Schema::builder();
        builder.add_text_field(ENTRY_ID, STRING | STORED);
        let err = IndexFields::resolve(&builder.build()).unwrap_err();
        assert!(err.is_corruption());
    }
}
