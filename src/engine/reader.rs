//! Index reader
//!
//! An `IndexReader` is an immutable point-in-time view of one commit. It is
//! never updated in place; a newer view is obtained by opening a new reader.

use tantivy::collector::{Count, TopDocs};
use tantivy::directory::Directory;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{DocAddress, Index, ReloadPolicy, Searcher, TantivyDocument, Term};
use uuid::Uuid;

use super::analyzer::Analyzer;
use super::document::IndexDocument;
use super::errors::{IndexError, IndexResult};
use super::index::{open_existing, register_analyzer};
use super::schema::IndexFields;

/// Returns true if the directory holds a committed index
pub fn index_exists(dir: &dyn Directory) -> IndexResult<bool> {
    Index::exists(dir).map_err(|e| IndexError::Io(e.to_string()))
}

/// Read-only view over one commit of the index
pub struct IndexReader {
    reader_id: Uuid,
    generation: u64,
    searcher: Searcher,
    fields: IndexFields,
    analyzer: Analyzer,
}

impl std::fmt::Debug for IndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexReader")
            .field("reader_id", &self.reader_id)
            .field("generation", &self.generation)
            .field("num_docs", &self.num_docs())
            .finish()
    }
}

impl IndexReader {
    /// Open a reader on the latest commit in `dir` without taking the writer lock
    pub fn open(dir: Box<dyn Directory>, analyzer: Analyzer) -> IndexResult<Self> {
        let index = open_existing(dir)?;
        register_analyzer(&index, analyzer);
        let fields = IndexFields::resolve(&index.schema())?;
        let generation = index.load_metas()?.opstamp;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self::from_searcher(reader.searcher(), fields, analyzer, generation))
    }

    pub(crate) fn from_searcher(
        searcher: Searcher,
        fields: IndexFields,
        analyzer: Analyzer,
        generation: u64,
    ) -> Self {
        Self {
            reader_id: Uuid::new_v4(),
            generation,
            searcher,
            fields,
            analyzer,
        }
    }

    /// Unique identity of this reader instance
    pub fn reader_id(&self) -> Uuid {
        self.reader_id
    }

    /// Commit opstamp this reader was opened on
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of live documents
    pub fn num_docs(&self) -> usize {
        self.searcher.num_docs() as usize
    }

    /// Look up a document by entry id
    pub fn document(&self, entry_id: &str) -> IndexResult<Option<IndexDocument>> {
        let query = self.keyword_query(self.fields.entry_id, entry_id);
        Ok(self.collect(&query)?.into_iter().next())
    }

    /// Documents belonging to `owner`, ordered by entry id
    pub fn owner_documents(&self, owner: &str) -> IndexResult<Vec<IndexDocument>> {
        let query = self.keyword_query(self.fields.owner, owner);
        let mut docs = self.collect(&query)?;
        docs.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        Ok(docs)
    }

    /// Every live document, ordered by entry id
    pub fn all_documents(&self) -> IndexResult<Vec<IndexDocument>> {
        let mut docs = self.collect(&AllQuery)?;
        docs.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        Ok(docs)
    }

    /// Documents containing every term of `query`, newest first
    pub fn search(&self, query: &str) -> IndexResult<Vec<IndexDocument>> {
        self.matching(query, None)
    }

    /// Same as `search`, restricted to one owner
    pub fn search_owner(&self, owner: &str, query: &str) -> IndexResult<Vec<IndexDocument>> {
        self.matching(query, Some(owner))
    }

    /// Number of live documents matching a keyword field exactly
    pub(crate) fn count_keyword(&self, field: Field, value: &str) -> IndexResult<usize> {
        let query = self.keyword_query(field, value);
        Ok(self.searcher.search(&query, &Count)?)
    }

    pub(crate) fn fields(&self) -> &IndexFields {
        &self.fields
    }

    fn keyword_query(&self, field: Field, value: &str) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(field, value),
            IndexRecordOption::Basic,
        )
    }

    fn matching(&self, query: &str, owner: Option<&str>) -> IndexResult<Vec<IndexDocument>> {
        let mut terms = self.analyzer.tokens(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        // Each term must match in at least one searchable field
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|term| {
                let per_field: Vec<(Occur, Box<dyn Query>)> = self
                    .fields
                    .searchable()
                    .into_iter()
                    .map(|field| {
                        let query: Box<dyn Query> = Box::new(TermQuery::new(
                            Term::from_field_text(field, term),
                            IndexRecordOption::Basic,
                        ));
                        (Occur::Should, query)
                    })
                    .collect();
                let any_field: Box<dyn Query> = Box::new(BooleanQuery::new(per_field));
                (Occur::Must, any_field)
            })
            .collect();
        if let Some(owner) = owner {
            let owner_filter: Box<dyn Query> =
                Box::new(self.keyword_query(self.fields.owner, owner));
            clauses.push((Occur::Must, owner_filter));
        }

        let mut hits = self.collect(&BooleanQuery::new(clauses))?;
        hits.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        Ok(hits)
    }

    fn collect(&self, query: &dyn Query) -> IndexResult<Vec<IndexDocument>> {
        let limit = self.num_docs().max(1);
        let addresses: Vec<DocAddress> = self
            .searcher
            .search(query, &TopDocs::with_limit(limit))?
            .into_iter()
            .map(|(_, address)| address)
            .collect();

        addresses
            .into_iter()
            .map(|address| {
                let doc: TantivyDocument = self.searcher.doc(address)?;
                IndexDocument::from_tantivy(&doc, &self.fields)
            })
            .collect()
    }
}
