//! Writable index handle
//!
//! A [`SearchIndex`] owns the single tantivy writer of one directory plus a
//! manually reloaded reader. Edits are batched through [`SearchIndex::edit`]:
//! the closure stages deletes and adds, then one commit publishes them. A
//! failing closure or commit rolls the writer back, so nothing staged by a
//! failed edit leaks into the next commit.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tantivy::directory::{Directory, RamDirectory};
use tantivy::{Index, IndexReader as TantivyReader, IndexSettings, IndexWriter, ReloadPolicy, Term};
use tracing::{debug, warn};

use crate::crash_point::{maybe_crash, points};

use super::analyzer::{Analyzer, ANALYZER_NAME};
use super::document::IndexDocument;
use super::errors::{IndexError, IndexResult};
use super::reader::{index_exists, IndexReader};
use super::schema::{index_schema, IndexFields};

/// Indexing heap shared by the writer's single thread
const WRITER_HEAP_BYTES: usize = 20_000_000;

pub(crate) fn register_analyzer(index: &Index, analyzer: Analyzer) {
    index
        .tokenizers()
        .register(ANALYZER_NAME, analyzer.text_analyzer());
}

/// Open the committed index in `dir`, or `IndexNotFound`
pub(crate) fn open_existing(dir: Box<dyn Directory>) -> IndexResult<Index> {
    if !index_exists(dir.as_ref())? {
        return Err(IndexError::IndexNotFound);
    }
    Ok(Index::open(dir)?)
}

/// Single-writer index over one directory
pub struct SearchIndex {
    index: Index,
    fields: IndexFields,
    analyzer: Analyzer,
    writer: Mutex<IndexWriter>,
    reader: TantivyReader,
    opstamp: AtomicU64,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("index", &self.index)
            .field("opstamp", &self.opstamp.load(Ordering::SeqCst))
            .finish()
    }
}

impl SearchIndex {
    /// Open the existing index in `dir`
    pub fn open(dir: Box<dyn Directory>, analyzer: Analyzer) -> IndexResult<Self> {
        let index = open_existing(dir)?;
        Self::from_index(index, analyzer)
    }

    /// Create a new, empty index in `dir`. The directory must hold no index.
    pub fn create(dir: Box<dyn Directory>, analyzer: Analyzer) -> IndexResult<Self> {
        let index = Index::create(dir, index_schema(), IndexSettings::default())?;
        Self::from_index(index, analyzer)
    }

    /// Create an empty index held entirely in memory
    pub fn create_in_ram(analyzer: Analyzer) -> IndexResult<Self> {
        Self::create(Box::new(RamDirectory::create()), analyzer)
    }

    fn from_index(index: Index, analyzer: Analyzer) -> IndexResult<Self> {
        register_analyzer(&index, analyzer);
        let fields = IndexFields::resolve(&index.schema())?;
        let opstamp = index.load_metas()?.opstamp;
        let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            index,
            fields,
            analyzer,
            writer: Mutex::new(writer),
            reader,
            opstamp: AtomicU64::new(opstamp),
        })
    }

    /// Opstamp of the last commit
    pub fn generation(&self) -> u64 {
        self.opstamp.load(Ordering::SeqCst)
    }

    /// Fresh snapshot of the last commit
    pub fn reader(&self) -> IndexResult<IndexReader> {
        Ok(IndexReader::from_searcher(
            self.reader.searcher(),
            self.fields,
            self.analyzer,
            self.generation(),
        ))
    }

    /// Verify every file of the last commit against its footer checksum
    pub fn validate(&self) -> IndexResult<()> {
        let damaged = self.index.validate_checksum()?;
        if damaged.is_empty() {
            return Ok(());
        }
        let mut names: Vec<String> = damaged.iter().map(|p| p.display().to_string()).collect();
        names.sort();
        Err(IndexError::Corrupted(format!(
            "checksum mismatch in {}",
            names.join(", ")
        )))
    }

    fn lock_writer(&self) -> MutexGuard<'_, IndexWriter> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stage changes through `edit_fn` and commit them as one unit
    pub fn edit<T>(&self, edit_fn: impl FnOnce(&mut IndexEdit<'_>) -> IndexResult<T>) -> IndexResult<T> {
        let mut writer = self.lock_writer();
        let base = self.reader()?;

        let staged = {
            let mut edit = IndexEdit {
                writer: &*writer,
                base: &base,
            };
            edit_fn(&mut edit)
        };
        let value = match staged {
            Ok(value) => value,
            Err(e) => {
                Self::rollback(&mut writer);
                return Err(e);
            }
        };

        maybe_crash(points::COMMIT_BEFORE_POINT);
        let opstamp = match writer.commit() {
            Ok(opstamp) => opstamp,
            Err(e) => {
                Self::rollback(&mut writer);
                return Err(e.into());
            }
        };
        maybe_crash(points::COMMIT_AFTER_POINT);

        self.reader.reload()?;
        self.opstamp.store(opstamp, Ordering::SeqCst);
        debug!(opstamp, "index commit published");
        Ok(value)
    }

    fn rollback(writer: &mut IndexWriter) {
        if let Err(e) = writer.rollback() {
            warn!(error = %e, "failed to roll back staged index changes");
        }
    }

    /// Wait for background merges and drop the writer
    pub fn close(self) {
        let writer = self.writer.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.wait_merging_threads() {
            warn!(error = %e, "index merge did not finish cleanly");
        }
    }
}

/// Staging view handed to [`SearchIndex::edit`].
///
/// Existence checks see the last commit, not changes staged in this edit.
pub struct IndexEdit<'a> {
    writer: &'a IndexWriter,
    base: &'a IndexReader,
}

impl IndexEdit<'_> {
    fn entry_term(&self, entry_id: &str) -> Term {
        Term::from_field_text(self.base.fields().entry_id, entry_id)
    }

    /// Number of documents in the last commit
    pub fn num_docs(&self) -> usize {
        self.base.num_docs()
    }

    /// Insert a document. Fails if the entry is already indexed.
    pub fn add_document(&mut self, doc: IndexDocument) -> IndexResult<()> {
        if self.base.count_keyword(self.base.fields().entry_id, &doc.entry_id)? > 0 {
            return Err(IndexError::DuplicateDocument(doc.entry_id));
        }
        self.writer.add_document(doc.to_tantivy(self.base.fields()))?;
        Ok(())
    }

    /// Insert or replace a document
    pub fn update_document(&mut self, doc: IndexDocument) -> IndexResult<()> {
        self.writer.delete_term(self.entry_term(&doc.entry_id));
        self.writer.add_document(doc.to_tantivy(self.base.fields()))?;
        Ok(())
    }

    /// Delete one entry; returns whether it was indexed
    pub fn delete_document(&mut self, entry_id: &str) -> IndexResult<bool> {
        let existed = self.base.count_keyword(self.base.fields().entry_id, entry_id)? > 0;
        self.writer.delete_term(self.entry_term(entry_id));
        Ok(existed)
    }

    /// Delete every document of `owner`; returns how many were indexed
    pub fn delete_owner(&mut self, owner: &str) -> IndexResult<usize> {
        let owner_field = self.base.fields().owner;
        let removed = self.base.count_keyword(owner_field, owner)?;
        self.writer
            .delete_term(Term::from_field_text(owner_field, owner));
        Ok(removed)
    }

    /// Delete every document; returns how many were indexed
    pub fn delete_all(&mut self) -> IndexResult<usize> {
        let removed = self.base.num_docs();
        self.writer.delete_all_documents()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, owner: &str, title: &str) -> IndexDocument {
        IndexDocument::new(id, owner, title, "body")
    }

    #[test]
    fn test_duplicate_add_rejected_and_rolled_back() {
        let index = SearchIndex::create_in_ram(Analyzer::default()).unwrap();
        index.edit(|e| e.add_document(doc("e1", "blog", "one"))).unwrap();

        let err = index
            .edit(|e| {
                e.add_document(doc("e2", "blog", "two"))?;
                e.add_document(doc("e1", "blog", "again"))
            })
            .unwrap_err();
        assert_eq!(err, IndexError::DuplicateDocument("e1".into()));

        // The staged e2 from the failed edit never reaches a later commit
        index.edit(|e| e.delete_document("zzz")).unwrap();
        let reader = index.reader().unwrap();
        assert_eq!(reader.num_docs(), 1);
        assert!(reader.document("e2").unwrap().is_none());
    }

    #[test]
    fn test_update_replaces_in_place() {
        let index = SearchIndex::create_in_ram(Analyzer::default()).unwrap();
        index.edit(|e| e.add_document(doc("e1", "blog", "first"))).unwrap();
        index.edit(|e| e.update_document(doc("e1", "blog", "second"))).unwrap();

        let reader = index.reader().unwrap();
        assert_eq!(reader.num_docs(), 1);
        assert_eq!(reader.document("e1").unwrap().unwrap().title, "second");
        assert!(reader.search("first").unwrap().is_empty());
    }

    #[test]
    fn test_owner_delete_then_readd_in_one_commit() {
        let index = SearchIndex::create_in_ram(Analyzer::default()).unwrap();
        index
            .edit(|e| {
                e.add_document(doc("a1", "alpha", "one"))?;
                e.add_document(doc("b1", "beta", "two"))
            })
            .unwrap();

        let removed = index
            .edit(|e| {
                let removed = e.delete_owner("alpha")?;
                e.update_document(doc("a2", "alpha", "three"))?;
                Ok(removed)
            })
            .unwrap();
        assert_eq!(removed, 1);

        let reader = index.reader().unwrap();
        let ids: Vec<_> = reader
            .all_documents()
            .unwrap()
            .into_iter()
            .map(|d| d.entry_id)
            .collect();
        assert_eq!(ids, vec!["a2", "b1"]);
    }

    #[test]
    fn test_delete_all() {
        let index = SearchIndex::create_in_ram(Analyzer::default()).unwrap();
        index
            .edit(|e| {
                e.add_document(doc("e1", "blog", "one"))?;
                e.add_document(doc("e2", "blog", "two"))
            })
            .unwrap();
        assert_eq!(index.edit(|e| e.delete_all()).unwrap(), 2);
        assert_eq!(index.reader().unwrap().num_docs(), 0);
    }

    #[test]
    fn test_reopen_sees_committed_documents() {
        let dir = RamDirectory::create();
        {
            let index = SearchIndex::create(Box::new(dir.clone()), Analyzer::default()).unwrap();
            index.edit(|e| e.add_document(doc("e1", "blog", "kept"))).unwrap();
            index.close();
        }
        let reopened = SearchIndex::open(Box::new(dir), Analyzer::default()).unwrap();
        reopened.validate().unwrap();
        assert!(reopened.reader().unwrap().document("e1").unwrap().is_some());
        assert!(reopened.generation() > 0);
    }

    #[test]
    fn test_open_requires_index() {
        let err = SearchIndex::open(Box::new(RamDirectory::create()), Analyzer::default())
            .unwrap_err();
        assert_eq!(err, IndexError::IndexNotFound);
    }
}
