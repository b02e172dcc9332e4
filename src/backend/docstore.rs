//! # Document-Store Backend
//!
//! Index files are records in the `INDEX` collection of a document store. The
//! store is addressed through the narrow [`DocumentStore`] trait so a remote
//! database client can be plugged in. Two stores ship with the crate:
//!
//! - [`MemoryDocumentStore`]: in-process, shareable across manager instances
//! - [`FileDocumentStore`]: collections as directories, records as JSON
//!   envelopes with base64 payloads and a CRC32 of the payload
//!
//! [`DocStoreDirectory`] presents one collection to tantivy as a flat
//! directory: one record per index file, keyed by file name.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tantivy::directory::error::{DeleteError, LockError, OpenReadError, OpenWriteError};
use tantivy::directory::{
    AntiCallToken, DirectoryLock, FileHandle, FileSlice, Lock, TerminatingWrite, WatchCallback,
    WatchHandle, WritePtr,
};
use uuid::Uuid;

use crate::engine::Directory;

use super::errors::{BackendError, BackendResult};
use super::filesystem::sync_dir;
use super::StorageBackend;

/// Collection holding index files
pub const INDEX_COLLECTION: &str = "INDEX";

/// Collection whose existence marks the index inconsistent
pub const INCONSISTENT_COLLECTION: &str = "INCONSISTENT";

/// Minimal collection/record interface of a document database
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Whether the collection exists
    fn collection_exists(&self, collection: &str) -> BackendResult<bool>;

    /// Create a collection; creating an existing collection is a no-op
    fn create_collection(&self, collection: &str) -> BackendResult<()>;

    /// Drop a collection and all its records; dropping a missing one is a no-op
    fn drop_collection(&self, collection: &str) -> BackendResult<()>;

    /// Insert or replace a record
    fn put(&self, collection: &str, key: &str, data: &[u8]) -> BackendResult<()>;

    /// Fetch a record
    fn get(&self, collection: &str, key: &str) -> BackendResult<Option<Vec<u8>>>;

    /// Delete a record; returns whether it existed
    fn delete(&self, collection: &str, key: &str) -> BackendResult<bool>;

    /// List record keys, sorted
    fn list(&self, collection: &str) -> BackendResult<Vec<String>>;
}

// =============================================================================
// In-memory store
// =============================================================================

type Collections = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// In-process document store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BackendResult<std::sync::MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| BackendError::LockPoisoned("memory document store"))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn collection_exists(&self, collection: &str) -> BackendResult<bool> {
        Ok(self.lock()?.contains_key(collection))
    }

    fn create_collection(&self, collection: &str) -> BackendResult<()> {
        self.lock()?.entry(collection.to_string()).or_default();
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> BackendResult<()> {
        self.lock()?.remove(collection);
        Ok(())
    }

    fn put(&self, collection: &str, key: &str, data: &[u8]) -> BackendResult<()> {
        let mut collections = self.lock()?;
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| BackendError::CollectionNotFound(collection.to_string()))?;
        records.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let collections = self.lock()?;
        let records = collections
            .get(collection)
            .ok_or_else(|| BackendError::CollectionNotFound(collection.to_string()))?;
        Ok(records.get(key).cloned())
    }

    fn delete(&self, collection: &str, key: &str) -> BackendResult<bool> {
        let mut collections = self.lock()?;
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| BackendError::CollectionNotFound(collection.to_string()))?;
        Ok(records.remove(key).is_some())
    }

    fn list(&self, collection: &str) -> BackendResult<Vec<String>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// On-disk record envelope
#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope {
    key: String,
    data: String,
    crc32: u32,
}

const DROPPED_PREFIX: &str = ".dropped-";

/// Document store persisting each collection as a directory of JSON records
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    /// Create a store rooted at `root`; no I/O is performed
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> BackendResult<PathBuf> {
        if collection.is_empty() || collection.starts_with('.') || collection.contains(['/', '\\']) {
            return Err(BackendError::Misconfigured(format!(
                "invalid collection name: {:?}",
                collection
            )));
        }
        Ok(self.root.join(collection))
    }

    fn record_path(&self, collection: &str, key: &str) -> BackendResult<PathBuf> {
        let dir = self.existing_collection(collection)?;
        Ok(dir.join(format!("{}.json", URL_SAFE_NO_PAD.encode(key))))
    }

    fn existing_collection(&self, collection: &str) -> BackendResult<PathBuf> {
        let dir = self.collection_path(collection)?;
        if !dir.is_dir() {
            return Err(BackendError::CollectionNotFound(collection.to_string()));
        }
        Ok(dir)
    }

    fn sweep_dropped(&self) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let dropped = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(DROPPED_PREFIX));
            if dropped {
                let _ = fs::remove_dir_all(entry.path());
            }
        }
    }

    fn decode_key(file_name: &str) -> Option<String> {
        let encoded = file_name.strip_suffix(".json")?;
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl DocumentStore for FileDocumentStore {
    fn collection_exists(&self, collection: &str) -> BackendResult<bool> {
        Ok(self.collection_path(collection)?.is_dir())
    }

    fn create_collection(&self, collection: &str) -> BackendResult<()> {
        let dir = self.collection_path(collection)?;
        fs::create_dir_all(&dir)
            .map_err(|e| BackendError::io(format!("create {}", dir.display()), e))?;
        sync_dir(&self.root)
            .map_err(|e| BackendError::io(format!("fsync {}", self.root.display()), e))?;
        self.sweep_dropped();
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> BackendResult<()> {
        let dir = self.collection_path(collection)?;
        if !dir.exists() {
            return Ok(());
        }
        // Rename first: the collection vanishes in one step
        let dropped = self
            .root
            .join(format!("{}{}-{}", DROPPED_PREFIX, collection, Uuid::new_v4()));
        fs::rename(&dir, &dropped)
            .map_err(|e| BackendError::io(format!("drop {}", dir.display()), e))?;
        sync_dir(&self.root)
            .map_err(|e| BackendError::io(format!("fsync {}", self.root.display()), e))?;
        fs::remove_dir_all(&dropped)
            .map_err(|e| BackendError::io(format!("remove {}", dropped.display()), e))
    }

    fn put(&self, collection: &str, key: &str, data: &[u8]) -> BackendResult<()> {
        let path = self.record_path(collection, key)?;
        let dir = self.existing_collection(collection)?;
        let envelope = RecordEnvelope {
            key: key.to_string(),
            data: STANDARD.encode(data),
            crc32: crc32fast::hash(data),
        };
        let json = serde_json::to_vec(&envelope).map_err(|e| BackendError::InvalidRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let tmp = dir.join(format!(".tmp-{}", Uuid::new_v4()));
        {
            let mut file = File::create(&tmp)
                .map_err(|e| BackendError::io(format!("create {}", tmp.display()), e))?;
            file.write_all(&json)
                .map_err(|e| BackendError::io(format!("write {}", tmp.display()), e))?;
            file.sync_all()
                .map_err(|e| BackendError::io(format!("fsync {}", tmp.display()), e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            BackendError::io(format!("rename into {}", path.display()), e)
        })?;
        sync_dir(&dir).map_err(|e| BackendError::io(format!("fsync {}", dir.display()), e))
    }

    fn get(&self, collection: &str, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let path = self.record_path(collection, key)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io(format!("read {}", path.display()), e)),
        };
        let invalid = |reason: String| BackendError::InvalidRecord {
            key: key.to_string(),
            reason,
        };
        let envelope: RecordEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
        if envelope.key != key {
            return Err(invalid(format!("envelope holds key {:?}", envelope.key)));
        }
        let data = STANDARD
            .decode(envelope.data)
            .map_err(|e| invalid(e.to_string()))?;
        let actual = crc32fast::hash(&data);
        if actual != envelope.crc32 {
            return Err(invalid(format!(
                "checksum mismatch: expected {:#010x}, found {:#010x}",
                envelope.crc32, actual
            )));
        }
        Ok(Some(data))
    }

    fn delete(&self, collection: &str, key: &str) -> BackendResult<bool> {
        let path = self.record_path(collection, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::io(format!("delete {}", path.display()), e)),
        }
    }

    fn list(&self, collection: &str) -> BackendResult<Vec<String>> {
        let dir = self.collection_path(collection)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&dir).map_err(|e| BackendError::io(format!("list {}", dir.display()), e))?;
        let mut keys: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().and_then(Self::decode_key))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// =============================================================================
// Directory and backend
// =============================================================================

/// Record key of an index file
fn file_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn io_error(err: BackendError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

/// Index directory over one document-store collection
#[derive(Debug, Clone)]
pub struct DocStoreDirectory {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl DocStoreDirectory {
    /// Address `collection` in `store` as a directory
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, OpenReadError> {
        match self.store.get(&self.collection, &file_key(path)) {
            Ok(Some(data)) => Ok(data),
            Ok(None) => Err(OpenReadError::FileDoesNotExist(path.to_path_buf())),
            Err(e) => Err(OpenReadError::IoError {
                io_error: Arc::new(io_error(e)),
                filepath: path.to_path_buf(),
            }),
        }
    }
}

impl Directory for DocStoreDirectory {
    fn get_file_handle(&self, path: &Path) -> Result<Arc<dyn FileHandle>, OpenReadError> {
        let data = self.read(path)?;
        Ok(Arc::new(FileSlice::from(data)))
    }

    fn delete(&self, path: &Path) -> Result<(), DeleteError> {
        match self.store.delete(&self.collection, &file_key(path)) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeleteError::FileDoesNotExist(path.to_path_buf())),
            Err(e) => Err(DeleteError::IoError {
                io_error: Arc::new(io_error(e)),
                filepath: path.to_path_buf(),
            }),
        }
    }

    fn exists(&self, path: &Path) -> Result<bool, OpenReadError> {
        match self.read(path) {
            Ok(_) => Ok(true),
            Err(OpenReadError::FileDoesNotExist(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn open_write(&self, path: &Path) -> Result<WritePtr, OpenWriteError> {
        let wrap = |e: BackendError| OpenWriteError::IoError {
            io_error: Arc::new(io_error(e)),
            filepath: path.to_path_buf(),
        };
        let key = file_key(path);
        if self.store.get(&self.collection, &key).map_err(wrap)?.is_some() {
            return Err(OpenWriteError::FileAlreadyExists(path.to_path_buf()));
        }
        // The file exists from the moment it is opened
        self.store.put(&self.collection, &key, &[]).map_err(wrap)?;
        Ok(BufWriter::new(Box::new(RecordWriter {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            key,
            buffer: Vec::new(),
        })))
    }

    fn atomic_read(&self, path: &Path) -> Result<Vec<u8>, OpenReadError> {
        self.read(path)
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.store
            .put(&self.collection, &file_key(path), data)
            .map_err(io_error)
    }

    /// The lifecycle layer already serializes writers; a lock record would
    /// outlive a crashed process
    fn acquire_lock(&self, _lock: &Lock) -> Result<DirectoryLock, LockError> {
        Ok(DirectoryLock::from(Box::new(())))
    }

    fn watch(&self, _callback: WatchCallback) -> tantivy::Result<WatchHandle> {
        Ok(WatchHandle::empty())
    }

    fn sync_directory(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Buffers one index file and stores it whole on every flush
struct RecordWriter {
    store: Arc<dyn DocumentStore>,
    collection: String,
    key: String,
    buffer: Vec<u8>,
}

impl Write for RecordWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.store
            .put(&self.collection, &self.key, &self.buffer)
            .map_err(io_error)
    }
}

impl TerminatingWrite for RecordWriter {
    fn terminate_ref(&mut self, _: AntiCallToken) -> io::Result<()> {
        self.flush()
    }
}

/// Storage backend keeping segments in a document-store collection
#[derive(Debug, Clone)]
pub struct DocStoreBackend {
    store: Arc<dyn DocumentStore>,
    description: String,
}

impl DocStoreBackend {
    /// Create a backend over `store`; no I/O is performed
    pub fn new(store: Arc<dyn DocumentStore>, description: impl Into<String>) -> Self {
        Self {
            store,
            description: description.into(),
        }
    }

    /// The underlying document store
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }
}

impl StorageBackend for DocStoreBackend {
    fn open_directory(&self, purge: bool) -> BackendResult<Box<dyn Directory>> {
        if purge {
            self.store.drop_collection(INDEX_COLLECTION)?;
            self.store.create_collection(INDEX_COLLECTION)?;
        }
        Ok(Box::new(DocStoreDirectory::new(
            Arc::clone(&self.store),
            INDEX_COLLECTION,
        )))
    }

    fn exists(&self) -> BackendResult<bool> {
        self.store.collection_exists(INDEX_COLLECTION)
    }

    fn create(&self) -> BackendResult<()> {
        self.store.create_collection(INDEX_COLLECTION)
    }

    fn location(&self) -> String {
        format!("{}/{}", self.description, INDEX_COLLECTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise_store(store: &dyn DocumentStore) {
        assert!(!store.collection_exists("C").unwrap());
        assert!(matches!(
            store.put("C", "k", b"v"),
            Err(BackendError::CollectionNotFound(_))
        ));

        store.create_collection("C").unwrap();
        store.create_collection("C").unwrap();
        store.put("C", "meta.json", b"one").unwrap();
        store.put("C", "a1.idx", b"\x00\xffbin").unwrap();
        store.put("C", "meta.json", b"uno").unwrap();

        assert_eq!(store.get("C", "meta.json").unwrap(), Some(b"uno".to_vec()));
        assert_eq!(store.get("C", "a1.idx").unwrap(), Some(b"\x00\xffbin".to_vec()));
        assert_eq!(store.get("C", "missing").unwrap(), None);
        assert_eq!(store.list("C").unwrap(), vec!["a1.idx", "meta.json"]);

        assert!(store.delete("C", "a1.idx").unwrap());
        assert!(!store.delete("C", "a1.idx").unwrap());

        store.drop_collection("C").unwrap();
        store.drop_collection("C").unwrap();
        assert!(!store.collection_exists("C").unwrap());
        assert!(store.list("C").unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_contract() {
        exercise_store(&MemoryDocumentStore::new());
    }

    #[test]
    fn test_file_store_contract() {
        let temp = TempDir::new().unwrap();
        exercise_store(&FileDocumentStore::new(temp.path()));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        {
            let store = FileDocumentStore::new(temp.path());
            store.create_collection("INDEX").unwrap();
            store.put("INDEX", ".managed.json", b"commit").unwrap();
        }
        let store = FileDocumentStore::new(temp.path());
        assert_eq!(
            store.get("INDEX", ".managed.json").unwrap(),
            Some(b"commit".to_vec())
        );
    }

    #[test]
    fn test_file_store_detects_damaged_payload() {
        let temp = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp.path());
        store.create_collection("INDEX").unwrap();
        store.put("INDEX", "meta.json", b"{}").unwrap();

        let record = fs::read_dir(temp.path().join("INDEX"))
            .unwrap()
            .flatten()
            .next()
            .unwrap()
            .path();
        let mut envelope: serde_json::Value =
            serde_json::from_slice(&fs::read(&record).unwrap()).unwrap();
        envelope["data"] = STANDARD.encode(b"[]").into();
        fs::write(&record, serde_json::to_vec(&envelope).unwrap()).unwrap();

        assert!(matches!(
            store.get("INDEX", "meta.json"),
            Err(BackendError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_backend_purge_empties_collection() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let backend = DocStoreBackend::new(Arc::clone(&store), "memory");
        assert!(!backend.exists().unwrap());

        backend.create().unwrap();
        let dir = backend.open_directory(false).unwrap();
        dir.atomic_write(Path::new("meta.json"), b"x").unwrap();

        let purged = backend.open_directory(true).unwrap();
        assert!(!purged.exists(Path::new("meta.json")).unwrap());
        assert!(store.list(INDEX_COLLECTION).unwrap().is_empty());
        assert!(backend.exists().unwrap());
        assert_eq!(backend.location(), "memory/INDEX");
    }

    #[test]
    fn test_directory_missing_file() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        store.create_collection(INDEX_COLLECTION).unwrap();
        let dir = DocStoreDirectory::new(store, INDEX_COLLECTION);

        assert!(matches!(
            dir.atomic_read(Path::new("x")),
            Err(OpenReadError::FileDoesNotExist(_))
        ));
        assert!(matches!(
            dir.delete(Path::new("x")),
            Err(DeleteError::FileDoesNotExist(_))
        ));
        assert!(!dir.exists(Path::new("x")).unwrap());
    }

    #[test]
    fn test_streamed_file_stored_on_terminate() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        store.create_collection(INDEX_COLLECTION).unwrap();
        let dir = DocStoreDirectory::new(Arc::clone(&store), INDEX_COLLECTION);

        let mut out = dir.open_write(Path::new("a1.store")).unwrap();
        assert!(dir.exists(Path::new("a1.store")).unwrap());
        out.write_all(b"segment ").unwrap();
        out.write_all(b"bytes").unwrap();
        out.terminate().unwrap();

        assert_eq!(
            store.get(INDEX_COLLECTION, "a1.store").unwrap(),
            Some(b"segment bytes".to_vec())
        );
        let slice = dir.open_read(Path::new("a1.store")).unwrap();
        assert_eq!(slice.read_bytes().unwrap().as_slice(), b"segment bytes");
        assert!(matches!(
            dir.open_write(Path::new("a1.store")),
            Err(OpenWriteError::FileAlreadyExists(_))
        ));
    }

    #[test]
    fn test_index_round_trip_through_store() {
        use crate::engine::{Analyzer, IndexDocument, SearchIndex};

        let temp = TempDir::new().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(temp.path()));
        let backend = DocStoreBackend::new(Arc::clone(&store), "file");
        backend.create().unwrap();
        {
            let index =
                SearchIndex::create(backend.open_directory(false).unwrap(), Analyzer::default())
                    .unwrap();
            index
                .edit(|e| e.add_document(IndexDocument::new("p1", "blog", "Fog", "harbour")))
                .unwrap();
            index.close();
        }

        let index = SearchIndex::open(backend.open_directory(false).unwrap(), Analyzer::default())
            .unwrap();
        index.validate().unwrap();
        assert_eq!(index.reader().unwrap().search("fog").unwrap().len(), 1);
    }
}
