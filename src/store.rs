use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{Result, SheetError};
use crate::spreadsheet::Document;

/// Opaque identifier handed out on upload.
pub type FileId = String;

/// One uploaded workbook and what we remember about its upload.
///
/// The document is shared copy-on-write: handing out a snapshot is a reference count
/// bump, and an edit only copies the document while such a snapshot is still alive.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// File name as uploaded; used as the default export name.
    pub original_name: String,
    pub document: Arc<Document>,
}

impl StoredFile {
    pub fn new(original_name: impl Into<String>, document: impl Into<Arc<Document>>) -> Self {
        StoredFile {
            original_name: original_name.into(),
            document: document.into(),
        }
    }

    pub fn document_mut(&mut self) -> &mut Document {
        Arc::make_mut(&mut self.document)
    }
}

/// Shared handle to a stored file. Holding the lock serializes every operation on that
/// file; other files stay independent.
pub type FileHandle = Arc<Mutex<StoredFile>>;

/// Lock a file handle, recovering the data if a previous holder panicked.
pub fn lock_file(handle: &FileHandle) -> MutexGuard<'_, StoredFile> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where uploaded documents live between requests.
pub trait DocumentStore: Send + Sync {
    /// Keep `file` and return its new identifier.
    fn insert(&self, file: StoredFile) -> FileId;

    /// Look up a file and mark it as recently used.
    fn get(&self, id: &str) -> Result<FileHandle>;

    /// Drop a file explicitly.
    fn remove(&self, id: &str) -> Result<()>;

    /// Drop every file idle for longer than the store's time-to-live, as seen at `now`.
    /// Returns the evicted identifiers.
    fn evict_expired(&self, now: Instant) -> Vec<FileId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Slot {
    file: FileHandle,
    last_access: Instant,
}

/// Process-local store with optional idle expiry.
pub struct MemoryStore {
    files: Mutex<HashMap<FileId, Slot>>,
    ttl: Option<Duration>,
}

impl MemoryStore {
    /// `ttl` of `None` keeps files until they are removed explicitly.
    pub fn new(ttl: Option<Duration>) -> Self {
        MemoryStore {
            files: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn files(&self) -> MutexGuard<'_, HashMap<FileId, Slot>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(None)
    }
}

/// `<unix millis>-<uuid>`: sortable by upload time and unique.
pub fn generate_file_id() -> FileId {
    format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4())
}

impl DocumentStore for MemoryStore {
    fn insert(&self, file: StoredFile) -> FileId {
        let id = generate_file_id();
        log::debug!("storing {} as {}", file.original_name, id);
        self.files().insert(
            id.clone(),
            Slot {
                file: Arc::new(Mutex::new(file)),
                last_access: Instant::now(),
            },
        );
        id
    }

    fn get(&self, id: &str) -> Result<FileHandle> {
        let mut files = self.files();
        let slot = files
            .get_mut(id)
            .ok_or_else(|| SheetError::NotFound(id.to_string()))?;
        slot.last_access = Instant::now();
        Ok(Arc::clone(&slot.file))
    }

    fn remove(&self, id: &str) -> Result<()> {
        match self.files().remove(id) {
            Some(_) => {
                log::debug!("closed {}", id);
                Ok(())
            }
            None => Err(SheetError::NotFound(id.to_string())),
        }
    }

    fn evict_expired(&self, now: Instant) -> Vec<FileId> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };

        let mut files = self.files();
        let expired: Vec<FileId> = files
            .iter()
            .filter(|(_, slot)| now.saturating_duration_since(slot.last_access) > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            files.remove(id);
        }

        if !expired.is_empty() {
            log::info!("evicted {} idle file(s)", expired.len());
        }
        expired
    }

    fn len(&self) -> usize {
        self.files().len()
    }
}
