//! Durable Store Module
//!
//! Best-effort persistence for the TTL cache. The whole cache map is written
//! as a single JSON blob, the way a browser origin-scoped key/value store
//! would hold it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::StoreError;

// == Durable Store Trait ==
/// Key/value persistence holding one serialized cache blob.
pub trait DurableStore: Send + Sync {
    /// Reads the stored blob, `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Replaces the stored blob.
    fn save(&self, blob: &str) -> Result<(), StoreError>;

    /// Removes the stored blob.
    fn clear(&self) -> Result<(), StoreError>;
}

impl<S: DurableStore + ?Sized> DurableStore for Arc<S> {
    fn load(&self) -> Result<Option<String>, StoreError> {
        (**self).load()
    }

    fn save(&self, blob: &str) -> Result<(), StoreError> {
        (**self).save(blob)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

fn check_quota(blob: &str, quota: Option<usize>) -> Result<(), StoreError> {
    match quota {
        Some(quota) if blob.len() > quota => Err(StoreError::QuotaExceeded {
            needed: blob.len(),
            quota,
        }),
        _ => Ok(()),
    }
}

// == File Store ==
#[derive(Debug, Clone)]
enum FileOp {
    Write(Arc<str>),
    Remove,
}

impl FileOp {
    fn apply(&self, path: &Path) -> Result<(), StoreError> {
        match self {
            FileOp::Write(blob) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                // Write-then-rename so a crash never leaves a truncated blob
                let tmp = path.with_extension("tmp");
                fs::write(&tmp, blob.as_bytes())?;
                fs::rename(&tmp, path)?;
                Ok(())
            }
            FileOp::Remove => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
        }
    }
}

#[derive(Debug, Default)]
struct WriteQueue {
    /// Newest state handed to the store, applied or not.
    latest: Option<FileOp>,
    /// Op waiting for the writer. Older pending ops are overwritten.
    pending: Option<FileOp>,
    writer_running: bool,
}

/// Stores the blob in a single file, with an optional size budget.
///
/// Inside a tokio runtime, writes go to a blocking-pool writer and `save`
/// returns once the quota check passes. Only the newest pending write is
/// kept, so a burst of saves costs one file write. I/O failures on that
/// path are logged, not returned. Outside a runtime, writes are synchronous.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    quota: Option<usize>,
    queue: Arc<Mutex<WriteQueue>>,
}

impl FileStore {
    /// Creates a store at `path`. Writes larger than `quota` bytes fail.
    pub fn new(path: impl Into<PathBuf>, quota: Option<usize>) -> Self {
        Self {
            path: path.into(),
            quota,
            queue: Arc::new(Mutex::new(WriteQueue::default())),
        }
    }

    /// Location of the blob on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn submit(&self, op: FileOp) -> Result<(), StoreError> {
        let Ok(runtime) = Handle::try_current() else {
            let mut queue = lock_queue(&self.queue);
            op.apply(&self.path)?;
            queue.latest = Some(op);
            return Ok(());
        };

        let mut queue = lock_queue(&self.queue);
        queue.latest = Some(op.clone());
        queue.pending = Some(op);
        if !queue.writer_running {
            queue.writer_running = true;
            let path = self.path.clone();
            let shared = Arc::clone(&self.queue);
            runtime.spawn_blocking(move || drain(&path, &shared));
        }
        Ok(())
    }
}

/// Applies pending ops until the queue is empty.
fn drain(path: &Path, queue: &Mutex<WriteQueue>) {
    loop {
        let op = {
            let mut queue = lock_queue(queue);
            match queue.pending.take() {
                Some(op) => op,
                None => {
                    queue.writer_running = false;
                    return;
                }
            }
        };

        match op.apply(path) {
            Ok(()) => debug!("Cache blob written to {}", path.display()),
            Err(e) => warn!("Failed to write cache blob to {}: {}", path.display(), e),
        }
    }
}

fn lock_queue(queue: &Mutex<WriteQueue>) -> MutexGuard<'_, WriteQueue> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DurableStore for FileStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        // Reflect writes the background writer has not finished yet
        match &lock_queue(&self.queue).latest {
            Some(FileOp::Write(blob)) => return Ok(Some(blob.to_string())),
            Some(FileOp::Remove) => return Ok(None),
            None => {}
        }

        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, blob: &str) -> Result<(), StoreError> {
        check_quota(blob, self.quota)?;
        self.submit(FileOp::Write(Arc::from(blob)))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.submit(FileOp::Remove)
    }
}

// == Memory Store ==
#[derive(Debug, Default)]
struct MemoryInner {
    blob: Option<String>,
    failing_saves: usize,
    saves: usize,
}

/// In-process store with an optional size budget.
///
/// Can be told to reject upcoming writes, which is how persistence pressure
/// is exercised without a real quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Creates an empty store without a budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store rejecting blobs larger than `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            quota: Some(quota),
        }
    }

    /// Creates a store pre-filled with `blob`.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                blob: Some(blob.into()),
                ..Default::default()
            }),
            quota: None,
        }
    }

    /// Makes the next `count` saves fail with a quota error.
    pub fn fail_next_saves(&self, count: usize) {
        self.lock().failing_saves = count;
    }

    /// Current blob contents.
    pub fn blob(&self) -> Option<String> {
        self.lock().blob.clone()
    }

    /// Number of save attempts, failed ones included.
    pub fn save_attempts(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DurableStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.lock().blob.clone())
    }

    fn save(&self, blob: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.saves += 1;

        if inner.failing_saves > 0 {
            inner.failing_saves -= 1;
            return Err(StoreError::QuotaExceeded {
                needed: blob.len(),
                quota: self.quota.unwrap_or(0),
            });
        }

        check_quota(blob, self.quota)?;
        inner.blob = Some(blob.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock().blob = None;
        Ok(())
    }
}
