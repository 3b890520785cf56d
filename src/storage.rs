use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StorageError;

/// A change to a key made through some other handle or process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

/// Keyed string storage the history persists into.
///
/// External changes are pulled with [`Storage::take_external_changes`] rather
/// than pushed through callbacks, so the owner applies them on the same path
/// as its own updates.
pub trait Storage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn take_external_changes(&mut self) -> Vec<StorageEvent>;
}

type Inbox = Rc<RefCell<Vec<StorageEvent>>>;

#[derive(Debug, Default)]
struct Shared {
    items: HashMap<String, String>,
    quota: Option<usize>,
    inboxes: Vec<Weak<RefCell<Vec<StorageEvent>>>>,
}

impl Shared {
    fn used_without(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

/// In-memory storage. Every [`MemoryStorage::handle`] sees the same items
/// and is told about writes made through the others, like browser tabs
/// sharing one origin's storage.
#[derive(Debug)]
pub struct MemoryStorage {
    shared: Rc<RefCell<Shared>>,
    inbox: Inbox,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::from_shared(Rc::new(RefCell::new(Shared::default())))
    }

    /// Storage that refuses writes once keys and values together would
    /// exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let storage = Self::new();
        storage.shared.borrow_mut().quota = Some(bytes);
        storage
    }

    /// Opens another handle onto the same items.
    pub fn handle(&self) -> Self {
        Self::from_shared(Rc::clone(&self.shared))
    }

    fn from_shared(shared: Rc<RefCell<Shared>>) -> Self {
        let inbox: Inbox = Rc::new(RefCell::new(Vec::new()));
        shared.borrow_mut().inboxes.push(Rc::downgrade(&inbox));
        Self { shared, inbox }
    }

    fn broadcast(&self, event: StorageEvent) {
        let mut shared = self.shared.borrow_mut();
        shared.inboxes.retain(|weak| weak.strong_count() > 0);
        for inbox in shared.inboxes.iter().filter_map(Weak::upgrade) {
            if !Rc::ptr_eq(&inbox, &self.inbox) {
                inbox.borrow_mut().push(event.clone());
            }
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.shared.borrow().items.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut shared = self.shared.borrow_mut();
            if let Some(quota) = shared.quota {
                let available = quota.saturating_sub(shared.used_without(key));
                let needed = key.len() + value.len();
                if needed > available {
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_string(),
                        needed,
                        available,
                    });
                }
            }
            shared.items.insert(key.to_string(), value.to_string());
        }
        self.broadcast(StorageEvent {
            key: key.to_string(),
            new_value: Some(value.to_string()),
        });
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let removed = self.shared.borrow_mut().items.remove(key).is_some();
        if removed {
            self.broadcast(StorageEvent {
                key: key.to_string(),
                new_value: None,
            });
        }
        Ok(())
    }

    fn take_external_changes(&mut self) -> Vec<StorageEvent> {
        std::mem::take(&mut *self.inbox.borrow_mut())
    }
}

/// One file per key inside a directory.
///
/// Changes made by other processes are found by re-reading every key this
/// handle has touched and comparing against what it last saw.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    seen: RefCell<HashMap<String, Option<String>>>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seen: RefCell::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.slot", key))
    }

    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self.read_slot(key)?;
        self.seen.borrow_mut().insert(key.to_string(), value.clone());
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // Write then rename so readers never see half a slot; the temp name
        // is unique per write so concurrent writers don't share it.
        static WRITES: AtomicU64 = AtomicU64::new(0);
        let n = WRITES.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .dir
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), n));
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, self.slot_path(key)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        self.seen
            .borrow_mut()
            .insert(key.to_string(), Some(value.to_string()));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.seen.borrow_mut().insert(key.to_string(), None);
        Ok(())
    }

    fn take_external_changes(&mut self) -> Vec<StorageEvent> {
        let keys: Vec<String> = self.seen.borrow().keys().cloned().collect();
        let mut events = Vec::new();

        for key in keys {
            let current = match self.read_slot(&key) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Error polling storage key “{}”: {}", key, e);
                    continue;
                }
            };
            let mut seen = self.seen.borrow_mut();
            if seen.get(&key) != Some(&current) {
                seen.insert(key.clone(), current.clone());
                events.push(StorageEvent {
                    key,
                    new_value: current,
                });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch_dir(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "histnav-storage-{}-{}-{}",
            name,
            std::process::id(),
            n
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    // ========================================
    // MemoryStorage
    // ========================================

    #[test]
    fn memory_read_write_remove() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.read("k").unwrap(), None);

        storage.write("k", "v").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("v"));

        storage.remove("k").unwrap();
        assert_eq!(storage.read("k").unwrap(), None);
    }

    #[test]
    fn memory_handles_share_items() {
        let mut a = MemoryStorage::new();
        let b = a.handle();
        a.write("k", "v").unwrap();
        assert_eq!(b.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn memory_writes_notify_other_handles_only() {
        let mut a = MemoryStorage::new();
        let mut b = a.handle();

        a.write("k", "1").unwrap();
        a.remove("k").unwrap();

        assert!(a.take_external_changes().is_empty());
        assert_eq!(
            b.take_external_changes(),
            vec![
                StorageEvent {
                    key: "k".to_string(),
                    new_value: Some("1".to_string()),
                },
                StorageEvent {
                    key: "k".to_string(),
                    new_value: None,
                },
            ]
        );
        assert!(b.take_external_changes().is_empty());
    }

    #[test]
    fn memory_removing_missing_key_is_silent() {
        let mut a = MemoryStorage::new();
        let mut b = a.handle();
        a.remove("nothing").unwrap();
        assert!(b.take_external_changes().is_empty());
    }

    #[test]
    fn memory_dropped_handles_are_pruned() {
        let mut a = MemoryStorage::new();
        {
            let _b = a.handle();
        }
        a.write("k", "v").unwrap();
        assert_eq!(a.shared.borrow().inboxes.len(), 1);
    }

    #[test]
    fn memory_quota_rejects_oversized_writes() {
        let mut storage = MemoryStorage::with_quota(8);
        storage.write("k", "1234").unwrap();

        let err = storage.write("j", "12345678").unwrap_err();
        assert!(err.is_quota());
        assert_eq!(storage.read("j").unwrap(), None);

        // Overwriting an existing key only counts the new value
        storage.write("k", "1234567").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("1234567"));
    }

    // ========================================
    // FileStorage
    // ========================================

    #[test]
    fn file_read_write_remove() {
        let dir = scratch_dir("rw");
        let mut storage = FileStorage::new(&dir).unwrap();

        assert_eq!(storage.read("k").unwrap(), None);
        storage.write("k", "\"/a\"").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("\"/a\""));
        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert_eq!(storage.read("k").unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_sees_changes_from_another_process() {
        let dir = scratch_dir("poll");
        let mut ours = FileStorage::new(&dir).unwrap();
        let mut theirs = FileStorage::new(&dir).unwrap();

        ours.write("k", "1").unwrap();
        assert!(ours.take_external_changes().is_empty());

        theirs.write("k", "2").unwrap();
        assert_eq!(
            ours.take_external_changes(),
            vec![StorageEvent {
                key: "k".to_string(),
                new_value: Some("2".to_string()),
            }]
        );
        assert!(ours.take_external_changes().is_empty());

        theirs.remove("k").unwrap();
        assert_eq!(
            ours.take_external_changes(),
            vec![StorageEvent {
                key: "k".to_string(),
                new_value: None,
            }]
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_concurrent_writers_never_lose_a_write() {
        let dir = scratch_dir("concurrent");
        FileStorage::new(&dir).unwrap();

        let writers: Vec<_> = (0..8)
            .map(|w| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let mut storage = FileStorage::new(&dir).unwrap();
                    for i in 0..50 {
                        storage.write("nav", &format!("{}-{}", w, i)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let storage = FileStorage::new(&dir).unwrap();
        let last = storage.read("nav").unwrap().unwrap();
        assert!(last.ends_with("-49"), "unexpected slot content {:?}", last);

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_ignores_untracked_keys() {
        let dir = scratch_dir("untracked");
        let mut ours = FileStorage::new(&dir).unwrap();
        let mut theirs = FileStorage::new(&dir).unwrap();

        theirs.write("other", "x").unwrap();
        assert!(ours.take_external_changes().is_empty());

        let _ = fs::remove_dir_all(&dir);
    }
}
