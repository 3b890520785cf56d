use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Serialize, de::DeserializeOwned};

use crate::codec::{Codec, Json};
use crate::error::{HistoryError, StorageError};
use crate::storage::Storage;

pub const DEFAULT_CAPACITY: usize = 10;

/// Everything needed to build a [`NavigationHistory`].
pub struct HistoryOptions<S> {
    pub capacity: usize,
    pub initial_entries: Vec<S>,
    /// Falls back to the last entry when unset or out of range.
    pub initial_position: Option<usize>,
    /// Appended to `initial_entries` unless it is already the tail.
    pub initial_value: Option<S>,
    /// Values for which this returns `true` are never recorded.
    pub drop_item: Option<Box<dyn Fn(&S) -> bool>>,
    pub persistence_key: Option<String>,
}

impl<S> Default for HistoryOptions<S> {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            initial_entries: Vec::new(),
            initial_position: None,
            initial_value: None,
            drop_item: None,
            persistence_key: None,
        }
    }
}

impl<S> HistoryOptions<S> {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn initial_entries(mut self, entries: impl IntoIterator<Item = S>) -> Self {
        self.initial_entries = entries.into_iter().collect();
        self
    }

    pub fn initial_position(mut self, position: usize) -> Self {
        self.initial_position = Some(position);
        self
    }

    pub fn initial_value(mut self, value: S) -> Self {
        self.initial_value = Some(value);
        self
    }

    pub fn drop_item(mut self, predicate: impl Fn(&S) -> bool + 'static) -> Self {
        self.drop_item = Some(Box::new(predicate));
        self
    }

    pub fn persistence_key(mut self, key: impl Into<String>) -> Self {
        self.persistence_key = Some(key.into());
        self
    }
}

/// What a call to [`NavigationHistory::set`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Vetoed by `drop_item`; nothing changed.
    Dropped,
    /// Equal to the current value; history untouched.
    Unchanged,
    /// Recorded as a new navigation.
    Navigated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent<S> {
    Navigated { value: S, position: usize },
    Refreshed { value: S },
    Moved { value: S, position: usize },
    External { value: Option<S> },
    Restored { len: usize },
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<S> = Box<dyn FnMut(&HistoryEvent<S>)>;

struct Persistence<S> {
    key: String,
    history_key: String,
    storage: Box<dyn Storage>,
    codec: Box<dyn Codec<S>>,
    history_codec: Box<dyn Codec<Vec<S>>>,
}

impl<S> Persistence<S> {
    /// Reads and decodes the current value slot. Failures are logged and
    /// reported as absent.
    fn read_value(&self) -> Option<S> {
        match self.storage.read(&self.key) {
            Ok(Some(raw)) => match self.codec.decode(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    report_storage_error(&StorageError::Codec(e), &self.key, "read");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                report_storage_error(&e, &self.key, "read");
                None
            }
        }
    }

    fn write_value(&mut self, value: Option<&S>) {
        let result = match value {
            Some(value) => self
                .codec
                .encode(value)
                .map_err(StorageError::from)
                .and_then(|raw| self.storage.write(&self.key, &raw)),
            None => self.storage.remove(&self.key),
        };
        if let Err(e) = result {
            report_storage_error(&e, &self.key, "write");
        }
    }
}

fn report_storage_error(error: &StorageError, key: &str, operation: &str) {
    if error.is_quota() {
        log::warn!("Storage quota exceeded for key “{}” during {}.", key, operation);
    } else {
        log::warn!("Error during {} of storage key “{}”: {}", operation, key, error);
    }
}

fn validate_key(key: &str) -> Result<(), HistoryError> {
    if key.is_empty()
        || key.chars().any(char::is_whitespace)
        || key.contains(['/', '\\'])
        || key.starts_with('.')
    {
        return Err(HistoryError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// A bounded back/forward history that never holds the same value twice.
///
/// New values are appended at the cursor, discarding anything ahead of it;
/// `back`, `forward` and `go` only move the cursor. When built with
/// [`NavigationHistory::persisted`] the current value is mirrored into a
/// storage slot on every change, and the entry list can be saved and
/// restored explicitly.
pub struct NavigationHistory<S> {
    entries: Vec<S>,
    position: usize,
    index: HashMap<S, usize>,
    capacity: usize,
    current: Option<S>,
    drop_item: Option<Box<dyn Fn(&S) -> bool>>,
    observers: Vec<(SubscriptionId, Observer<S>)>,
    next_subscription: u64,
    persistence: Option<Persistence<S>>,
}

impl<S: Clone + Eq + Hash> NavigationHistory<S> {
    /// Builds a history that lives in memory only.
    pub fn new(options: HistoryOptions<S>) -> Result<Self, HistoryError> {
        if let Some(ref key) = options.persistence_key {
            return Err(HistoryError::MissingStorage(key.clone()));
        }
        Self::build(options, None)
    }

    /// Builds a history whose current value lives in `storage` under the
    /// options' persistence key, encoded with `codec`. Saved entry lists go
    /// to `<key>-history`, encoded with `history_codec`.
    ///
    /// A value already stored under the key wins over `initial_value`; if
    /// there is none, `initial_value` is written as the seed.
    pub fn persisted(
        mut options: HistoryOptions<S>,
        storage: Box<dyn Storage>,
        codec: Box<dyn Codec<S>>,
        history_codec: Box<dyn Codec<Vec<S>>>,
    ) -> Result<Self, HistoryError> {
        let key = options.persistence_key.take().ok_or(HistoryError::MissingKey)?;
        validate_key(&key)?;
        if options.capacity < 1 {
            return Err(HistoryError::InvalidCapacity(options.capacity));
        }

        let mut persistence = Persistence {
            history_key: format!("{}-history", key),
            key,
            storage,
            codec,
            history_codec,
        };
        match persistence.read_value() {
            Some(stored) => options.initial_value = Some(stored),
            None => {
                if let Some(ref seed) = options.initial_value {
                    persistence.write_value(Some(seed));
                }
            }
        }

        Self::build(options, Some(persistence))
    }

    fn build(
        options: HistoryOptions<S>,
        persistence: Option<Persistence<S>>,
    ) -> Result<Self, HistoryError> {
        let HistoryOptions {
            capacity,
            initial_entries,
            initial_position,
            initial_value,
            drop_item,
            ..
        } = options;

        if capacity < 1 {
            return Err(HistoryError::InvalidCapacity(capacity));
        }

        let mut entries = initial_entries;
        if let Some(ref value) = initial_value
            && entries.last() != Some(value)
        {
            entries.push(value.clone());
        }
        if entries.len() > capacity {
            entries.drain(..entries.len() - capacity);
        }

        let last = entries.len().saturating_sub(1);
        let position = match initial_position {
            Some(position) if position < entries.len() => position,
            _ => last,
        };

        let mut history = Self {
            entries,
            position,
            index: HashMap::new(),
            capacity,
            current: initial_value,
            drop_item,
            observers: Vec::new(),
            next_subscription: 0,
            persistence,
        };
        history.rebuild_index();
        Ok(history)
    }

    // ========================================
    // Navigation
    // ========================================

    /// Navigates to `value`.
    pub fn set(&mut self, value: S) -> SetOutcome {
        if let Some(ref drop_item) = self.drop_item
            && drop_item(&value)
        {
            log::debug!("navigation rejected by drop_item");
            return SetOutcome::Dropped;
        }

        if self.current.as_ref() == Some(&value) {
            self.persist_current();
            self.notify(move |_| HistoryEvent::Refreshed { value });
            return SetOutcome::Unchanged;
        }

        self.record(value.clone());
        self.current = Some(value);
        self.persist_current();
        self.notify(|h| HistoryEvent::Navigated {
            value: h.entries[h.position].clone(),
            position: h.position,
        });
        SetOutcome::Navigated
    }

    /// Navigates to a value derived from the current one.
    pub fn update(&mut self, f: impl FnOnce(Option<&S>) -> S) -> SetOutcome {
        let value = f(self.current.as_ref());
        self.set(value)
    }

    /// Appends `value` at the cursor: truncate the forward branch, push,
    /// evict the oldest entries past capacity, then collapse duplicates.
    fn record(&mut self, value: S) {
        if !self.entries.is_empty() && self.position < self.entries.len() - 1 {
            self.entries.truncate(self.position + 1);
        }

        self.entries.push(value.clone());
        self.position = self.entries.len() - 1;

        if self.entries.len() > self.capacity {
            let evicted = self.entries.len() - self.capacity;
            self.entries.drain(..evicted);
            self.position -= evicted;
        }

        let before = self.entries.len();
        let position = self.position;
        let mut i = 0;
        self.entries.retain(|entry| {
            let keep = i == position || *entry != value;
            i += 1;
            keep
        });
        self.position -= before - self.entries.len();

        self.rebuild_index();
        log::debug!(
            "recorded navigation at {} of {}",
            self.position,
            self.entries.len()
        );
    }

    /// Moves the cursor `amount` entries towards the oldest entry.
    pub fn back(&mut self, amount: usize) {
        if amount == 0 || self.position == 0 || self.entries.is_empty() {
            return;
        }
        self.move_to(self.position - amount.min(self.position));
    }

    /// Moves the cursor `amount` entries towards the newest entry.
    pub fn forward(&mut self, amount: usize) {
        if amount == 0 || !self.can_go_forward() {
            return;
        }
        let last = self.entries.len() - 1;
        self.move_to(self.position.saturating_add(amount).min(last));
    }

    /// Jumps to an absolute position; negative positions count from the end,
    /// so `-1` is the newest entry.
    pub fn go(&mut self, position: isize) {
        if self.entries.is_empty() {
            return;
        }
        let len = self.entries.len();
        let target = if position < 0 {
            len.saturating_sub(position.unsigned_abs())
        } else {
            (position as usize).min(len - 1)
        };
        if target == self.position {
            return;
        }
        self.move_to(target);
    }

    fn move_to(&mut self, position: usize) {
        self.position = position;
        self.current = Some(self.entries[position].clone());
        self.persist_current();
        self.notify(|h| HistoryEvent::Moved {
            value: h.entries[position].clone(),
            position,
        });
    }

    pub fn can_go_back(&self) -> bool {
        !self.entries.is_empty() && self.position > 0
    }

    pub fn can_go_forward(&self) -> bool {
        !self.entries.is_empty() && self.position < self.entries.len() - 1
    }

    // ========================================
    // Queries
    // ========================================

    pub fn index_of(&self, item: &S) -> Option<usize> {
        self.index.get(item).copied()
    }

    /// Entries oldest first.
    pub fn history(&self) -> &[S] {
        &self.entries
    }

    pub fn position(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.position)
        }
    }

    pub fn current(&self) -> Option<&S> {
        self.current.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn persistence_key(&self) -> Option<&str> {
        self.persistence.as_ref().map(|p| p.key.as_str())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.clone(), i))
            .collect();
    }

    // ========================================
    // Current value slot
    // ========================================

    /// Deletes the stored current value and clears it. Entries stay as they are.
    pub fn remove_value(&mut self) {
        if let Some(ref mut persistence) = self.persistence {
            persistence.write_value(None);
        }
        self.current = None;
        self.notify(|_| HistoryEvent::Removed);
    }

    /// Applies changes other handles made to the current value slot.
    ///
    /// Only the current value follows; entries and cursor are left alone.
    pub fn sync_external(&mut self) -> bool {
        let Some(ref mut persistence) = self.persistence else {
            return false;
        };

        let changes = persistence.storage.take_external_changes();
        let mut changed = false;
        for event in changes.into_iter().filter(|e| e.key == persistence.key) {
            let value = match event.new_value {
                None => None,
                Some(raw) => match persistence.codec.decode(&raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log::warn!("Error deserializing storage change: {}", e);
                        match persistence.read_value() {
                            Some(value) => Some(value),
                            None => continue,
                        }
                    }
                },
            };
            log::debug!("external change to “{}”", persistence.key);
            self.current = value;
            changed = true;
        }

        if changed {
            self.notify(|h| HistoryEvent::External {
                value: h.current.clone(),
            });
        }
        changed
    }

    fn persist_current(&mut self) {
        if let Some(ref mut persistence) = self.persistence {
            persistence.write_value(self.current.as_ref());
        }
    }

    // ========================================
    // Observers
    // ========================================

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&HistoryEvent<S>) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(other, _)| *other != id);
        self.observers.len() != before
    }

    fn notify(&mut self, event: impl FnOnce(&Self) -> HistoryEvent<S>) {
        if self.observers.is_empty() {
            return;
        }
        let event = event(self);
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    // ========================================
    // History slot
    // ========================================

    /// Writes the entries to `<key>-history`. Returns the entries whether or
    /// not the write succeeded.
    pub fn save_history(&mut self) -> &[S] {
        if let Some(ref mut persistence) = self.persistence {
            let result = persistence
                .history_codec
                .encode(&self.entries)
                .map_err(StorageError::from)
                .and_then(|raw| persistence.storage.write(&persistence.history_key, &raw));
            if let Err(e) = result {
                report_storage_error(&e, &persistence.history_key, "write");
            }
        }
        &self.entries
    }

    /// Replaces the entries with those saved under `<key>-history`. On any
    /// failure, or when the saved list is empty, the entries are left as
    /// they were.
    pub fn restore_history(&mut self) -> &[S] {
        let Some(ref persistence) = self.persistence else {
            return &self.entries;
        };

        let restored = match persistence.storage.read(&persistence.history_key) {
            Ok(Some(raw)) => persistence
                .history_codec
                .decode(&raw)
                .map_err(StorageError::from),
            Ok(None) => {
                log::warn!(
                    "Error during read of storage key “{}”: key not found",
                    persistence.history_key
                );
                return &self.entries;
            }
            Err(e) => Err(e),
        };

        let mut entries: Vec<S> = match restored {
            Ok(entries) => entries,
            Err(e) => {
                report_storage_error(&e, &persistence.history_key, "read");
                return &self.entries;
            }
        };
        if entries.is_empty() {
            log::debug!("“{}” holds no entries", persistence.history_key);
            return &self.entries;
        }

        if entries.len() > self.capacity {
            entries.drain(..entries.len() - self.capacity);
        }
        self.entries = entries;
        self.rebuild_index();
        self.position = self
            .current
            .as_ref()
            .and_then(|current| self.index.get(current).copied())
            .unwrap_or(self.entries.len() - 1);

        self.notify(|h| HistoryEvent::Restored {
            len: h.entries.len(),
        });
        &self.entries
    }
}

impl<S> NavigationHistory<S>
where
    S: Clone + Eq + Hash + Serialize + DeserializeOwned,
{
    /// Same as [`NavigationHistory::persisted`] with JSON for both slots.
    pub fn persisted_json(
        options: HistoryOptions<S>,
        storage: Box<dyn Storage>,
    ) -> Result<Self, HistoryError> {
        Self::persisted(options, storage, Box::new(Json), Box::new(Json))
    }
}

impl<S: fmt::Debug> fmt::Debug for NavigationHistory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationHistory")
            .field("entries", &self.entries)
            .field("position", &self.position)
            .field("capacity", &self.capacity)
            .field("current", &self.current)
            .field(
                "persistence_key",
                &self.persistence.as_ref().map(|p| p.key.as_str()),
            )
            .finish_non_exhaustive()
    }
}
