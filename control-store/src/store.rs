//! Control point storage with change detection
//!
//! `ControlStore<Id>` holds one `ControlValue` per control point together
//! with a set of tags. Writes come in two flavors that mirror how home
//! automation hosts behave:
//!
//! - `update()` stores a new state and emits `ChangeKind::Updated` only
//!   when the value actually differs
//! - `command()` always emits `ChangeKind::Commanded`, then stores the
//!   value (emitting `Updated` as well when it differs)
//!
//! Events are only emitted for watched control points and carry the value
//! that was written.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::sync::{mpsc, Arc, Mutex, RwLock};

use crate::event::{ChangeEvent, ChangeKind};
use crate::iter::ChangeIterator;
use crate::value::ControlValue;

/// Error returned by fallible store operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The control point does not exist
    NotFound,
    /// An internal lock was poisoned by a panicking writer
    Poisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "control point not found"),
            StoreError::Poisoned => write!(f, "control store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A single control point: current value plus tags
#[derive(Debug, Clone, Default)]
struct Entry {
    value: ControlValue,
    tags: BTreeSet<String>,
}

/// Entries plus their creation order
///
/// Creation order is kept so tag queries are deterministic.
#[derive(Debug)]
struct Entries<Id> {
    by_id: HashMap<Id, Entry>,
    order: Vec<Id>,
}

impl<Id: Clone + Eq + Hash> Entries<Id> {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn entry_mut(&mut self, id: &Id) -> &mut Entry {
        if !self.by_id.contains_key(id) {
            self.order.push(id.clone());
        }
        self.by_id.entry(id.clone()).or_default()
    }
}

/// Shared store of control points with change detection
///
/// Clones share state, so one clone can be handed to a transport while
/// another is used to simulate the outside world in tests.
///
/// # Example
///
/// ```rust
/// use control_store::{ChangeKind, ControlStore, ControlValue};
///
/// let store = ControlStore::<String>::new();
/// let volume = "RINCON_A_volume".to_string();
///
/// store.create(&volume, &["SonosProxyItem"]);
/// store.watch(volume.clone());
///
/// store.update(&volume, ControlValue::Number(40.0));
/// let event = store.iter().try_recv().unwrap();
/// assert_eq!(event.kind, ChangeKind::Updated);
///
/// // Same value: no update event
/// store.update(&volume, ControlValue::Number(40.0));
/// assert!(store.iter().try_recv().is_none());
/// ```
pub struct ControlStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    entries: Arc<RwLock<Entries<Id>>>,

    watched: Arc<RwLock<HashSet<Id>>>,

    event_tx: mpsc::Sender<ChangeEvent<Id>>,

    event_rx: Arc<Mutex<mpsc::Receiver<ChangeEvent<Id>>>>,
}

impl<Id> ControlStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create a new empty store
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel();

        Self {
            entries: Arc::new(RwLock::new(Entries::new())),
            watched: Arc::new(RwLock::new(HashSet::new())),
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    /// Create a control point if it does not exist yet
    ///
    /// Returns `true` when a new control point was created. Existing points
    /// keep their value; the given tags are merged into theirs.
    pub fn create(&self, id: &Id, tags: &[&str]) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };
        let created = !entries.by_id.contains_key(id);
        let entry = entries.entry_mut(id);
        entry.tags.extend(tags.iter().map(|t| t.to_string()));
        created
    }

    /// Check whether a control point exists
    pub fn contains(&self, id: &Id) -> bool {
        self.entries
            .read()
            .map(|e| e.by_id.contains_key(id))
            .unwrap_or(false)
    }

    /// Current value of a control point, `None` if it does not exist
    pub fn get(&self, id: &Id) -> Option<ControlValue> {
        let entries = self.entries.read().ok()?;
        entries.by_id.get(id).map(|e| e.value.clone())
    }

    /// Store a new state, emitting `Updated` if the value changed
    ///
    /// Creates the control point if needed. Returns whether the value changed.
    pub fn update(&self, id: &Id, value: ControlValue) -> bool {
        let changed = self.store_value(id, value.clone());
        if changed {
            self.maybe_emit(id, ChangeKind::Updated, value);
        }
        changed
    }

    /// Send a command to a control point
    ///
    /// Always emits `Commanded`; additionally emits `Updated` when the
    /// command changed the stored state. Returns whether the value changed.
    pub fn command(&self, id: &Id, value: ControlValue) -> bool {
        let changed = self.store_value(id, value.clone());
        self.maybe_emit(id, ChangeKind::Commanded, value.clone());
        if changed {
            self.maybe_emit(id, ChangeKind::Updated, value);
        }
        changed
    }

    /// Register interest in a control point
    pub fn watch(&self, id: Id) {
        if let Ok(mut watched) = self.watched.write() {
            watched.insert(id);
        }
    }

    pub fn unwatch(&self, id: &Id) {
        if let Ok(mut watched) = self.watched.write() {
            watched.remove(id);
        }
    }

    pub fn is_watched(&self, id: &Id) -> bool {
        self.watched
            .read()
            .map(|w| w.contains(id))
            .unwrap_or(false)
    }

    /// Add a tag to an existing control point
    pub fn tag(&self, id: &Id, tag: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let entry = entries.by_id.get_mut(id).ok_or(StoreError::NotFound)?;
        entry.tags.insert(tag.to_string());
        Ok(())
    }

    pub fn has_tag(&self, id: &Id, tag: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.by_id.get(id).is_some_and(|entry| entry.tags.contains(tag)))
            .unwrap_or(false)
    }

    /// All control points carrying `tag`, in creation order
    pub fn tagged(&self, tag: &str) -> Vec<Id> {
        let Ok(entries) = self.entries.read() else {
            return Vec::new();
        };
        entries
            .order
            .iter()
            .filter(|id| entries.by_id.get(*id).is_some_and(|e| e.tags.contains(tag)))
            .cloned()
            .collect()
    }

    /// Remove a control point
    ///
    /// Returns `StoreError::NotFound` if it was already gone.
    pub fn remove(&self, id: &Id) -> Result<(), StoreError> {
        {
            let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
            if entries.by_id.remove(id).is_none() {
                return Err(StoreError::NotFound);
            }
            entries.order.retain(|existing| existing != id);
        }
        self.unwatch(id);
        Ok(())
    }

    /// Blocking iterator over change events of watched control points
    pub fn iter(&self) -> ChangeIterator<Id> {
        ChangeIterator::new(Arc::clone(&self.event_rx))
    }

    /// Number of control points
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All control point ids in creation order
    pub fn ids(&self) -> Vec<Id> {
        self.entries
            .read()
            .map(|e| e.order.clone())
            .unwrap_or_default()
    }

    fn store_value(&self, id: &Id, value: ControlValue) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };
        let entry = entries.entry_mut(id);
        if entry.value != value {
            entry.value = value;
            true
        } else {
            false
        }
    }

    fn maybe_emit(&self, id: &Id, kind: ChangeKind, value: ControlValue) {
        if self.is_watched(id) {
            let _ = self.event_tx.send(ChangeEvent::new(id.clone(), kind, value));
        }
    }
}

impl<Id> Default for ControlStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id> Clone for ControlStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            watched: Arc::clone(&self.watched),
            event_tx: self.event_tx.clone(),
            event_rx: Arc::clone(&self.event_rx),
        }
    }
}

impl<Id> std::fmt::Debug for ControlStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlStore")
            .field("control_points", &self.len())
            .finish()
    }
}
