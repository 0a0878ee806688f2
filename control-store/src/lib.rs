//! Control Point Store
//!
//! A small, dependency-free store of control points: named values that
//! home automation hosts expose for devices (a speaker's volume, its mute
//! flag, its zone name) plus the synthetic points an integration creates
//! for itself.
//!
//! # Features
//!
//! - **Typed values**: `ControlValue` with lenient numeric/switch views
//! - **Command vs. update**: commands are always delivered, updates only on change
//! - **Tags**: find and clean up control points owned by an integration
//! - **Blocking iteration**: consume change events via `std::sync::mpsc`
//!
//! # Quick Start
//!
//! ```rust
//! use control_store::{ControlStore, ControlValue};
//!
//! let store = ControlStore::<String>::new();
//! let mute = "RINCON_A_mute".to_string();
//!
//! store.watch(mute.clone());
//! store.command(&mute, ControlValue::Switch(true));
//!
//! for event in store.iter().try_iter() {
//!     println!("{:?} on {}", event.kind, event.entity_id);
//! }
//! assert_eq!(store.get(&mute), Some(ControlValue::Switch(true)));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ControlStore<Id>
//!     │
//!     ├── entries: HashMap<Id, Entry { value, tags }> + creation order
//!     │
//!     ├── watched: HashSet<Id>
//!     │
//!     └── event_channel: mpsc::channel<ChangeEvent<Id>>
//!             │
//!             └── ChangeIterator<Id>
//! ```

pub mod event;
pub mod iter;
pub mod store;
pub mod value;

pub use event::{ChangeEvent, ChangeKind};
pub use iter::{ChangeIterator, TimeoutIter, TryIter};
pub use store::{ControlStore, StoreError};
pub use value::ControlValue;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::event::{ChangeEvent, ChangeKind};
    pub use crate::iter::ChangeIterator;
    pub use crate::store::ControlStore;
    pub use crate::value::ControlValue;
}
