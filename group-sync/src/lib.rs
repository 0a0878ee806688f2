//! Sonos Group Synchronization
//!
//! Keeps the group-level controls of Sonos zones (group volume, group mute,
//! group membership) consistent with the controls of the individual
//! speakers, in both directions and without feedback loops.
//!
//! # Features
//!
//! - **Volume delta propagation**: a group volume command shifts every member by the same delta
//! - **Mute aggregation**: a group counts as muted only while every member is muted
//! - **Group switching**: join/leave requests decoded into typed device commands
//! - **Echo suppression**: the engine recognizes the change events its own writes cause
//! - **Projections**: one JSON snapshot per coordinator, published on a feed control point
//!
//! # Architecture
//!
//! ```text
//! ControlTransport ──changes──▶ decoder ──GroupEvent──▶ SyncEngine handlers
//!        ▲                                                 │
//!        │                          NodeModel ◀────────────┤ reads / guarded writes
//!        └──────────commands / updates─────────────────────┘
//!                                   GroupResolver, ProjectionBuilder
//! ```
//!
//! The outside world is reached only through the `NodeSource`,
//! `ControlTransport` and `Provisioner` traits. `MemoryHub` implements all
//! three in memory.
//!
//! # Quick Start
//!
//! ```rust
//! use group_sync::{Channel, ControlValue, EngineConfig, MemoryHub, ProxyKind, SyncEngine};
//!
//! let hub = MemoryHub::new();
//! let kitchen = hub.add_speaker("RINCON_A", "Kitchen", 50);
//! let dining = hub.add_speaker("RINCON_B", "Dining", 30);
//! hub.group(&kitchen, &[&dining]);
//!
//! let engine = SyncEngine::new(EngineConfig::default(), hub.collaborators()).unwrap();
//!
//! // A user raises the group volume from 40 to 50
//! hub.command(&ProxyKind::GroupVolume.control_for(&kitchen), ControlValue::from(50u8));
//! engine.process_available();
//!
//! assert_eq!(hub.channel_value(&kitchen, Channel::Volume), Some(ControlValue::Number(60.0)));
//! assert_eq!(hub.channel_value(&dining, Channel::Volume), Some(ControlValue::Number(40.0)));
//! ```
//!
//! # Background Processing
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use group_sync::{spawn_sync_worker, SyncEngine};
//!
//! let engine = Arc::new(SyncEngine::new(config, collaborators)?);
//! let worker = spawn_sync_worker(Arc::clone(&engine));
//! // ...
//! worker.stop();
//! engine.shutdown();
//! ```

// Core modules
pub mod decoder;
pub mod model;
pub mod node_model;
pub mod projection;
pub mod resolver;
pub mod suppression;
pub mod switch_config;
pub mod transport;

// Engine and its background worker
pub mod engine;
pub mod worker;

// Control point provisioning and teardown
mod provision;

// In-memory collaborators
pub mod memory;

// Configuration
pub mod config;

// Error types
pub mod error;

// Logging infrastructure
pub mod logging;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::EngineConfig;
pub use decoder::{decode_change, GroupEvent};
pub use engine::{Outcome, SyncEngine};
pub use memory::MemoryHub;
pub use model::{Channel, ControlPointId, Endpoint, Node, NodeId, ProxyKind};
pub use node_model::{NodeBinding, NodeModel, NodeRegistry};
pub use projection::{GroupProjection, GroupedItemInformation, ProjectionBuilder, VolumeInformation};
pub use resolver::{Candidate, GroupResolver};
pub use suppression::{SuppressionPolicy, SuppressionRegistry};
pub use switch_config::GroupSwitchConfig;
pub use transport::{
    Collaborators, ControlChange, ControlTransport, NodeSource, Provisioner, TransportError,
};
pub use worker::{spawn_sync_worker, SyncWorker};

// Control values come from the store crate
pub use control_store::{ChangeKind, ControlValue};

// ============================================================================
// Re-exports - Error types
// ============================================================================

pub use error::{Result, SyncError};

// ============================================================================
// Re-exports - Logging
// ============================================================================

pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Outcome, SyncEngine};
    pub use crate::memory::MemoryHub;
    pub use crate::model::{Channel, ControlPointId, Node, NodeId, ProxyKind};
    pub use crate::suppression::SuppressionPolicy;
    pub use crate::switch_config::GroupSwitchConfig;
    pub use crate::transport::{Collaborators, ControlTransport, NodeSource, Provisioner};
    pub use control_store::ControlValue;
}
