//! Model types for group-sync

mod channel;
mod ids;
mod node;

pub use channel::{Channel, Endpoint, ProxyKind};
pub use ids::{ControlPointId, NodeId};
pub use node::Node;
