//! Error taxonomy for the state engine.
//!
//! Precondition violations surface as `Err` values from the operation that
//! broke them; policy violations (duplicate context providers) degrade
//! gracefully with a diagnostic instead, and programmer errors in reducers
//! fail fast with a panic. See the individual operation docs.

use thiserror::Error;

use crate::host::NodeId;

/// Errors surfaced by state manager operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// `provide()` or `inject()` was called before any host connection.
    #[error("connect to a host node with `connect_context` before calling `{operation}`")]
    NotConnected {
        /// The operation whose precondition failed.
        operation: &'static str,
    },

    /// A node that was disconnected cannot be reconnected; construct a new
    /// state instance instead.
    #[error("host node {node:?} was disconnected; construct a new state instance to reconnect")]
    NodeDisconnected {
        /// The terminal node.
        node: NodeId,
    },

    /// Disconnect was requested for a node this manager never connected to.
    #[error("host node {node:?} was never connected to this state manager")]
    UnknownNode {
        /// The unknown node.
        node: NodeId,
    },
}

/// Convenience alias for fallible state operations.
pub type Result<T> = std::result::Result<T, StateError>;
