//! Context Protocol
//!
//! The discovery mechanism that lets a descendant node locate state owned
//! by an ancestor without being handed a direct reference.
//!
//! # Protocol
//!
//! 1. A provider registers `(variety, read-only view)` on its host node.
//!
//! 2. A consumer dispatches a request tagged with the desired variety and a
//!    one-shot callback. The request bubbles from the requesting node up
//!    through its ancestors.
//!
//! 3. The nearest node holding a provider of that exact variety stops the
//!    propagation and invokes the callback with its view. First match wins;
//!    farther providers are never notified.
//!
//! 4. For standing consumption (the factory context hook), the consumer
//!    subscribes to the view and re-exposes its snapshots as an ordinary
//!    reactive dependency. The subscription is tracked per connecting node
//!    and released on disconnect.
//!
//! The node tree itself belongs to the host environment; see
//! [`crate::host`] for the seam.

mod consumer;
mod variety;
mod view;

pub use consumer::ContextCell;
pub use variety::Variety;
pub use view::ContextView;
