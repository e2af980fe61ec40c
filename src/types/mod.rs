//! The value model: dynamically-typed values and the node arena.

mod value;

pub use value::{Graph, Node, NodeId, Value};
