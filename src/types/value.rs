//! Value and node types.

use std::collections::HashSet;
use std::fmt;

/// Index of an identity-bearing node in a [`Graph`].
///
/// A `NodeId` is only meaningful within the graph that produced it. Repeating
/// an id is how shared structure and cycles are expressed: two `Value::Node`s
/// holding the same id denote the same live node, not two copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of this node in its arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A dynamically-typed value.
///
/// Scalars and sentinels are stored inline; containers and symbols live in
/// the enclosing [`Graph`] and are referenced through [`Value::Node`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent marker, distinct from `Null`.
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    /// All numbers are IEEE-754 doubles. The encoder picks a compact wire
    /// form for exact integers in `0..=255`; that choice is invisible here.
    Number(f64),
    /// Unicode text, stored UTF-8 encoded on the wire.
    String(String),
    /// Owned byte block.
    Bytes(Vec<u8>),
    /// Externally-shaped binary buffer. Same layout as `Bytes`, distinct
    /// wire tag.
    Buffer(Vec<u8>),
    /// Sentinel: the original value had no representable form.
    Invalid,
    /// Sentinel: a symbol whose identity could not be recovered.
    UnknownSymbol,
    /// Sentinel: the input stream was malformed.
    SyntaxError,
    /// Reference to an identity-bearing node in the enclosing [`Graph`].
    Node(NodeId),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) | Self::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns `true` for the three failure/loss-of-information sentinels.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Invalid | Self::UnknownSymbol | Self::SyntaxError)
    }
}

/// An identity-bearing node: a container or an opaque symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered string-keyed entries. Keys are unique within one object.
    Object(Vec<(String, Value)>),
    /// Ordered, index-addressed values.
    Array(Vec<Value>),
    /// Ordered pairs; keys may be any value kind.
    Map(Vec<(Value, Value)>),
    /// Ordered elements. Producers are responsible for distinctness; the
    /// codec preserves order as given.
    Set(Vec<Value>),
    /// An opaque identity-only token. Its identity is its [`NodeId`].
    Symbol,
}

/// An arena of identity-bearing nodes plus a root value.
///
/// Containers own their children outright; there is no shared ownership.
/// Sharing and self-reference are expressed solely by repeating a
/// [`NodeId`], so cyclic graphs need no reference counting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    root: Value,
}

impl Graph {
    /// Creates an empty graph with an `Undefined` root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the arena and returns its id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Borrows a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutably borrows a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this graph.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn set_root(&mut self, root: Value) {
        self.root = root;
    }

    /// Number of identity-bearing nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up an object field by key. Returns `None` if `id` is not an
    /// object or the key is absent.
    pub fn get(&self, id: NodeId, key: &str) -> Option<&Value> {
        match self.node(id) {
            Node::Object(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Structural equality against another graph, starting from the roots.
    ///
    /// Node ids are compared by shape, not by index, so two graphs laid out
    /// differently in their arenas can still be deeply equal. Cycles are
    /// handled by assuming equality for a node pair already under
    /// comparison. Numbers compare by bit pattern: NaN payloads survive a
    /// round trip and `0.0` differs from `-0.0`.
    pub fn deep_eq(&self, other: &Graph) -> bool {
        let mut visited = HashSet::new();
        self.value_eq(&self.root, other, &other.root, &mut visited)
    }

    fn value_eq(
        &self,
        a: &Value,
        other: &Graph,
        b: &Value,
        visited: &mut HashSet<(NodeId, NodeId)>,
    ) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.to_bits() == y.to_bits(),
            (Value::Node(x), Value::Node(y)) => {
                if !visited.insert((*x, *y)) {
                    return true;
                }
                self.node_eq(self.node(*x), other, other.node(*y), visited)
            }
            _ => a == b,
        }
    }

    fn node_eq(
        &self,
        a: &Node,
        other: &Graph,
        b: &Node,
        visited: &mut HashSet<(NodeId, NodeId)>,
    ) -> bool {
        match (a, b) {
            (Node::Object(xs), Node::Object(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|((ka, va), (kb, vb))| {
                        ka == kb && self.value_eq(va, other, vb, visited)
                    })
            }
            (Node::Array(xs), Node::Array(ys)) | (Node::Set(xs), Node::Set(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys)
                        .all(|(va, vb)| self.value_eq(va, other, vb, visited))
            }
            (Node::Map(xs), Node::Map(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|((ka, va), (kb, vb))| {
                        self.value_eq(ka, other, kb, visited)
                            && self.value_eq(va, other, vb, visited)
                    })
            }
            (Node::Symbol, Node::Symbol) => true,
            _ => false,
        }
    }
}

// -- Convenience conversions --

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Buffer(b) => write!(f, "<buffer, {} bytes>", b.len()),
            Self::Invalid => write!(f, "<invalid>"),
            Self::UnknownSymbol => write!(f, "<unknown symbol>"),
            Self::SyntaxError => write!(f, "<syntax error>"),
            Self::Node(id) => write!(f, "#{}", id.index()),
        }
    }
}
