//! Decoding: bytes → `Graph`.

use std::collections::HashMap;

use bytes::Buf;

use super::tag;
use crate::error::DecodeError;
use crate::types::{Graph, Node, NodeId, Value};
use crate::version;

/// Decodes a stream, mapping any failure to the in-band syntax-error
/// sentinel.
///
/// On malformed input the returned graph's root is [`Value::SyntaxError`]
/// and the whole result must be discarded; a single bad node anywhere in
/// the stream is never locally recoverable. Bytes after the root value are
/// ignored.
pub fn decode(bytes: &[u8]) -> Graph {
    match try_decode(bytes) {
        Ok(graph) => graph,
        Err(e) => {
            tracing::debug!(error = %e, "decode failed");
            let mut graph = Graph::new();
            graph.set_root(Value::SyntaxError);
            graph
        }
    }
}

/// Decodes a stream, surfacing the failure cause as a [`DecodeError`].
pub fn try_decode(bytes: &[u8]) -> Result<Graph, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    let byte = decoder.read_u8()?;
    if !version::is_supported(byte) {
        return Err(DecodeError::Version(byte));
    }
    let root = decoder.read_value()?;
    let mut graph = decoder.graph;
    graph.set_root(root);
    Ok(graph)
}

/// Call-scoped decoding state: the input cursor, the graph under
/// construction, and the offset table resolving back-references.
struct Decoder<'a> {
    rest: &'a [u8],
    total: usize,
    graph: Graph,
    /// Offset of each identity-bearing node's tag byte -> its arena index.
    by_offset: HashMap<u32, NodeId>,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            rest: bytes,
            total: bytes.len(),
            graph: Graph::new(),
            by_offset: HashMap::new(),
        }
    }

    /// Byte position of the next read, counted from stream start.
    fn offset(&self) -> usize {
        self.total - self.rest.remaining()
    }

    fn need(&self, n: usize) -> Result<(), DecodeError> {
        if self.rest.remaining() < n {
            Err(DecodeError::Truncated {
                offset: self.offset(),
                needed: n - self.rest.remaining(),
            })
        } else {
            Ok(())
        }
    }

    fn peek(&self) -> Result<u8, DecodeError> {
        self.need(1)?;
        Ok(self.rest[0])
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.need(1)?;
        Ok(self.rest.get_u8())
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.need(2)?;
        Ok(self.rest.get_u16())
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.need(4)?;
        Ok(self.rest.get_u32())
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.need(8)?;
        Ok(self.rest.get_f64())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        self.need(len)?;
        let data = self.rest[..len].to_vec();
        self.rest.advance(len);
        Ok(data)
    }

    fn read_string(&mut self, len: usize) -> Result<String, DecodeError> {
        let offset = self.offset();
        String::from_utf8(self.read_bytes(len)?)
            .map_err(|source| DecodeError::Utf8 { offset, source })
    }

    /// Allocates a node and records the offset of its tag byte, so
    /// back-references inside the node resolve to this same live instance.
    fn register(&mut self, offset: u32, node: Node) -> NodeId {
        let id = self.graph.insert(node);
        self.by_offset.insert(offset, id);
        id
    }

    /// Consumes a container terminator if one is next.
    fn consume_return(&mut self) -> Result<bool, DecodeError> {
        if self.peek()? == tag::RETURN {
            self.rest.advance(1);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn read_value(&mut self) -> Result<Value, DecodeError> {
        let start = self.offset() as u32;
        let byte = self.read_u8()?;
        match byte {
            tag::UNDEFINED => Ok(Value::Undefined),
            tag::NULL => Ok(Value::Null),
            tag::INVALID => Ok(Value::Invalid),
            tag::TRUE => Ok(Value::Boolean(true)),
            tag::FALSE => Ok(Value::Boolean(false)),

            tag::SYMBOL => {
                let id = self.register(start, Node::Symbol);
                Ok(Value::Node(id))
            }
            tag::SYMBOL32 => Ok(Value::UnknownSymbol),

            tag::UINT8 => Ok(Value::Number(f64::from(self.read_u8()?))),
            tag::FLOAT64 => Ok(Value::Number(self.read_f64()?)),

            tag::CYCLIC => {
                let at = self.read_u32()?;
                match self.by_offset.get(&at) {
                    Some(id) => Ok(Value::Node(*id)),
                    None => Err(DecodeError::BadBackref(at)),
                }
            }

            tag::STRING8 => {
                let len = self.read_u8()? as usize;
                Ok(Value::String(self.read_string(len)?))
            }
            tag::STRING16 => {
                let len = self.read_u16()? as usize;
                Ok(Value::String(self.read_string(len)?))
            }
            tag::STRING32 => {
                let len = self.read_u32()? as usize;
                Ok(Value::String(self.read_string(len)?))
            }

            tag::BYTES8 => {
                let len = self.read_u8()? as usize;
                Ok(Value::Bytes(self.read_bytes(len)?))
            }
            tag::BYTES16 => {
                let len = self.read_u16()? as usize;
                Ok(Value::Bytes(self.read_bytes(len)?))
            }
            tag::BYTES32 => {
                let len = self.read_u32()? as usize;
                Ok(Value::Bytes(self.read_bytes(len)?))
            }

            tag::BUFFER8 => {
                let len = self.read_u8()? as usize;
                Ok(Value::Buffer(self.read_bytes(len)?))
            }
            tag::BUFFER16 => {
                let len = self.read_u16()? as usize;
                Ok(Value::Buffer(self.read_bytes(len)?))
            }
            tag::BUFFER32 => {
                let len = self.read_u32()? as usize;
                Ok(Value::Buffer(self.read_bytes(len)?))
            }

            tag::OBJECT => self.read_object(start),
            tag::ARRAY => self.read_sequence(start, Node::Array),
            tag::MAP => self.read_map(start),
            tag::SET => self.read_sequence(start, Node::Set),

            // Everything else, including RETURN outside a terminator
            // position, SYNTAX_ERROR, and the reserved INT32 tag.
            _ => Err(DecodeError::UnknownTag {
                tag: byte,
                offset: start as usize,
            }),
        }
    }

    fn read_object(&mut self, start: u32) -> Result<Value, DecodeError> {
        let id = self.register(start, Node::Object(Vec::new()));
        let mut entries: Vec<(String, Value)> = Vec::new();
        loop {
            // The key length field doubles as the terminator.
            let len = self.read_u8()?;
            if len == tag::RETURN {
                break;
            }
            let key = self.read_string(len as usize)?;
            let value = self.read_value()?;
            match entries.iter_mut().find(|(k, _)| *k == key) {
                // A duplicate key overwrites in place, keeping the first
                // entry's position.
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
        *self.graph.node_mut(id) = Node::Object(entries);
        Ok(Value::Node(id))
    }

    fn read_sequence(
        &mut self,
        start: u32,
        wrap: fn(Vec<Value>) -> Node,
    ) -> Result<Value, DecodeError> {
        let id = self.register(start, wrap(Vec::new()));
        let mut items = Vec::new();
        while !self.consume_return()? {
            items.push(self.read_value()?);
        }
        *self.graph.node_mut(id) = wrap(items);
        Ok(Value::Node(id))
    }

    fn read_map(&mut self, start: u32) -> Result<Value, DecodeError> {
        let id = self.register(start, Node::Map(Vec::new()));
        let mut pairs = Vec::new();
        while !self.consume_return()? {
            let key = self.read_value()?;
            let value = self.read_value()?;
            pairs.push((key, value));
        }
        *self.graph.node_mut(id) = Node::Map(pairs);
        Ok(Value::Node(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::encode;

    fn round_trip(graph: &Graph) -> Graph {
        let decoded = decode(&encode(graph));
        assert!(graph.deep_eq(&decoded), "round trip changed the value");
        decoded
    }

    fn root_of(bytes: &[u8]) -> Value {
        decode(bytes).root().clone()
    }

    #[test]
    fn round_trip_scalars() {
        for value in [
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Number(0.0),
            Value::Number(255.0),
            Value::Number(256.0),
            Value::Number(-1.0),
            Value::Number(1.5),
            Value::String(String::new()),
            Value::String("hello".into()),
            Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            Value::Buffer(vec![1, 2, 3]),
        ] {
            let mut graph = Graph::new();
            graph.set_root(value);
            round_trip(&graph);
        }
    }

    #[test]
    fn round_trip_non_finite_numbers() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut graph = Graph::new();
            graph.set_root(Value::Number(n));
            round_trip(&graph);
        }
    }

    #[test]
    fn round_trip_string_length_class_boundaries() {
        for len in [255, 256, 65535, 65536] {
            let mut graph = Graph::new();
            graph.set_root(Value::String("x".repeat(len)));
            let decoded = round_trip(&graph);
            assert_eq!(
                decoded.root().as_str().map(str::len),
                Some(len),
                "failed for {len}"
            );
        }
    }

    #[test]
    fn round_trip_nested_containers() {
        let mut graph = Graph::new();
        let inner = graph.insert(Node::Array(vec![
            Value::from(1u8),
            Value::from("two"),
            Value::Boolean(true),
        ]));
        let map = graph.insert(Node::Map(vec![
            (Value::from("k"), inner.into()),
            (Value::Null, Value::from(9u8)),
        ]));
        let set = graph.insert(Node::Set(vec![Value::from(1u8), Value::from("a")]));
        let obj = graph.insert(Node::Object(vec![
            ("map".into(), map.into()),
            ("set".into(), set.into()),
            ("none".into(), Value::Undefined),
        ]));
        graph.set_root(obj.into());
        round_trip(&graph);
    }

    #[test]
    fn round_trip_buffer_flavors_stay_distinct() {
        let mut graph = Graph::new();
        let arr = graph.insert(Node::Array(vec![
            Value::Bytes(vec![1]),
            Value::Buffer(vec![1]),
        ]));
        graph.set_root(arr.into());
        let decoded = round_trip(&graph);
        let id = decoded.root().as_node().unwrap();
        match decoded.node(id) {
            Node::Array(items) => {
                assert!(matches!(items[0], Value::Bytes(_)));
                assert!(matches!(items[1], Value::Buffer(_)));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn self_reference_resolves_to_same_node() {
        let mut graph = Graph::new();
        let obj = graph.insert(Node::Object(vec![]));
        *graph.node_mut(obj) = Node::Object(vec![("self".into(), obj.into())]);
        graph.set_root(obj.into());

        let decoded = round_trip(&graph);
        let root = decoded.root().as_node().expect("root must be a node");
        let field = decoded.get(root, "self").and_then(Value::as_node);
        assert_eq!(field, Some(root), "self field must be the root, not a copy");
    }

    #[test]
    fn shared_structure_is_preserved() {
        let mut graph = Graph::new();
        let shared = graph.insert(Node::Object(vec![]));
        let root = graph.insert(Node::Object(vec![
            ("a".into(), shared.into()),
            ("b".into(), shared.into()),
        ]));
        graph.set_root(root.into());

        let decoded = round_trip(&graph);
        let root = decoded.root().as_node().unwrap();
        let a = decoded.get(root, "a").and_then(Value::as_node);
        let b = decoded.get(root, "b").and_then(Value::as_node);
        assert!(a.is_some());
        assert_eq!(a, b, "a and b must decode to the same instance");
    }

    #[test]
    fn mutual_cycle_round_trips() {
        let mut graph = Graph::new();
        let a = graph.insert(Node::Object(vec![]));
        let b = graph.insert(Node::Object(vec![("a".into(), a.into())]));
        *graph.node_mut(a) = Node::Object(vec![("b".into(), b.into())]);
        graph.set_root(a.into());

        let decoded = round_trip(&graph);
        let a = decoded.root().as_node().unwrap();
        let b = decoded.get(a, "b").and_then(Value::as_node).unwrap();
        assert_eq!(decoded.get(b, "a").and_then(Value::as_node), Some(a));
    }

    #[test]
    fn symbol_identity_within_one_stream() {
        let mut graph = Graph::new();
        let sym = graph.insert(Node::Symbol);
        let other = graph.insert(Node::Symbol);
        let arr = graph.insert(Node::Array(vec![sym.into(), sym.into(), other.into()]));
        graph.set_root(arr.into());

        let decoded = round_trip(&graph);
        let id = decoded.root().as_node().unwrap();
        let Node::Array(items) = decoded.node(id) else {
            panic!("expected array");
        };
        let first = items[0].as_node();
        assert_eq!(first, items[1].as_node(), "repeated symbol keeps identity");
        assert_ne!(first, items[2].as_node(), "distinct symbols stay distinct");
    }

    #[test]
    fn sentinels_survive_repacking() {
        for sentinel in [Value::Invalid, Value::UnknownSymbol, Value::SyntaxError] {
            let mut graph = Graph::new();
            graph.set_root(sentinel.clone());
            let decoded = decode(&encode(&graph));
            assert_eq!(decoded.root(), &sentinel);
        }
    }

    #[test]
    fn version_mismatch_rejected() {
        for first in [0u8, 2, 0xFF] {
            assert_eq!(root_of(&[first, tag::NULL]), Value::SyntaxError);
            assert!(matches!(
                try_decode(&[first, tag::NULL]),
                Err(DecodeError::Version(_))
            ));
        }
    }

    #[test]
    fn empty_input_rejected() {
        assert_eq!(root_of(&[]), Value::SyntaxError);
        assert!(matches!(
            try_decode(&[]),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            try_decode(&[1, 0x40]),
            Err(DecodeError::UnknownTag { tag: 0x40, offset: 1 })
        ));
    }

    #[test]
    fn reserved_int32_tag_rejected() {
        assert!(matches!(
            try_decode(&[1, tag::INT32, 0, 0, 0, 5]),
            Err(DecodeError::UnknownTag { tag: tag::INT32, .. })
        ));
    }

    #[test]
    fn bare_return_rejected() {
        assert!(matches!(
            try_decode(&[1, tag::RETURN]),
            Err(DecodeError::UnknownTag { tag: tag::RETURN, .. })
        ));
    }

    #[test]
    fn return_in_map_value_position_rejected() {
        // A pair's key decodes, then the terminator appears where the
        // value should be.
        let bytes = [1, tag::MAP, tag::NULL, tag::RETURN];
        assert!(matches!(
            try_decode(&bytes),
            Err(DecodeError::UnknownTag { tag: tag::RETURN, .. })
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        // Declares five string bytes, supplies one.
        assert!(matches!(
            try_decode(&[1, tag::STRING8, 5, b'a']),
            Err(DecodeError::Truncated { .. })
        ));
        // Float missing most of its payload.
        assert!(matches!(
            try_decode(&[1, tag::FLOAT64, 0x3F]),
            Err(DecodeError::Truncated { .. })
        ));
        // Unterminated container.
        assert!(matches!(
            try_decode(&[1, tag::ARRAY, tag::NULL]),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn backref_to_unknown_offset_rejected() {
        assert!(matches!(
            try_decode(&[1, tag::CYCLIC, 0, 0, 0, 9]),
            Err(DecodeError::BadBackref(9))
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert!(matches!(
            try_decode(&[1, tag::STRING8, 1, 0xFF]),
            Err(DecodeError::Utf8 { .. })
        ));
    }

    #[test]
    fn duplicate_object_key_overwrites_in_place() {
        let bytes = [
            1,
            tag::OBJECT,
            1,
            b'a',
            tag::UINT8,
            1,
            1,
            b'b',
            tag::NULL,
            1,
            b'a',
            tag::UINT8,
            2,
            tag::RETURN,
        ];
        let decoded = decode(&bytes);
        let id = decoded.root().as_node().unwrap();
        let Node::Object(entries) = decoded.node(id) else {
            panic!("expected object");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[0].1, Value::Number(2.0));
        assert_eq!(entries[1].0, "b");
    }

    #[test]
    fn trailing_bytes_ignored() {
        assert_eq!(root_of(&[1, tag::NULL, 0xAB, 0xCD]), Value::Null);
    }

    #[test]
    fn uint8_payload_value() {
        assert_eq!(root_of(&[1, tag::UINT8, 200]), Value::Number(200.0));
    }

    #[test]
    fn symbol32_decodes_to_unknown_symbol() {
        assert_eq!(root_of(&[1, tag::SYMBOL32]), Value::UnknownSymbol);
    }
}
