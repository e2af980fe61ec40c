//! Encoding: `Graph` → bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::tag;
use crate::types::{Graph, Node, NodeId, Value};
use crate::version::FORMAT_VERSION;

/// Encodes a graph into a self-contained stream: one version byte followed
/// by the encoded root.
///
/// Encoding cannot fail. Values with no representable form are written as
/// the invalid sentinel, and object entries whose key encodes to 255 or
/// more UTF-8 bytes are silently dropped.
pub fn encode(graph: &Graph) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(FORMAT_VERSION);
    // Call-scoped identity table: arena index -> offset of first encoding.
    let mut offsets = vec![None; graph.len()];
    encode_value(&mut buf, graph, graph.root(), &mut offsets);
    buf.freeze()
}

fn encode_value(buf: &mut BytesMut, graph: &Graph, value: &Value, offsets: &mut [Option<u32>]) {
    match value {
        Value::Undefined => buf.put_u8(tag::UNDEFINED),
        Value::Null => buf.put_u8(tag::NULL),
        Value::Boolean(true) => buf.put_u8(tag::TRUE),
        Value::Boolean(false) => buf.put_u8(tag::FALSE),
        Value::Number(n) => encode_number(buf, *n),
        Value::String(s) => encode_blob(buf, s.as_bytes(), tag::STRING8, tag::STRING16, tag::STRING32),
        Value::Bytes(b) => encode_blob(buf, b, tag::BYTES8, tag::BYTES16, tag::BYTES32),
        Value::Buffer(b) => encode_blob(buf, b, tag::BUFFER8, tag::BUFFER16, tag::BUFFER32),
        // Sentinels re-encode to the exact byte that produces them on
        // decode, so a decoded error value survives repacking.
        Value::Invalid => buf.put_u8(tag::INVALID),
        Value::UnknownSymbol => buf.put_u8(tag::SYMBOL32),
        Value::SyntaxError => buf.put_u8(tag::SYNTAX_ERROR),
        Value::Node(id) => encode_node(buf, graph, *id, offsets),
    }
}

/// Exact integers in `0..=255` take the 2-byte `UINT8` form; every other
/// number (negative, fractional, out of range, non-finite) takes the 9-byte
/// `FLOAT64` form.
fn encode_number(buf: &mut BytesMut, n: f64) {
    if n.fract() == 0.0 && (0.0..=255.0).contains(&n) {
        buf.put_u8(tag::UINT8);
        buf.put_u8(n as u8);
    } else {
        buf.put_u8(tag::FLOAT64);
        buf.put_f64(n);
    }
}

/// Writes a length-prefixed byte block with the smallest length class that
/// fits.
fn encode_blob(buf: &mut BytesMut, data: &[u8], tag8: u8, tag16: u8, tag32: u8) {
    if data.len() <= 0xFF {
        buf.put_u8(tag8);
        buf.put_u8(data.len() as u8);
    } else if data.len() <= 0xFFFF {
        buf.put_u8(tag16);
        buf.put_u16(data.len() as u16);
    } else {
        buf.put_u8(tag32);
        buf.put_u32(data.len() as u32);
    }
    buf.put_slice(data);
}

fn encode_node(buf: &mut BytesMut, graph: &Graph, id: NodeId, offsets: &mut [Option<u32>]) {
    if let Some(at) = offsets[id.index()] {
        buf.put_u8(tag::CYCLIC);
        buf.put_u32(at);
        return;
    }
    // Recorded before the contents so a node may legally reference itself.
    offsets[id.index()] = Some(buf.len() as u32);

    match graph.node(id) {
        Node::Symbol => buf.put_u8(tag::SYMBOL),
        Node::Object(entries) => {
            buf.put_u8(tag::OBJECT);
            for (key, value) in entries {
                if key.len() >= usize::from(tag::RETURN) {
                    tracing::trace!(key_bytes = key.len(), "dropping entry with oversized key");
                    continue;
                }
                buf.put_u8(key.len() as u8);
                buf.put_slice(key.as_bytes());
                encode_value(buf, graph, value, offsets);
            }
            buf.put_u8(tag::RETURN);
        }
        Node::Array(items) => {
            buf.put_u8(tag::ARRAY);
            for item in items {
                encode_value(buf, graph, item, offsets);
            }
            buf.put_u8(tag::RETURN);
        }
        Node::Map(pairs) => {
            buf.put_u8(tag::MAP);
            for (key, value) in pairs {
                encode_value(buf, graph, key, offsets);
                encode_value(buf, graph, value, offsets);
            }
            buf.put_u8(tag::RETURN);
        }
        Node::Set(items) => {
            buf.put_u8(tag::SET);
            for item in items {
                encode_value(buf, graph, item, offsets);
            }
            buf.put_u8(tag::RETURN);
        }
    }
}
