//! The pack binary wire format.
//!
//! A stream is a 1-byte format version followed by exactly one
//! self-describing encoded value. Every encoded node starts with a tag byte
//! from [`tag`]; multi-byte integers, lengths, and floats are big-endian.
//! Containers carry no length prefix — they run until an explicit
//! terminator — while text and byte blocks are length-prefixed with the
//! smallest length class that fits.
//!
//! Repeated or self-referential nodes are encoded once and thereafter as a
//! back-reference to the byte offset of the first occurrence, counted from
//! the start of the stream (the version byte sits at offset 0, the root at
//! offset 1).

pub mod decode;
pub mod encode;
pub mod tag;

pub use decode::{decode, try_decode};
pub use encode::encode;
