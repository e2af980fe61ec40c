//! packr — a self-describing binary codec for cyclic value graphs.
//!
//! This crate serializes an arbitrary, possibly cyclic, graph of
//! dynamically-typed values (objects, arrays, maps, sets, scalars, symbols)
//! into a compact byte stream and back. Shared sub-structures and
//! self-reference survive the round trip: a node that appears twice in the
//! input is encoded once and back-referenced by offset, and decodes to the
//! same live node on the other side.
//!
//! # Architecture
//!
//! - **`types`** — The value model: [`types::Value`], the [`types::Node`]
//!   arena, and [`types::Graph`]
//! - **`pack`** — The wire codec: tag table, encoder, decoder
//! - **`error`** — Decode failure type (encoding is infallible)
//! - **`version`** — Format version constant and validation

pub mod error;
pub mod pack;
pub mod types;
pub mod version;
