//! Dual-format serialization of cyclic value graphs.
//!
//! One graph walker drives two interchangeable wire codecs:
//!
//! - binary: little-endian, kind-marker framed, with a native byte-blob
//!   scalar;
//! - text: a single JSON document, extensions framed as nested arrays,
//!   byte blobs carried as base64.
//!
//! Both formats share the extension tag table in [`Tag`], identity-keyed
//! tabulation of shared and cyclic structure, value-keyed tabulation of
//! repeated strings, and the type protocol: reserved types travel by name,
//! everything else carries its definition inline and is bound into the
//! decoding [`Loader`](rill_types::types::Loader) on first sight.

mod domain;
mod graph;
mod tag;
mod wire;

pub use graph::{Deserializer, Serializer, DEFAULT_MAX_DEPTH};
pub use tag::Tag;
pub use wire::{
    BinaryReader, BinaryWriter, TextReader, TextWriter, WireItem, WireRead, WireScalar, WireWrite,
};

use rill_types::types::Loader;
use rill_types::value::Value;
use rill_types::Result;

pub fn to_binary(value: &Value) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = vec![];
    let mut w = BinaryWriter::new(&mut buf);
    Serializer::new(&mut w).write(value)?;
    Ok(buf)
}

pub fn from_binary(bytes: &[u8], loader: &Loader) -> Result<Value> {
    Deserializer::new(BinaryReader::new(bytes), loader).read()
}

pub fn to_text(value: &Value) -> Result<String> {
    let mut w = TextWriter::new();
    Serializer::new(&mut w).write(value)?;
    w.finish()
}

pub fn from_text(document: &str, loader: &Loader) -> Result<Value> {
    Deserializer::new(TextReader::new(document)?, loader).read()
}
