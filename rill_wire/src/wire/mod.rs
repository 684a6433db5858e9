//! Wire-level item model and the codec contract both formats satisfy.

mod binary;
mod text;

pub use binary::*;
pub use text::*;

use crate::tag::Tag;
use derive_more::{Deref, From};
use rill_types::{CodecError, Result};
use std::collections::HashMap;

/// Primitive scalars a wire codec can carry directly. `Bytes` exists only on
/// codecs whose `supports_binary()` is true; the domain layer substitutes a
/// base64 string elsewhere.
#[derive(PartialEq, Clone, Debug)]
pub enum WireScalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// One decoded stream position: a plain scalar, or an extension header with
/// its fixed-arity payload. An extension's children follow as subsequent
/// `read()` results.
#[derive(PartialEq, Clone, Debug)]
pub enum WireItem {
    Scalar(WireScalar),
    Ext { tag: Tag, payload: Vec<WireScalar> },
}

pub trait WireWrite {
    fn write(&mut self, scalar: &WireScalar) -> Result<()>;

    /// Emits an extension header. `pending_children` tells the codec how
    /// many subsequent `write`/`write_ext` calls belong inside this
    /// extension's frame; the binary codec ignores it (its stream is flat),
    /// the text codec uses it to close the nested array form.
    fn write_ext(&mut self, tag: Tag, payload: &[WireScalar], pending_children: usize)
        -> Result<()>;

    /// Whether a true binary-blob scalar exists on this codec.
    fn supports_binary(&self) -> bool;
}

pub trait WireRead {
    fn read(&mut self) -> Result<WireItem>;

    fn supports_binary(&self) -> bool;
}

#[derive(From, Deref, PartialEq, Eq, Clone, Copy, Debug)]
pub struct StrIndex(u32);

/// Write-side string tabulation: value-keyed, so equal strings tabulate
/// once. Eligibility policy: nulls, numbers, booleans and structural items
/// are never offered; every string becomes eligible the moment it is first
/// written.
#[derive(Default)]
pub(crate) struct WriteStrTable {
    seen: HashMap<String, StrIndex>,
}

impl WriteStrTable {
    /// Index of a previously-written string, or `None` after recording a
    /// first occurrence.
    pub fn offer(&mut self, s: &str) -> Option<StrIndex> {
        if let Some(idx) = self.seen.get(s) {
            return Some(*idx);
        }
        let idx = StrIndex(self.seen.len() as u32);
        self.seen.insert(s.to_owned(), idx);
        None
    }
}

/// Read-side counterpart, grown in stream order.
#[derive(Default)]
pub(crate) struct ReadStrTable {
    seen: Vec<String>,
}

impl ReadStrTable {
    pub fn record(&mut self, s: &str) {
        self.seen.push(s.to_owned());
    }

    pub fn resolve(&self, idx: i64) -> Result<String> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.seen.get(i))
            .cloned()
            .ok_or_else(|| {
                CodecError::malformed(format!("string back-reference {idx} out of range"))
            })
    }
}
