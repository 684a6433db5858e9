//! Bidirectional conversion between value graphs and plain JSON-compatible
//! trees ("rich data").
//!
//! Where the wire codecs of `rill_wire` are lossless and self-describing,
//! this converter targets interchange with systems that only speak plain
//! maps, lists and scalars: type information rides in reserved
//! `"__type"`/`"__value"` keys, shared substructure in path-based
//! `LocalRef` nodes, and anything the target cannot carry degrades to a
//! string form with a warning when rich mode is off.

mod from_data;
mod path;
mod to_data;

pub use from_data::{from_data, from_data_with, FromDataOptions};
pub use to_data::{to_data, to_data_with, ToDataOptions};

/// Nesting depth both directions refuse to exceed.
pub(crate) const DEFAULT_MAX_DEPTH: usize = 512;
