//! Object-graph walking over a wire codec: identity tabulation on the way
//! out, construction-order resolution on the way back.

mod deser;
mod ser;

pub use deser::*;
pub use ser::*;

/// Nesting depth both directions refuse to exceed. Cycles are caught by
/// tabulation; this bounds genuinely deep, unshared nesting.
pub const DEFAULT_MAX_DEPTH: usize = 512;
