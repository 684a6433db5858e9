//! Value model and runtime-type capability for the rill serialization engine.
//!
//! The [`value::Value`] enum is the closed universe of serializable kinds.
//! Composite kinds are shared `Rc<RefCell<_>>` cells, so one object may
//! appear at several positions of a graph (including inside itself) and the
//! codecs can observe that sharing through [`value::ValueId`].
//!
//! The [`types`] module holds the narrow interfaces through which the codecs
//! consume the type system: a [`types::DataType`] capability, the
//! attribute-bearing [`types::ObjectKind`], the [`types::ArgumentsSource`]
//! accessor protocol for cycle-safe construction, and the shared
//! name-to-type [`types::Loader`].

mod error;
pub mod types;
pub mod value;

pub use error::*;
