//! Narrow interfaces through which the codecs consume the type system.
//!
//! The type algebra proper (assignability, normalization) lives outside this
//! engine. The codecs only need: a name, an instance test, factory
//! construction through an [`ArgumentsSource`], the string-round-trip flag,
//! and ordered attribute extraction for object kinds.

mod loader;
mod object;

pub use loader::*;
pub use object::*;

use crate::value::Value;
use crate::{CodecError, Result};
use std::fmt;
use std::sync::Arc;

/// Namespace reserved for the engine's own types. Objects whose type lives
/// here are wire-encoded by name instead of carrying their definition.
pub const RESERVED_NAMESPACE: &str = "Core";

/// The reserved meta-type whose instances are object-type definitions.
pub const OBJECT_TYPE_NAME: &str = "Core::ObjectType";

pub fn is_reserved_name(name: &str) -> bool {
    name == RESERVED_NAMESPACE
        || name
            .strip_prefix(RESERVED_NAMESPACE)
            .map_or(false, |rest| rest.starts_with("::"))
}

/// Shared handle to a runtime type. Types outlive any single encode/decode
/// and may be registered into a [`Loader`] shared across decoders.
pub type TypeHandle = Arc<dyn DataType>;

/// Capability every runtime type exposes to the codecs.
pub trait DataType: fmt::Debug + Send + Sync {
    /// Qualified name, `::`-separated.
    fn name(&self) -> &str;

    fn is_instance(&self, value: &Value) -> bool;

    /// Whether values of this type round-trip through a single string.
    fn string_roundtrip(&self) -> bool {
        false
    }

    fn to_string_form(&self, _value: &Value) -> Option<String> {
        None
    }

    fn from_string_form(&self, s: &str) -> Result<Value> {
        let _ = s;
        Err(CodecError::Contract(
            "type does not round-trip through a string",
        ))
    }

    /// The attribute-bearing capability, for object types.
    fn object_kind(&self) -> Option<&dyn ObjectKind> {
        None
    }

    /// Factory construction. `this` is the handle the instance should carry;
    /// it is passed explicitly because the trait object cannot clone an
    /// `Arc` of itself.
    fn new_instance(&self, this: &TypeHandle, args: &mut dyn ArgumentsSource) -> Result<Value>;
}

/// Constructs an instance of `dtype` from `args`.
pub fn construct(dtype: &TypeHandle, args: &mut dyn ArgumentsSource) -> Result<Value> {
    dtype.new_instance(dtype, args)
}

/// Ordered attribute extraction and the parameter signature of an object
/// type's factory.
pub trait ObjectKind {
    /// Declared attributes, in declaration order.
    fn attributes(&self) -> &[Attribute];

    /// The attribute values of an instance, in declaration order.
    fn attribute_values(&self, value: &Value) -> Result<Vec<Value>>;
}

/// One declared attribute: a name plus the signature check applied to
/// factory arguments.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub kind: AttrType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: AttrType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Structural parameter signature. Deliberately coarse: the full type
/// algebra is an external collaborator, and the decoder only needs enough to
/// reject wire data that cannot possibly construct.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum AttrType {
    Any,
    Bool,
    Int,
    Float,
    Str,
    Seq,
    Map,
    Object,
}

impl AttrType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttrType::Any => true,
            AttrType::Bool => matches!(value, Value::Bool(_)),
            AttrType::Int => matches!(value, Value::Int(_)),
            AttrType::Float => matches!(value, Value::Float(_)),
            AttrType::Str => matches!(value, Value::Str(_)),
            AttrType::Seq => matches!(value, Value::Seq(_)),
            AttrType::Map => matches!(value, Value::Map(_)),
            AttrType::Object => matches!(value, Value::Object(_)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttrType::Any => "Any",
            AttrType::Bool => "Boolean",
            AttrType::Int => "Integer",
            AttrType::Float => "Float",
            AttrType::Str => "String",
            AttrType::Seq => "Array",
            AttrType::Map => "Hash",
            AttrType::Object => "Object",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "Any" => AttrType::Any,
            "Boolean" => AttrType::Bool,
            "Integer" => AttrType::Int,
            "Float" => AttrType::Float,
            "String" => AttrType::Str,
            "Array" => AttrType::Seq,
            "Hash" => AttrType::Map,
            "Object" => AttrType::Object,
            other => {
                return Err(CodecError::malformed(format!(
                    "unknown attribute kind '{other}'"
                )))
            }
        })
    }
}

/// Supplies a factory's positional argument values while participating in
/// the placeholder/remember cyclic-construction protocol.
///
/// A factory either calls [`remember`](ArgumentsSource::remember) with its
/// (possibly still empty) instance before pulling any argument, or pulls all
/// arguments first; in the latter case the accessor registers a placeholder
/// in its backing table so arguments that reference the eventual instance
/// resolve, and `remember` later fills that placeholder in place. The
/// factory must continue with the value `remember` returns.
pub trait ArgumentsSource {
    fn remember(&mut self, instance: Value) -> Value;
    fn next(&mut self) -> Result<Value>;
    fn remaining(&self) -> usize;
}

/// Resolves a qualified type name to a handle.
pub trait TypeResolver {
    fn resolve(&self, name: &str) -> Option<TypeHandle>;
}
