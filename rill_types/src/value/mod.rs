mod map;
mod scalar;

pub use map::*;
pub use scalar::*;

use crate::types::{ObjectCell, TypeHandle};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;

/// Shared mutable cell backing every composite kind.
pub type Shared<T> = Rc<RefCell<T>>;

/// The closed universe of serializable values.
///
/// Composite kinds and heap-backed domain scalars are reference-counted, so
/// the same underlying object may occupy several positions of one graph.
/// The codecs detect that sharing through [`Value::identity`] and encode the
/// repeats as back-references.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),

    Binary(Rc<Vec<u8>>),
    Symbol(Rc<str>),
    Pattern(Rc<Pattern>),
    Version(Rc<semver::Version>),
    VersionRange(Rc<VersionRange>),
    Timestamp(Timestamp),
    Timespan(Timespan),
    Comment(Rc<str>),
    Default,
    /// An unresolved type name.
    TypeRef(Rc<str>),
    /// A resolved runtime type.
    Type(TypeHandle),

    Seq(Shared<Vec<Value>>),
    Map(Shared<ValueMap>),
    Sensitive(Shared<Value>),
    Object(Shared<ObjectCell>),
}

/// Non-owning identity token: the address of the value's shared allocation
/// paired with the value's kind.
///
/// Only kinds with a reference-counted backing have an identity. Identity is
/// what the tabulation tables are keyed by; value equality never is. The
/// kind is part of the token because two kinds can share one backing
/// allocation (a `Str` and a `Symbol` over the same `Rc<str>`) and must not
/// alias in the tables.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct ValueId(usize, mem::Discriminant<Value>);

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }
    pub fn symbol(s: impl AsRef<str>) -> Self {
        Value::Symbol(Rc::from(s.as_ref()))
    }
    pub fn comment(s: impl AsRef<str>) -> Self {
        Value::Comment(Rc::from(s.as_ref()))
    }
    pub fn type_ref(name: impl AsRef<str>) -> Self {
        Value::TypeRef(Rc::from(name.as_ref()))
    }
    pub fn binary(bytes: Vec<u8>) -> Self {
        Value::Binary(Rc::new(bytes))
    }
    pub fn seq(elems: Vec<Value>) -> Self {
        Value::Seq(Rc::new(RefCell::new(elems)))
    }
    pub fn map(map: ValueMap) -> Self {
        Value::Map(Rc::new(RefCell::new(map)))
    }
    pub fn sensitive(inner: Value) -> Self {
        Value::Sensitive(Rc::new(RefCell::new(inner)))
    }
    pub fn object(dtype: TypeHandle, attrs: Vec<Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectCell::new(dtype, attrs))))
    }
    pub fn object_placeholder() -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectCell::placeholder())))
    }

    pub fn identity(&self) -> Option<ValueId> {
        let addr = match self {
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Default
            | Value::Timestamp(_)
            | Value::Timespan(_) => return None,
            Value::Str(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Binary(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Symbol(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Pattern(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Version(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::VersionRange(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Comment(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::TypeRef(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Type(arc) => Arc::as_ptr(arc) as *const u8 as usize,
            Value::Seq(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Map(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Sensitive(rc) => Rc::as_ptr(rc) as *const u8 as usize,
            Value::Object(rc) => Rc::as_ptr(rc) as *const u8 as usize,
        };
        Some(ValueId(addr, mem::discriminant(self)))
    }

    /// Whether two values are backed by the very same allocation.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::Binary(_) => "Binary",
            Value::Symbol(_) => "Symbol",
            Value::Pattern(_) => "Pattern",
            Value::Version(_) => "Version",
            Value::VersionRange(_) => "VersionRange",
            Value::Timestamp(_) => "Timestamp",
            Value::Timespan(_) => "Timespan",
            Value::Comment(_) => "Comment",
            Value::Default => "Default",
            Value::TypeRef(_) => "TypeRef",
            Value::Type(_) => "Type",
            Value::Seq(_) => "Seq",
            Value::Map(_) => "Map",
            Value::Sensitive(_) => "Sensitive",
            Value::Object(_) => "Object",
        }
    }
}

/// Structural equality with an identity shortcut.
///
/// Two positions holding the same allocation compare equal without
/// descending, which also keeps comparison of a self-containing composite
/// against itself from recursing forever.
///
/// A composite cell currently borrowed for mutation is under construction;
/// the identity shortcut has already ruled sameness out at that point, so it
/// compares unequal instead of re-borrowing. Decoders rely on this: a map
/// may legitimately contain itself as a key, and the key scan runs while the
/// map's own cell is mutably borrowed.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if self.same_instance(other) {
            return true;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pattern(a), Value::Pattern(b)) => a.source() == b.source(),
            (Value::Version(a), Value::Version(b)) => a == b,
            (Value::VersionRange(a), Value::VersionRange(b)) => a.source() == b.source(),
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Timespan(a), Value::Timespan(b)) => a == b,
            (Value::Comment(a), Value::Comment(b)) => a == b,
            (Value::Default, Value::Default) => true,
            (Value::TypeRef(a), Value::TypeRef(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a.name() == b.name(),
            (Value::Seq(a), Value::Seq(b)) => match (a.try_borrow(), b.try_borrow()) {
                (Ok(a), Ok(b)) => *a == *b,
                _ => false,
            },
            (Value::Map(a), Value::Map(b)) => match (a.try_borrow(), b.try_borrow()) {
                (Ok(a), Ok(b)) => *a == *b,
                _ => false,
            },
            (Value::Sensitive(a), Value::Sensitive(b)) => {
                match (a.try_borrow(), b.try_borrow()) {
                    (Ok(a), Ok(b)) => *a == *b,
                    _ => false,
                }
            }
            (Value::Object(a), Value::Object(b)) => match (a.try_borrow(), b.try_borrow()) {
                (Ok(a), Ok(b)) => {
                    let type_names_eq = match (&a.dtype, &b.dtype) {
                        (Some(ta), Some(tb)) => ta.name() == tb.name(),
                        (None, None) => true,
                        _ => false,
                    };
                    type_names_eq && a.attrs == b.attrs
                }
                _ => false,
            },
            _ => false,
        }
    }
}

const DISPLAY_MAX_DEPTH: usize = 8;

impl Value {
    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth > DISPLAY_MAX_DEPTH {
            return write!(f, "...");
        }
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
            Value::Symbol(s) => write!(f, ":{s}"),
            Value::Pattern(p) => write!(f, "/{}/", p.source()),
            Value::Version(v) => write!(f, "{v}"),
            Value::VersionRange(r) => write!(f, "{}", r.source()),
            Value::Timestamp(t) => write!(f, "{t}"),
            Value::Timespan(t) => write!(f, "{t}"),
            Value::Comment(c) => write!(f, "#{c}"),
            Value::Default => write!(f, "default"),
            Value::TypeRef(name) => write!(f, "{name}"),
            Value::Type(t) => write!(f, "{}", t.name()),
            Value::Seq(elems) => {
                write!(f, "[")?;
                for (i, e) in elems.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    e.fmt_at(f, depth + 1)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    k.fmt_at(f, depth + 1)?;
                    write!(f, " => ")?;
                    v.fmt_at(f, depth + 1)?;
                }
                write!(f, "}}")
            }
            Value::Sensitive(_) => write!(f, "Sensitive [value redacted]"),
            Value::Object(cell) => {
                let cell = cell.borrow();
                match &cell.dtype {
                    Some(t) => write!(f, "{}(<{} attributes>)", t.name(), cell.attrs.len()),
                    None => write!(f, "<placeholder>"),
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}
