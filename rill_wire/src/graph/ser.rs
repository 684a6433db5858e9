use crate::domain;
use crate::graph::DEFAULT_MAX_DEPTH;
use crate::tag::Tag;
use crate::wire::{WireScalar, WireWrite};
use rill_types::types::{is_reserved_name, ObjectKind, ObjectTypeMeta, TypeHandle, OBJECT_TYPE_NAME};
use rill_types::value::{Value, ValueId};
use rill_types::{CodecError, Result};
use std::collections::HashMap;

/// Walks a value graph and emits it onto a wire codec, tabulating shared
/// instances.
///
/// The identity table is keyed by allocation, never by value equality: two
/// equal-but-distinct maps encode twice, the same map in two positions
/// encodes once plus a TABULATION back-reference. Index assignment mirrors
/// the order a decoder constructs values in, so the two sides agree on every
/// index without negotiation:
///
/// - sequences and maps take their index before their elements;
/// - sensitive wrappers take theirs after their single child;
/// - objects take theirs after their header (and inline type, when one
///   travels), before their attributes;
/// - times and timespans occupy an index but, having no identity, are never
///   back-referenced;
/// - strings are left to the wire codec's own value-keyed tabulation.
pub struct Serializer<'w, W: WireWrite> {
    w: &'w mut W,
    table: HashMap<ValueId, u32>,
    count: u32,
    depth: usize,
    max_depth: usize,
}

impl<'w, W: WireWrite> Serializer<'w, W> {
    pub fn new(w: &'w mut W) -> Self {
        Self::with_limit(w, DEFAULT_MAX_DEPTH)
    }

    pub fn with_limit(w: &'w mut W, max_depth: usize) -> Self {
        Self {
            w,
            table: HashMap::new(),
            count: 0,
            depth: 0,
            max_depth,
        }
    }

    pub fn write(&mut self, value: &Value) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(CodecError::RecursionLimit {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        let res = self.write_inner(value);
        self.depth -= 1;
        res
    }

    fn write_inner(&mut self, value: &Value) -> Result<()> {
        if let Some(id) = value.identity() {
            if let Some(&idx) = self.table.get(&id) {
                return self
                    .w
                    .write_ext(Tag::Tabulation, &[WireScalar::Int(idx as i64)], 0);
            }
        }

        match value {
            Value::Null => self.w.write(&WireScalar::Null),
            Value::Bool(b) => self.w.write(&WireScalar::Bool(*b)),
            Value::Int(i) => self.w.write(&WireScalar::Int(*i)),
            Value::Float(x) => self.w.write(&WireScalar::Float(*x)),
            Value::Str(s) => self.w.write(&WireScalar::Str(s.to_string())),

            Value::Default => domain::encode(self.w, value),
            Value::Binary(_)
            | Value::Symbol(_)
            | Value::Pattern(_)
            | Value::Version(_)
            | Value::VersionRange(_)
            | Value::Comment(_)
            | Value::Timestamp(_)
            | Value::Timespan(_)
            | Value::TypeRef(_) => {
                self.register(value);
                domain::encode(self.w, value)
            }

            Value::Type(dtype) => self.write_type(value, &dtype.clone()),

            Value::Seq(elems) => {
                let elems = elems.borrow();
                self.register(value);
                self.w.write_ext(
                    Tag::ArrayStart,
                    &[WireScalar::Int(elems.len() as i64)],
                    elems.len(),
                )?;
                for e in elems.iter() {
                    self.write(e)?;
                }
                Ok(())
            }
            Value::Map(map) => {
                let map = map.borrow();
                self.register(value);
                self.w.write_ext(
                    Tag::MapStart,
                    &[WireScalar::Int(map.len() as i64)],
                    map.len() * 2,
                )?;
                for (k, v) in map.iter() {
                    self.write(k)?;
                    self.write(v)?;
                }
                Ok(())
            }
            Value::Sensitive(inner) => {
                self.w.write_ext(Tag::SensitiveStart, &[], 1)?;
                let child = inner.borrow();
                self.write(&child)?;
                drop(child);
                self.register(value);
                Ok(())
            }
            Value::Object(cell) => {
                let dtype = cell.borrow().dtype.clone().ok_or(CodecError::Contract(
                    "cannot encode an object still under construction",
                ))?;
                self.write_object(value, &dtype)
            }
        }
    }

    /// A reserved type travels by name; anything else travels as an inline
    /// definition, itself an object of the reserved meta-type.
    fn write_type(&mut self, value: &Value, dtype: &TypeHandle) -> Result<()> {
        if is_reserved_name(dtype.name()) {
            self.register(value);
            domain::write_type_reference(self.w, dtype.name())
        } else {
            let attrs = ObjectTypeMeta::new().attribute_values(value)?;
            self.write_named_header(OBJECT_TYPE_NAME, attrs.len())?;
            self.register(value);
            for a in &attrs {
                self.write(a)?;
            }
            Ok(())
        }
    }

    fn write_object(&mut self, value: &Value, dtype: &TypeHandle) -> Result<()> {
        let kind = dtype.object_kind().ok_or(CodecError::NoDerivableType {
            kind: value.kind_name(),
        })?;
        let attrs = kind.attribute_values(value)?;

        if is_reserved_name(dtype.name()) {
            self.write_named_header(dtype.name(), attrs.len())?;
            self.register(value);
        } else {
            self.w.write_ext(
                Tag::ObjectStart,
                &[WireScalar::Int(attrs.len() as i64 + 1), WireScalar::Null],
                1 + attrs.len(),
            )?;
            self.write(&Value::Type(dtype.clone()))?;
            self.register(value);
        }
        for a in &attrs {
            self.write(a)?;
        }
        Ok(())
    }

    fn write_named_header(&mut self, name: &str, attr_count: usize) -> Result<()> {
        let segs = domain::segment_count(name);
        self.w.write_ext(
            Tag::ObjectStart,
            &[
                WireScalar::Int(attr_count as i64),
                WireScalar::Int(segs as i64),
            ],
            segs + attr_count,
        )?;
        domain::write_segments(self.w, name)
    }

    /// Claims the next table index. Identity-less values still consume one,
    /// keeping index assignment in step with the decoder.
    fn register(&mut self, value: &Value) {
        if let Some(id) = value.identity() {
            self.table.insert(id, self.count);
        }
        self.count += 1;
    }
}
