use crate::domain;
use crate::graph::DEFAULT_MAX_DEPTH;
use crate::tag::Tag;
use crate::wire::{WireItem, WireRead, WireScalar};
use rill_types::types::{construct, ArgumentsSource, Loader, TypeHandle};
use rill_types::value::{Value, ValueMap};
use rill_types::{CodecError, Result};

/// Rebuilds a value graph from a wire codec, resolving back-references
/// through a construction-order table kept in step with the encoder's.
///
/// Type definitions discovered mid-stream are bound into the loader, so a
/// later document on the same loader can reference them by name.
pub struct Deserializer<'l, R: WireRead> {
    r: R,
    table: Vec<Value>,
    loader: &'l Loader,
    depth: usize,
    max_depth: usize,
}

/// Where a factory stands in the placeholder/remember protocol.
#[derive(Clone, Copy)]
enum ArgState {
    /// Neither remembered nor pulled yet.
    Unknown,
    /// Pulled before remembering; a placeholder holds the table slot.
    ReplaceAfter { slot: usize },
    /// Remembered; the slot holds the canonical instance.
    Complete,
}

impl<'l, R: WireRead> Deserializer<'l, R> {
    pub fn new(r: R, loader: &'l Loader) -> Self {
        Self::with_limit(r, loader, DEFAULT_MAX_DEPTH)
    }

    pub fn with_limit(r: R, loader: &'l Loader, max_depth: usize) -> Self {
        Self {
            r,
            table: vec![],
            loader,
            depth: 0,
            max_depth,
        }
    }

    pub fn read(&mut self) -> Result<Value> {
        if self.depth >= self.max_depth {
            return Err(CodecError::RecursionLimit {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        let res = self.read_inner();
        self.depth -= 1;
        res
    }

    fn read_inner(&mut self) -> Result<Value> {
        let item = self.r.read()?;
        let (tag, payload) = match item {
            WireItem::Scalar(s) => {
                return Ok(match s {
                    WireScalar::Null => Value::Null,
                    WireScalar::Bool(b) => Value::Bool(b),
                    WireScalar::Int(i) => Value::Int(i),
                    WireScalar::Float(x) => Value::Float(x),
                    WireScalar::Str(s) => Value::str(s),
                    WireScalar::Bytes(_) => {
                        return Err(CodecError::malformed(
                            "raw bytes outside a binary extension",
                        ))
                    }
                })
            }
            WireItem::Ext { tag, payload } => (tag, payload),
        };

        match tag {
            Tag::Tabulation => {
                let idx = payload_index(&payload)?;
                self.table.get(idx).cloned().ok_or_else(|| {
                    CodecError::malformed(format!("back-reference {idx} out of range"))
                })
            }
            Tag::ArrayStart => {
                let len = payload_index(&payload)?;
                let value = Value::seq(Vec::with_capacity(len));
                self.table.push(value.clone());
                for _ in 0..len {
                    let elem = self.read()?;
                    let Value::Seq(elems) = &value else {
                        unreachable!()
                    };
                    elems.borrow_mut().push(elem);
                }
                Ok(value)
            }
            Tag::MapStart => {
                let pairs = payload_index(&payload)?;
                let value = Value::map(ValueMap::with_capacity(pairs));
                self.table.push(value.clone());
                for _ in 0..pairs {
                    let k = self.read()?;
                    let v = self.read()?;
                    let Value::Map(map) = &value else {
                        unreachable!()
                    };
                    map.borrow_mut().insert(k, v);
                }
                Ok(value)
            }
            Tag::SensitiveStart => {
                let inner = self.read()?;
                let value = Value::sensitive(inner);
                self.table.push(value.clone());
                Ok(value)
            }
            Tag::ObjectStart => self.read_object(&payload),
            Tag::InnerTabulation => Err(CodecError::Contract(
                "wire codec leaked a string back-reference",
            )),
            _ => {
                let value = domain::decode(&mut self.r, tag, &payload)?;
                Ok(match value {
                    Value::Default => Value::Default,
                    Value::TypeRef(name) => {
                        let value = match self.loader.lookup(&name) {
                            Some(dtype) => Value::Type(dtype),
                            None => Value::TypeRef(name),
                        };
                        self.table.push(value.clone());
                        value
                    }
                    other => {
                        self.table.push(other.clone());
                        other
                    }
                })
            }
        }
    }

    fn read_object(&mut self, payload: &[WireScalar]) -> Result<Value> {
        let (count, second) = match payload {
            [WireScalar::Int(c), second] if *c >= 0 => (*c as usize, second),
            _ => return Err(CodecError::malformed("bad object header")),
        };

        let (dtype, remaining) = match second {
            // Named form: the type is referenced by its qualified name and
            // must already be known to the loader.
            WireScalar::Int(segs) if *segs >= 1 => {
                let name = domain::read_name(&mut self.r, *segs as usize)?;
                let dtype = self
                    .loader
                    .lookup(&name)
                    .ok_or(CodecError::NoImplementationMapping { name })?;
                (dtype, count)
            }
            // Generic form: the type itself travels as the first child.
            WireScalar::Null => {
                if count == 0 {
                    return Err(CodecError::malformed("object header with no type slot"));
                }
                let dtype = match self.read()? {
                    Value::Type(dtype) => dtype,
                    Value::TypeRef(name) => {
                        return Err(CodecError::NoImplementationMapping {
                            name: name.to_string(),
                        })
                    }
                    other => {
                        return Err(CodecError::malformed(format!(
                            "object type slot holds {}",
                            other.kind_name()
                        )))
                    }
                };
                (dtype, count - 1)
            }
            _ => return Err(CodecError::malformed("bad object header")),
        };

        let mut args = WireArguments {
            de: self,
            dtype: dtype.clone(),
            remaining,
            pulled: 0,
            state: ArgState::Unknown,
        };
        let built = construct(&dtype, &mut args)?;
        let leftover = args.remaining;
        let state = args.state;
        if leftover != 0 {
            return Err(CodecError::Contract(
                "factory left encoded arguments unconsumed",
            ));
        }

        let value = self.commit(state, built);
        if let Value::Type(dtype) = &value {
            if !self.loader.bind_if_absent(dtype.name(), dtype.clone())? {
                // The name is already bound; the existing handle is the
                // canonical one, in the table as well.
                if let Some(existing) = self.loader.lookup(dtype.name()) {
                    if !std::sync::Arc::ptr_eq(&existing, dtype) {
                        let canonical = Value::Type(existing);
                        if let Some(slot) =
                            self.table.iter().rposition(|v| v.same_instance(&value))
                        {
                            self.table[slot] = canonical.clone();
                        }
                        return Ok(canonical);
                    }
                }
            }
        }
        Ok(value)
    }

    /// Reconciles the factory's result with its table slot. A factory that
    /// never called remember still consumes exactly one slot, matching the
    /// encoder's index assignment.
    fn commit(&mut self, state: ArgState, built: Value) -> Value {
        match state {
            ArgState::Complete => built,
            ArgState::Unknown => {
                self.table.push(built.clone());
                built
            }
            ArgState::ReplaceAfter { slot } => fill_slot(&mut self.table, slot, built),
        }
    }
}

/// Settles a placeholder slot. When both sides are objects the placeholder
/// cell is filled in place, so back-references already handed out stay
/// valid; otherwise the slot is simply overwritten. Returns the canonical
/// value the caller must continue with.
fn fill_slot(table: &mut [Value], slot: usize, instance: Value) -> Value {
    let current = table[slot].clone();
    if current.same_instance(&instance) {
        return current;
    }
    match (&current, &instance) {
        (Value::Object(cell), Value::Object(src)) if cell.borrow().is_placeholder() => {
            *cell.borrow_mut() = src.borrow().clone();
            current
        }
        _ => {
            table[slot] = instance.clone();
            instance
        }
    }
}

/// [`ArgumentsSource`] over the wire stream: hands the factory its argument
/// values in stream order, checks each against the type's declared
/// parameter signature, and runs the placeholder/remember protocol against
/// the deserializer's table.
struct WireArguments<'a, 'l, R: WireRead> {
    de: &'a mut Deserializer<'l, R>,
    dtype: TypeHandle,
    remaining: usize,
    pulled: usize,
    state: ArgState,
}

impl<R: WireRead> ArgumentsSource for WireArguments<'_, '_, R> {
    fn remember(&mut self, instance: Value) -> Value {
        let canonical = match self.state {
            ArgState::Unknown => {
                self.de.table.push(instance.clone());
                instance
            }
            ArgState::ReplaceAfter { slot } => fill_slot(&mut self.de.table, slot, instance),
            ArgState::Complete => instance,
        };
        self.state = ArgState::Complete;
        canonical
    }

    fn next(&mut self) -> Result<Value> {
        if self.remaining == 0 {
            return Err(CodecError::Contract(
                "factory pulled past the encoded argument count",
            ));
        }
        if let ArgState::Unknown = self.state {
            let slot = self.de.table.len();
            self.de.table.push(Value::object_placeholder());
            self.state = ArgState::ReplaceAfter { slot };
        }
        let value = self.de.read()?;
        if let Some(kind) = self.dtype.object_kind() {
            if let Some(attr) = kind.attributes().get(self.pulled) {
                if !attr.kind.accepts(&value) {
                    return Err(CodecError::TypeAssertion {
                        type_name: self.dtype.name().to_owned(),
                        index: self.pulled,
                        param: attr.name.clone(),
                    });
                }
            }
        }
        self.pulled += 1;
        self.remaining -= 1;
        Ok(value)
    }

    fn remaining(&self) -> usize {
        self.remaining
    }
}

fn payload_index(payload: &[WireScalar]) -> Result<usize> {
    match payload {
        [WireScalar::Int(n)] if *n >= 0 => Ok(*n as usize),
        _ => Err(CodecError::malformed("bad extension payload")),
    }
}
