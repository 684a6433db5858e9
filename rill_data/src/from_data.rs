//! Reconstruction of value graphs from plain JSON-compatible trees.
//!
//! Dispatch runs on the reserved `"__type"` key. Composites enter the
//! path table before their children convert, so a `LocalRef` into an
//! in-progress ancestor resolves; typed objects run the same
//! placeholder/remember protocol as the wire decoder, keyed by path
//! instead of table index.

use crate::path::{parse, render, Step};
use crate::DEFAULT_MAX_DEPTH;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rill_types::types::{
    construct, ArgumentsSource, AttrType, Attribute, ObjectDataType, TypeHandle, TypeResolver,
};
use rill_types::value::{Pattern, Timespan, Timestamp, Value, ValueMap, VersionRange};
use rill_types::{CodecError, Result};
use serde_json::{Map as JsonMap, Value as Json};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Default)]
pub struct FromDataOptions {
    /// Pass nodes with an unresolvable type tag through as plain maps
    /// (with a warning) instead of failing.
    pub allow_unresolved: bool,
}

pub fn from_data(node: &Json, resolver: &dyn TypeResolver) -> Result<Value> {
    from_data_with(node, resolver, FromDataOptions::default())
}

pub fn from_data_with(
    node: &Json,
    resolver: &dyn TypeResolver,
    options: FromDataOptions,
) -> Result<Value> {
    let mut conv = FromDataConverter {
        resolver,
        options,
        by_path: HashMap::new(),
        path: vec![],
        max_depth: DEFAULT_MAX_DEPTH,
    };
    conv.convert(node)
}

struct FromDataConverter<'r> {
    resolver: &'r dyn TypeResolver,
    options: FromDataOptions,
    /// Canonical path of every composite converted (or under conversion) so
    /// far, for `LocalRef` resolution.
    by_path: HashMap<String, Value>,
    path: Vec<Step>,
    max_depth: usize,
}

#[derive(Clone, Copy)]
enum State {
    Unknown,
    ReplaceAfter,
    Complete,
}

impl FromDataConverter<'_> {
    fn convert(&mut self, node: &Json) -> Result<Value> {
        if self.path.len() >= self.max_depth {
            return Err(CodecError::RecursionLimit {
                limit: self.max_depth,
            });
        }
        match node {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n.as_f64().map(Value::Float).ok_or_else(|| {
                    CodecError::malformed(format!("unrepresentable number {n}"))
                }),
            },
            Json::String(s) => Ok(Value::str(s)),
            Json::Array(elems) => {
                let value = Value::seq(Vec::with_capacity(elems.len()));
                self.record(&value);
                for (i, elem) in elems.iter().enumerate() {
                    self.path.push(Step::Index(i));
                    let converted = self.convert(elem);
                    self.path.pop();
                    let Value::Seq(cell) = &value else {
                        unreachable!()
                    };
                    cell.borrow_mut().push(converted?);
                }
                Ok(value)
            }
            Json::Object(map) => self.convert_node(map),
        }
    }

    fn convert_node(&mut self, node: &JsonMap<String, Json>) -> Result<Value> {
        let tag = match node.get("__type") {
            None => return self.convert_plain_map(node),
            Some(Json::String(tag)) => tag.as_str(),
            Some(Json::Object(def)) => {
                let dtype = type_from_definition(def)?;
                return self.construct_object(dtype, node);
            }
            Some(other) => {
                return Err(CodecError::malformed(format!(
                    "'__type' must be a name or a definition, got {other}"
                )))
            }
        };

        match tag {
            "Hash" => {
                let Json::Array(flat) = payload(node)? else {
                    return Err(CodecError::malformed("'Hash' payload must be a list"));
                };
                if flat.len() % 2 != 0 {
                    return Err(CodecError::malformed(
                        "'Hash' payload must hold key/value pairs",
                    ));
                }
                let value = Value::map(ValueMap::with_capacity(flat.len() / 2));
                self.record(&value);
                for (i, pair) in flat.chunks(2).enumerate() {
                    self.path.push(Step::Key(String::from("__value")));
                    self.path.push(Step::Index(i * 2));
                    let k = self.convert(&pair[0]);
                    self.path.pop();
                    self.path.push(Step::Index(i * 2 + 1));
                    let v = self.convert(&pair[1]);
                    self.path.pop();
                    self.path.pop();
                    let Value::Map(cell) = &value else {
                        unreachable!()
                    };
                    cell.borrow_mut().insert(k?, v?);
                }
                Ok(value)
            }
            "Sensitive" => {
                let value = Value::sensitive(Value::Null);
                self.record(&value);
                self.path.push(Step::Key(String::from("__value")));
                let inner = self.convert(payload(node)?);
                self.path.pop();
                let Value::Sensitive(cell) = &value else {
                    unreachable!()
                };
                *cell.borrow_mut() = inner?;
                Ok(value)
            }
            "Symbol" => Ok(Value::symbol(payload_str(node)?)),
            "Default" => Ok(Value::Default),
            "LocalRef" => {
                let raw = payload_str(node)?;
                let canonical = render(&parse(raw)?);
                self.by_path.get(&canonical).cloned().ok_or_else(|| {
                    CodecError::malformed(format!("dangling local reference '{raw}'"))
                })
            }

            "Timestamp" => Ok(Value::Timestamp(Timestamp::parse(payload_str(node)?)?)),
            "Timespan" => Ok(Value::Timespan(Timespan::parse(payload_str(node)?)?)),
            "SemVer" => {
                let s = payload_str(node)?;
                let v = semver::Version::parse(s)
                    .map_err(|e| CodecError::malformed(format!("version '{s}': {e}")))?;
                Ok(Value::Version(Rc::new(v)))
            }
            "SemVerRange" => Ok(Value::VersionRange(Rc::new(VersionRange::parse(
                payload_str(node)?,
            )?))),
            "Binary" => {
                let s = payload_str(node)?;
                let bytes = B64
                    .decode(s)
                    .map_err(|e| CodecError::malformed(format!("bad base64 payload: {e}")))?;
                Ok(Value::binary(bytes))
            }
            "Regexp" => Ok(Value::Pattern(Rc::new(Pattern::new(payload_str(node)?)?))),
            "Comment" => Ok(Value::comment(payload_str(node)?)),
            "Type" => match payload(node)? {
                Json::String(name) => Ok(match self.resolver.resolve(name) {
                    Some(dtype) => Value::Type(dtype),
                    None => Value::type_ref(name),
                }),
                Json::Object(def) => Ok(Value::Type(type_from_definition(def)?)),
                other => Err(CodecError::malformed(format!(
                    "'Type' payload must be a name or a definition, got {other}"
                ))),
            },

            name => self.convert_typed(name, node),
        }
    }

    fn convert_plain_map(&mut self, node: &JsonMap<String, Json>) -> Result<Value> {
        let value = Value::map(ValueMap::with_capacity(node.len()));
        self.record(&value);
        for (k, v) in node {
            self.path.push(Step::Key(k.clone()));
            let converted = self.convert(v);
            self.path.pop();
            let Value::Map(cell) = &value else {
                unreachable!()
            };
            cell.borrow_mut().insert(Value::str(k), converted?);
        }
        Ok(value)
    }

    fn convert_typed(&mut self, name: &str, node: &JsonMap<String, Json>) -> Result<Value> {
        let Some(dtype) = self.resolver.resolve(name) else {
            if self.options.allow_unresolved {
                log::warn!("unresolved type '{name}' passed through as a plain map");
                return self.convert_plain_map(node);
            }
            return Err(CodecError::NoImplementationMapping {
                name: name.to_owned(),
            });
        };

        if dtype.string_roundtrip() {
            let value = dtype.from_string_form(payload_str(node)?)?;
            self.record(&value);
            return Ok(value);
        }
        self.construct_object(dtype, node)
    }

    fn construct_object(
        &mut self,
        dtype: TypeHandle,
        node: &JsonMap<String, Json>,
    ) -> Result<Value> {
        if dtype.object_kind().is_none() {
            return Err(CodecError::NoDerivableType {
                kind: "tagged node",
            });
        }
        let base = render(&self.path);
        let mut args = DataArguments {
            conv: self,
            dtype: dtype.clone(),
            node,
            base: base.clone(),
            index: 0,
            state: State::Unknown,
            placeholder: None,
        };
        let built = construct(&dtype, &mut args)?;
        let leftover = args.remaining();
        let state = args.state;
        let placeholder = args.placeholder.clone();
        if leftover != 0 {
            return Err(CodecError::Contract(
                "factory left declared attributes unconsumed",
            ));
        }

        let value = match (state, placeholder) {
            (State::Complete, _) => built,
            (State::Unknown, _) | (State::ReplaceAfter, None) => {
                self.by_path.insert(base, built.clone());
                built
            }
            (State::ReplaceAfter, Some(ph)) => {
                let settled = settle(&ph, built);
                if !settled.same_instance(&ph) {
                    self.by_path.insert(base, settled.clone());
                }
                settled
            }
        };
        Ok(value)
    }

    fn record(&mut self, value: &Value) {
        self.by_path.insert(render(&self.path), value.clone());
    }
}

/// Settles a placeholder against the finished instance: object contents are
/// moved into the placeholder cell in place (keeping every reference already
/// handed out valid), anything else replaces it. Returns the canonical
/// value.
fn settle(placeholder: &Value, instance: Value) -> Value {
    if placeholder.same_instance(&instance) {
        return instance;
    }
    match (placeholder, &instance) {
        (Value::Object(cell), Value::Object(src)) if cell.borrow().is_placeholder() => {
            *cell.borrow_mut() = src.borrow().clone();
            placeholder.clone()
        }
        _ => instance,
    }
}

/// [`ArgumentsSource`] over a tagged data node: converts each declared
/// attribute entry on demand, in declaration order.
struct DataArguments<'a, 'r, 'n> {
    conv: &'a mut FromDataConverter<'r>,
    dtype: TypeHandle,
    node: &'n JsonMap<String, Json>,
    base: String,
    index: usize,
    state: State,
    placeholder: Option<Value>,
}

impl DataArguments<'_, '_, '_> {
    fn attribute(&self, index: usize) -> Option<Attribute> {
        self.dtype
            .object_kind()
            .and_then(|kind| kind.attributes().get(index).cloned())
    }
}

impl ArgumentsSource for DataArguments<'_, '_, '_> {
    fn remember(&mut self, instance: Value) -> Value {
        let canonical = match self.state {
            State::Unknown => {
                self.conv.by_path.insert(self.base.clone(), instance.clone());
                instance
            }
            State::ReplaceAfter => match &self.placeholder {
                Some(ph) => {
                    let ph = ph.clone();
                    let settled = settle(&ph, instance);
                    if !settled.same_instance(&ph) {
                        self.conv
                            .by_path
                            .insert(self.base.clone(), settled.clone());
                    }
                    settled
                }
                None => instance,
            },
            State::Complete => instance,
        };
        self.state = State::Complete;
        canonical
    }

    fn next(&mut self) -> Result<Value> {
        let attr = self.attribute(self.index).ok_or(CodecError::Contract(
            "factory pulled past the declared attributes",
        ))?;
        if let State::Unknown = self.state {
            let ph = Value::object_placeholder();
            self.conv.by_path.insert(self.base.clone(), ph.clone());
            self.placeholder = Some(ph);
            self.state = State::ReplaceAfter;
        }

        let entry = self.node.get(&attr.name).ok_or_else(|| {
            CodecError::malformed(format!(
                "missing attribute '{}' of {}",
                attr.name,
                self.dtype.name()
            ))
        })?;
        self.conv.path.push(Step::Key(attr.name.clone()));
        let value = self.conv.convert(entry);
        self.conv.path.pop();
        let value = value?;

        if !attr.kind.accepts(&value) {
            return Err(CodecError::TypeAssertion {
                type_name: self.dtype.name().to_owned(),
                index: self.index,
                param: attr.name,
            });
        }
        self.index += 1;
        Ok(value)
    }

    fn remaining(&self) -> usize {
        self.dtype
            .object_kind()
            .map_or(0, |kind| kind.attributes().len())
            .saturating_sub(self.index)
    }
}

fn type_from_definition(def: &JsonMap<String, Json>) -> Result<TypeHandle> {
    let name = def
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| CodecError::malformed("type definition lacks a name"))?;
    let attrs = def
        .get("attributes")
        .and_then(Json::as_object)
        .ok_or_else(|| CodecError::malformed("type definition lacks attributes"))?;
    let mut attributes = Vec::with_capacity(attrs.len());
    for (attr_name, kind) in attrs {
        let kind = kind.as_str().ok_or_else(|| {
            CodecError::malformed(format!(
                "attribute '{attr_name}' of '{name}' must name a kind"
            ))
        })?;
        attributes.push(Attribute::new(attr_name, AttrType::parse(kind)?));
    }
    Ok(ObjectDataType::handle(name, attributes))
}

fn payload<'n>(node: &'n JsonMap<String, Json>) -> Result<&'n Json> {
    node.get("__value")
        .ok_or_else(|| CodecError::malformed("tagged node lacks '__value'"))
}

fn payload_str<'n>(node: &'n JsonMap<String, Json>) -> Result<&'n str> {
    payload(node)?
        .as_str()
        .ok_or_else(|| CodecError::malformed("tagged payload must be a string"))
}
