//! Conversion of value graphs into plain JSON-compatible trees.
//!
//! Rich mode embeds type tags through the reserved `"__type"`/`"__value"`
//! keys; with rich mode off every untranslatable value degrades to its
//! string form with a warning instead of failing. Shared composites are
//! replaced by `LocalRef` nodes carrying the canonical path of their first
//! occurrence; with local referencing off a shared substructure is simply
//! duplicated, and a genuine cycle is a hard error.

use crate::path::{render, Step};
use crate::DEFAULT_MAX_DEPTH;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rill_types::types::{is_reserved_name, ObjectKind, TypeHandle};
use rill_types::value::{Value, ValueId, ValueMap};
use rill_types::{CodecError, Result};
use serde_json::{json, Map as JsonMap, Value as Json};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug)]
pub struct ToDataOptions {
    /// Embed type tags; off means best-effort plain data with degradations.
    pub rich_data: bool,
    /// Emit `LocalRef` nodes for already-converted composites.
    pub local_reference: bool,
    /// Carry symbols as bare strings instead of tagged nodes.
    pub symbol_as_string: bool,
    /// Carry non-reserved types by name instead of structural definition.
    pub type_by_reference: bool,
}

impl Default for ToDataOptions {
    fn default() -> Self {
        Self {
            rich_data: true,
            local_reference: true,
            symbol_as_string: false,
            type_by_reference: true,
        }
    }
}

pub fn to_data(value: &Value) -> Result<Json> {
    to_data_with(value, ToDataOptions::default())
}

pub fn to_data_with(value: &Value, options: ToDataOptions) -> Result<Json> {
    let mut conv = ToDataConverter {
        options,
        visited: HashMap::new(),
        on_stack: HashSet::new(),
        path: vec![],
        max_depth: DEFAULT_MAX_DEPTH,
    };
    conv.convert(value)
}

struct ToDataConverter {
    options: ToDataOptions,
    /// Identity of every composite already converted, by first-occurrence
    /// path.
    visited: HashMap<ValueId, String>,
    /// Composites currently being converted, for cycle detection when local
    /// referencing is off.
    on_stack: HashSet<ValueId>,
    path: Vec<Step>,
    max_depth: usize,
}

impl ToDataConverter {
    fn convert(&mut self, value: &Value) -> Result<Json> {
        if self.path.len() >= self.max_depth {
            return Err(CodecError::RecursionLimit {
                limit: self.max_depth,
            });
        }
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => Ok(Json::from(*i)),
            Value::Float(x) => Ok(match serde_json::Number::from_f64(*x) {
                Some(n) => Json::Number(n),
                None => {
                    log::warn!("non-finite float {x} degraded to its string form");
                    Json::from(x.to_string())
                }
            }),
            Value::Str(s) => Ok(Json::from(&**s)),

            Value::Symbol(s) => Ok(if self.options.symbol_as_string {
                Json::from(&**s)
            } else if self.options.rich_data {
                tagged("Symbol", Json::from(&**s))
            } else {
                log::warn!("symbol :{s} degraded to a plain string");
                Json::from(&**s)
            }),
            Value::Default => Ok(if self.options.rich_data {
                let mut node = JsonMap::new();
                node.insert(String::from("__type"), Json::from("Default"));
                Json::Object(node)
            } else {
                log::warn!("default marker degraded to a plain string");
                Json::from("default")
            }),

            Value::Binary(bytes) => self.scalar("Binary", B64.encode(bytes.as_slice())),
            Value::Comment(s) => self.scalar("Comment", s.to_string()),
            Value::Pattern(p) => self.scalar("Regexp", p.source().to_owned()),
            Value::Version(v) => self.scalar("SemVer", v.to_string()),
            Value::VersionRange(r) => self.scalar("SemVerRange", r.source().to_owned()),
            Value::Timestamp(t) => self.scalar("Timestamp", t.to_string()),
            Value::Timespan(t) => self.scalar("Timespan", t.to_string()),

            Value::TypeRef(name) => self.scalar("Type", name.to_string()),
            Value::Type(dtype) => {
                if self.options.rich_data {
                    Ok(tagged("Type", self.type_tag(dtype)?))
                } else {
                    log::warn!("type {} degraded to its name", dtype.name());
                    Ok(Json::from(dtype.name()))
                }
            }

            Value::Seq(_) | Value::Map(_) | Value::Sensitive(_) | Value::Object(_) => {
                self.composite(value)
            }
        }
    }

    fn scalar(&self, kind: &str, string_form: String) -> Result<Json> {
        Ok(if self.options.rich_data {
            tagged(kind, Json::from(string_form))
        } else {
            log::warn!("{kind} value degraded to its string form");
            Json::from(string_form)
        })
    }

    fn composite(&mut self, value: &Value) -> Result<Json> {
        let id = value.identity().ok_or(CodecError::Contract(
            "composite value without an identity",
        ))?;

        if let Some(first_path) = self.visited.get(&id) {
            if self.options.rich_data && self.options.local_reference {
                return Ok(tagged("LocalRef", Json::from(first_path.as_str())));
            }
            if self.on_stack.contains(&id) {
                return Err(CodecError::EndlessRecursion {
                    path: render(&self.path),
                });
            }
            // A shared but acyclic substructure is duplicated.
        } else {
            self.visited.insert(id, render(&self.path));
        }

        self.on_stack.insert(id);
        let res = match value {
            Value::Seq(elems) => {
                let elems = elems.borrow();
                let mut out = Vec::with_capacity(elems.len());
                for (i, e) in elems.iter().enumerate() {
                    self.path.push(Step::Index(i));
                    let node = self.convert(e);
                    self.path.pop();
                    out.push(node?);
                }
                Ok(Json::Array(out))
            }
            Value::Map(map) => self.convert_map(&map.borrow()),
            Value::Sensitive(inner) => {
                if !self.options.rich_data {
                    log::warn!("sensitive value redacted in non-rich data");
                    Ok(Json::from(value.to_string()))
                } else {
                    self.path.push(Step::Key(String::from("__value")));
                    let node = self.convert(&inner.borrow());
                    self.path.pop();
                    Ok(tagged("Sensitive", node?))
                }
            }
            Value::Object(_) => self.convert_object(value),
            _ => unreachable!(),
        };
        self.on_stack.remove(&id);
        res
    }

    fn convert_map(&mut self, map: &ValueMap) -> Result<Json> {
        // A literal "__type" key would masquerade as a tagged node, so such
        // maps take the Hash form along with non-string-keyed ones.
        let plain = map.string_keyed() && map.get_str("__type").is_none();

        if plain {
            let mut out = JsonMap::with_capacity(map.len());
            for (k, v) in map.iter() {
                let Value::Str(key) = k else { unreachable!() };
                self.path.push(Step::Key(key.to_string()));
                let node = self.convert(v);
                self.path.pop();
                out.insert(key.to_string(), node?);
            }
            return Ok(Json::Object(out));
        }

        if !self.options.rich_data {
            log::warn!("map keys stringified in non-rich data");
            let mut out = JsonMap::with_capacity(map.len());
            for (k, v) in map.iter() {
                let key = k.to_string();
                self.path.push(Step::Key(key.clone()));
                let node = self.convert(v);
                self.path.pop();
                out.insert(key, node?);
            }
            return Ok(Json::Object(out));
        }

        let mut flat = Vec::with_capacity(map.len() * 2);
        for (i, (k, v)) in map.iter().enumerate() {
            self.path.push(Step::Key(String::from("__value")));
            self.path.push(Step::Index(i * 2));
            let key_node = self.convert(k);
            self.path.pop();
            self.path.push(Step::Index(i * 2 + 1));
            let val_node = self.convert(v);
            self.path.pop();
            self.path.pop();
            flat.push(key_node?);
            flat.push(val_node?);
        }
        Ok(tagged("Hash", Json::Array(flat)))
    }

    fn convert_object(&mut self, value: &Value) -> Result<Json> {
        let Value::Object(cell) = value else {
            unreachable!()
        };
        let dtype = cell.borrow().dtype.clone().ok_or(CodecError::Contract(
            "cannot convert an object still under construction",
        ))?;

        if !self.options.rich_data {
            log::warn!(
                "instance of {} degraded to its string form",
                dtype.name()
            );
            return Ok(Json::from(value.to_string()));
        }

        if dtype.string_roundtrip() {
            let s = dtype
                .to_string_form(value)
                .ok_or(CodecError::Contract("type promised a string form"))?;
            return Ok(tagged(dtype.name(), Json::from(s)));
        }

        let kind = dtype.object_kind().ok_or(CodecError::NoDerivableType {
            kind: value.kind_name(),
        })?;
        let attrs = kind.attribute_values(value)?;

        let mut node = JsonMap::with_capacity(attrs.len() + 1);
        node.insert(String::from("__type"), self.type_tag(&dtype)?);
        for (attr, attr_value) in kind.attributes().iter().zip(&attrs) {
            self.path.push(Step::Key(attr.name.clone()));
            let converted = self.convert(attr_value);
            self.path.pop();
            node.insert(attr.name.clone(), converted?);
        }
        Ok(Json::Object(node))
    }

    /// What goes under `"__type"`: the bare name, or the structural
    /// definition when names alone would not let a peer reconstruct.
    fn type_tag(&self, dtype: &TypeHandle) -> Result<Json> {
        if self.options.type_by_reference || is_reserved_name(dtype.name()) {
            return Ok(Json::from(dtype.name()));
        }
        let kind = dtype.object_kind().ok_or(CodecError::NoDerivableType {
            kind: "Type",
        })?;
        let mut attributes = JsonMap::with_capacity(kind.attributes().len());
        for attr in kind.attributes() {
            attributes.insert(attr.name.clone(), Json::from(attr.kind.as_str()));
        }
        Ok(json!({ "name": dtype.name(), "attributes": attributes }))
    }
}

fn tagged(tag: &str, value: Json) -> Json {
    let mut node = JsonMap::with_capacity(2);
    node.insert(String::from("__type"), Json::from(tag));
    node.insert(String::from("__value"), value);
    Json::Object(node)
}
