//! Text codec: one JSON document.
//!
//! Extensions are framed as a nested array whose first element is the
//! numeric tag, followed by the payload scalars, followed by the children:
//!
//! ```text
//! [16, 2, "a", "b"]            // ARRAY_START(2) with two string elements
//! [17, 1, "k", [16, 0]]        // MAP_START(1): "k" => []
//! [0, 3]                       // INNER_TABULATION of string index 3
//! ```
//!
//! A payload length is itself data (an object's attribute count), so the
//! writer keeps a depth-tracking stack of open frames, each counting the
//! children still pending; a frame closes when its count reaches zero. The
//! reader mirrors this with a cursor stack over the parsed document.
//!
//! There is no native binary scalar (`supports_binary() == false`); the
//! domain layer substitutes base64 text. Non-finite floats are not
//! representable and fail as malformed.

use crate::tag::Tag;
use crate::wire::{ReadStrTable, WireItem, WireRead, WireScalar, WireWrite, WriteStrTable};
use rill_types::{CodecError, Result};
use serde_json::Value as Json;

pub struct TextWriter {
    strs: WriteStrTable,
    root: Vec<Json>,
    stack: Vec<Frame>,
}

struct Frame {
    arr: Vec<Json>,
    pending: usize,
}

impl TextWriter {
    pub fn new() -> Self {
        Self {
            strs: WriteStrTable::default(),
            root: vec![],
            stack: vec![],
        }
    }

    /// Closes the document, yielding its JSON text. Fails if an extension
    /// frame is still open or the document does not hold exactly one value.
    pub fn finish(self) -> Result<String> {
        if !self.stack.is_empty() {
            return Err(CodecError::Contract("unclosed extension frame"));
        }
        let [root] = <[Json; 1]>::try_from(self.root)
            .map_err(|_| CodecError::Contract("document must hold exactly one root value"))?;
        serde_json::to_string(&root).map_err(|e| CodecError::malformed(format!("json: {e}")))
    }

    fn scalar_to_json(&mut self, s: &WireScalar) -> Result<Json> {
        Ok(match s {
            WireScalar::Null => Json::Null,
            WireScalar::Bool(b) => Json::Bool(*b),
            WireScalar::Int(i) => Json::from(*i),
            WireScalar::Float(x) => serde_json::Number::from_f64(*x)
                .map(Json::Number)
                .ok_or_else(|| CodecError::malformed(format!("non-finite float {x}")))?,
            WireScalar::Str(s) => match self.strs.offer(s) {
                Some(idx) => Json::from(vec![
                    Json::from(Tag::InnerTabulation.code()),
                    Json::from(*idx),
                ]),
                None => Json::from(s.as_str()),
            },
            WireScalar::Bytes(_) => {
                return Err(CodecError::Contract(
                    "raw binary offered to a codec without binary support",
                ))
            }
        })
    }

    fn push_item(&mut self, item: Json) {
        let mut item = item;
        loop {
            match self.stack.last_mut() {
                None => {
                    self.root.push(item);
                    return;
                }
                Some(top) => {
                    top.arr.push(item);
                    top.pending -= 1;
                    if top.pending > 0 {
                        return;
                    }
                    let done = self.stack.pop().unwrap();
                    item = Json::Array(done.arr);
                }
            }
        }
    }
}

impl Default for TextWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WireWrite for TextWriter {
    fn write(&mut self, scalar: &WireScalar) -> Result<()> {
        let j = self.scalar_to_json(scalar)?;
        self.push_item(j);
        Ok(())
    }

    fn write_ext(
        &mut self,
        tag: Tag,
        payload: &[WireScalar],
        pending_children: usize,
    ) -> Result<()> {
        let mut arr = vec![Json::from(tag.code())];
        for p in payload {
            let j = self.scalar_to_json(p)?;
            arr.push(j);
        }
        if pending_children == 0 {
            self.push_item(Json::Array(arr));
        } else {
            self.stack.push(Frame {
                arr,
                pending: pending_children,
            });
        }
        Ok(())
    }

    fn supports_binary(&self) -> bool {
        false
    }
}

pub struct TextReader {
    strs: ReadStrTable,
    stack: Vec<std::vec::IntoIter<Json>>,
}

impl TextReader {
    pub fn new(document: &str) -> Result<Self> {
        let doc: Json = serde_json::from_str(document)
            .map_err(|e| CodecError::malformed(format!("invalid json document: {e}")))?;
        Ok(Self {
            strs: ReadStrTable::default(),
            stack: vec![vec![doc].into_iter()],
        })
    }

    fn next_node(&mut self) -> Result<Json> {
        loop {
            let top = self
                .stack
                .last_mut()
                .ok_or_else(|| CodecError::malformed("short input"))?;
            match top.next() {
                Some(node) => return Ok(node),
                None => {
                    self.stack.pop();
                }
            }
        }
    }

    fn scalar_from(&mut self, node: Json) -> Result<WireScalar> {
        Ok(match node {
            Json::Null => WireScalar::Null,
            Json::Bool(b) => WireScalar::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => WireScalar::Int(i),
                None => WireScalar::Float(n.as_f64().ok_or_else(|| {
                    CodecError::malformed(format!("unrepresentable number {n}"))
                })?),
            },
            Json::String(s) => {
                self.strs.record(&s);
                WireScalar::Str(s)
            }
            Json::Array(elems) => {
                // Only an INNER_TABULATION form may stand in scalar position.
                match elems.as_slice() {
                    [tag, idx]
                        if tag.as_u64() == Some(Tag::InnerTabulation.code() as u64) =>
                    {
                        let idx = idx.as_i64().ok_or_else(|| {
                            CodecError::malformed("bad string back-reference payload")
                        })?;
                        WireScalar::Str(self.strs.resolve(idx)?)
                    }
                    _ => {
                        return Err(CodecError::malformed(
                            "unexpected extension in scalar position",
                        ))
                    }
                }
            }
            Json::Object(_) => {
                return Err(CodecError::malformed(
                    "unexpected json object in wire document",
                ))
            }
        })
    }
}

impl WireRead for TextReader {
    fn read(&mut self) -> Result<WireItem> {
        let node = self.next_node()?;
        let Json::Array(elems) = node else {
            return Ok(WireItem::Scalar(self.scalar_from(node)?));
        };

        let mut it = elems.into_iter();
        let code = it
            .next()
            .and_then(|t| t.as_u64())
            .ok_or_else(|| CodecError::malformed("extension array lacks a numeric tag"))?;
        let code = u8::try_from(code)
            .map_err(|_| CodecError::malformed(format!("extension tag {code} out of range")))?;
        let tag = Tag::try_from(code)?;

        if tag == Tag::InnerTabulation {
            let idx = it
                .next()
                .and_then(|n| n.as_i64())
                .ok_or_else(|| CodecError::malformed("bad string back-reference payload"))?;
            return Ok(WireItem::Scalar(WireScalar::Str(self.strs.resolve(idx)?)));
        }

        let mut payload = Vec::with_capacity(tag.payload_arity());
        for _ in 0..tag.payload_arity() {
            let node = it
                .next()
                .ok_or_else(|| CodecError::malformed("truncated extension payload"))?;
            payload.push(self.scalar_from(node)?);
        }
        if it.len() > 0 {
            self.stack.push(it);
        }
        Ok(WireItem::Ext { tag, payload })
    }

    fn supports_binary(&self) -> bool {
        false
    }
}
