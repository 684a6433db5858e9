//! Binary codec: little-endian, kind-marker framed.
//!
//! ```text
//! item := kind: u8, body
//!   kind 0 (null)   body: -
//!   kind 1 (false)  body: -
//!   kind 2 (true)   body: -
//!   kind 3 (int)    body: [u8; 8]  (i64, LE)
//!   kind 4 (float)  body: [u8; 8]  (f64, LE)
//!   kind 5 (str)    body: len: u32, utf8: [u8; len]
//!   kind 6 (bytes)  body: len: u32, raw:  [u8; len]
//!   kind 7 (ext)    body: tag: u8, payload_len: u32, payload: [u8; payload_len]
//! ```
//!
//! An extension's payload is itself a run of items; its children follow as
//! ordinary stream items after the frame. A repeated string anywhere is
//! replaced by an INNER_TABULATION extension carrying the string's index.

use crate::tag::Tag;
use crate::wire::{ReadStrTable, WireItem, WireRead, WireScalar, WireWrite, WriteStrTable};
use rill_types::{CodecError, Result};
use std::io::{ErrorKind, Read, Write};
use std::mem;

const K_NULL: u8 = 0;
const K_FALSE: u8 = 1;
const K_TRUE: u8 = 2;
const K_INT: u8 = 3;
const K_FLOAT: u8 = 4;
const K_STR: u8 = 5;
const K_BYTES: u8 = 6;
const K_EXT: u8 = 7;

pub struct BinaryWriter<W: Write> {
    w: W,
    strs: WriteStrTable,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            strs: WriteStrTable::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Write> WireWrite for BinaryWriter<W> {
    fn write(&mut self, scalar: &WireScalar) -> Result<()> {
        put_scalar(&mut self.w, &mut self.strs, scalar)
    }

    fn write_ext(
        &mut self,
        tag: Tag,
        payload: &[WireScalar],
        _pending_children: usize,
    ) -> Result<()> {
        put_ext(&mut self.w, &mut self.strs, tag, payload)
    }

    fn supports_binary(&self) -> bool {
        true
    }
}

fn put_len<W: Write>(w: &mut W, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::malformed(format!("length {len} exceeds u32")))?;
    w.write_all(&len.to_le_bytes())?;
    Ok(())
}

fn put_scalar<W: Write>(w: &mut W, strs: &mut WriteStrTable, s: &WireScalar) -> Result<()> {
    match s {
        WireScalar::Null => w.write_all(&[K_NULL])?,
        WireScalar::Bool(false) => w.write_all(&[K_FALSE])?,
        WireScalar::Bool(true) => w.write_all(&[K_TRUE])?,
        WireScalar::Int(i) => {
            w.write_all(&[K_INT])?;
            w.write_all(&i.to_le_bytes())?;
        }
        WireScalar::Float(x) => {
            w.write_all(&[K_FLOAT])?;
            w.write_all(&x.to_le_bytes())?;
        }
        WireScalar::Str(s) => match strs.offer(s) {
            Some(idx) => put_ext(
                w,
                strs,
                Tag::InnerTabulation,
                &[WireScalar::Int(*idx as i64)],
            )?,
            None => {
                w.write_all(&[K_STR])?;
                put_len(w, s.len())?;
                w.write_all(s.as_bytes())?;
            }
        },
        WireScalar::Bytes(b) => {
            w.write_all(&[K_BYTES])?;
            put_len(w, b.len())?;
            w.write_all(b)?;
        }
    }
    Ok(())
}

fn put_ext<W: Write>(
    w: &mut W,
    strs: &mut WriteStrTable,
    tag: Tag,
    payload: &[WireScalar],
) -> Result<()> {
    let mut body: Vec<u8> = vec![];
    for p in payload {
        put_scalar(&mut body, strs, p)?;
    }
    w.write_all(&[K_EXT, tag.code()])?;
    put_len(w, body.len())?;
    w.write_all(&body)?;
    Ok(())
}

pub struct BinaryReader<R: Read> {
    r: R,
    strs: ReadStrTable,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(r: R) -> Self {
        Self {
            r,
            strs: ReadStrTable::default(),
        }
    }
}

impl<R: Read> WireRead for BinaryReader<R> {
    fn read(&mut self) -> Result<WireItem> {
        get_item(&mut self.r, &mut self.strs)
    }

    fn supports_binary(&self) -> bool {
        true
    }
}

fn get_exact<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            CodecError::malformed("short input")
        } else {
            CodecError::Io(e)
        }
    })?;
    Ok(buf)
}

fn get_len_prefixed<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = u32::from_le_bytes(get_exact::<_, { mem::size_of::<u32>() }>(r)?);
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            CodecError::malformed("short input")
        } else {
            CodecError::Io(e)
        }
    })?;
    Ok(buf)
}

fn get_item<R: Read>(r: &mut R, strs: &mut ReadStrTable) -> Result<WireItem> {
    let [kind] = get_exact::<_, 1>(r)?;
    let item = match kind {
        K_NULL => WireItem::Scalar(WireScalar::Null),
        K_FALSE => WireItem::Scalar(WireScalar::Bool(false)),
        K_TRUE => WireItem::Scalar(WireScalar::Bool(true)),
        K_INT => WireItem::Scalar(WireScalar::Int(i64::from_le_bytes(get_exact::<_, 8>(r)?))),
        K_FLOAT => WireItem::Scalar(WireScalar::Float(f64::from_le_bytes(get_exact::<_, 8>(r)?))),
        K_STR => {
            let body = get_len_prefixed(r)?;
            let s = String::from_utf8(body)
                .map_err(|e| CodecError::malformed(format!("invalid utf8 string: {e}")))?;
            strs.record(&s);
            WireItem::Scalar(WireScalar::Str(s))
        }
        K_BYTES => WireItem::Scalar(WireScalar::Bytes(get_len_prefixed(r)?)),
        K_EXT => {
            let [code] = get_exact::<_, 1>(r)?;
            let tag = Tag::try_from(code)?;
            let body = get_len_prefixed(r)?;
            let mut cur = &body[..];
            let mut payload = vec![];
            while !cur.is_empty() {
                match get_item(&mut cur, strs)? {
                    WireItem::Scalar(s) => payload.push(s),
                    WireItem::Ext { tag, .. } => {
                        return Err(CodecError::malformed(format!(
                            "extension 0x{:02x} nested inside a payload",
                            tag.code()
                        )))
                    }
                }
            }
            if tag == Tag::InnerTabulation {
                let idx = match payload.as_slice() {
                    [WireScalar::Int(idx)] => *idx,
                    _ => return Err(CodecError::malformed("bad string back-reference payload")),
                };
                WireItem::Scalar(WireScalar::Str(strs.resolve(idx)?))
            } else {
                WireItem::Ext { tag, payload }
            }
        }
        other => {
            return Err(CodecError::malformed(format!(
                "unknown wire marker {other}"
            )))
        }
    };
    Ok(item)
}
