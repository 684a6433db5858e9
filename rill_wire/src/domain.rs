//! Domain codec layer: per-kind scalar payloads over the wire codec, plus
//! the segmented qualified-name scheme.
//!
//! A qualified name travels as a segment count followed by each `::`
//! segment as an ordinary wire string, so repeated namespace prefixes
//! compress through the codec's own string tabulation.

use crate::tag::Tag;
use crate::wire::{WireItem, WireRead, WireScalar, WireWrite};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rill_types::value::{Pattern, Timespan, Timestamp, Value, VersionRange};
use rill_types::{CodecError, Result};
use std::rc::Rc;

/// Encodes one domain scalar. The caller owns tabulation; this layer only
/// shapes payloads.
pub fn encode<W: WireWrite>(w: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Binary(bytes) => {
            if w.supports_binary() {
                w.write_ext(Tag::Binary, &[WireScalar::Bytes((**bytes).clone())], 0)
            } else {
                let text = B64.encode(bytes.as_slice());
                w.write_ext(Tag::Base64, &[WireScalar::Str(text)], 0)
            }
        }
        Value::Symbol(s) => w.write_ext(Tag::Symbol, &[WireScalar::Str(s.to_string())], 0),
        Value::Comment(s) => w.write_ext(Tag::Comment, &[WireScalar::Str(s.to_string())], 0),
        Value::Pattern(p) => {
            w.write_ext(Tag::Regexp, &[WireScalar::Str(p.source().to_owned())], 0)
        }
        Value::Version(v) => w.write_ext(Tag::Version, &[WireScalar::Str(v.to_string())], 0),
        Value::VersionRange(r) => {
            w.write_ext(Tag::VersionRange, &[WireScalar::Str(r.source().to_owned())], 0)
        }
        Value::Timestamp(t) => w.write_ext(
            Tag::Time,
            &[WireScalar::Int(t.sec), WireScalar::Int(t.nsec as i64)],
            0,
        ),
        Value::Timespan(t) => w.write_ext(
            Tag::Timespan,
            &[WireScalar::Int(t.sec), WireScalar::Int(t.nsec as i64)],
            0,
        ),
        Value::Default => w.write_ext(Tag::Default, &[], 0),
        Value::TypeRef(name) => write_type_reference(w, name),
        _ => Err(CodecError::Contract("domain layer offered a non-scalar value")),
    }
}

pub fn write_type_reference<W: WireWrite>(w: &mut W, name: &str) -> Result<()> {
    let count = segment_count(name);
    w.write_ext(
        Tag::TypeReference,
        &[WireScalar::Int(count as i64)],
        count,
    )?;
    write_segments(w, name)
}

pub fn segment_count(name: &str) -> usize {
    name.split("::").count()
}

pub fn write_segments<W: WireWrite>(w: &mut W, name: &str) -> Result<()> {
    for seg in name.split("::") {
        w.write(&WireScalar::Str(seg.to_owned()))?;
    }
    Ok(())
}

pub fn read_name<R: WireRead>(r: &mut R, count: usize) -> Result<String> {
    let mut segs = Vec::with_capacity(count);
    for _ in 0..count {
        match r.read()? {
            WireItem::Scalar(WireScalar::Str(s)) => segs.push(s),
            _ => return Err(CodecError::malformed("name segment must be a string")),
        }
    }
    Ok(segs.join("::"))
}

/// Decodes the payload of a domain-scalar tag. TYPE_REFERENCE pulls its
/// segments from the stream; everything else is payload-only.
pub fn decode<R: WireRead>(r: &mut R, tag: Tag, payload: &[WireScalar]) -> Result<Value> {
    Ok(match tag {
        Tag::Binary => match payload {
            [WireScalar::Bytes(b)] => Value::binary(b.clone()),
            _ => return Err(bad_payload(tag)),
        },
        Tag::Base64 => {
            let text = payload_str(tag, payload)?;
            let bytes = B64
                .decode(text)
                .map_err(|e| CodecError::malformed(format!("bad base64 payload: {e}")))?;
            Value::binary(bytes)
        }
        Tag::Symbol => Value::symbol(payload_str(tag, payload)?),
        Tag::Comment => Value::comment(payload_str(tag, payload)?),
        Tag::Regexp => Value::Pattern(Rc::new(Pattern::new(payload_str(tag, payload)?)?)),
        Tag::Version => {
            let s = payload_str(tag, payload)?;
            let v = semver::Version::parse(s)
                .map_err(|e| CodecError::malformed(format!("version '{s}': {e}")))?;
            Value::Version(Rc::new(v))
        }
        Tag::VersionRange => {
            Value::VersionRange(Rc::new(VersionRange::parse(payload_str(tag, payload)?)?))
        }
        Tag::Time => {
            let (sec, nsec) = payload_pair(tag, payload)?;
            Value::Timestamp(Timestamp::new(sec, nsec)?)
        }
        Tag::Timespan => {
            let (sec, nsec) = payload_pair(tag, payload)?;
            Value::Timespan(Timespan::new(sec, nsec)?)
        }
        Tag::Default => Value::Default,
        Tag::TypeReference => {
            let count = match payload {
                [WireScalar::Int(n)] if *n >= 0 => *n as usize,
                _ => return Err(bad_payload(tag)),
            };
            Value::type_ref(read_name(r, count)?)
        }
        other => {
            return Err(CodecError::malformed(format!(
                "tag 0x{:02x} is not a domain scalar",
                other.code()
            )))
        }
    })
}

fn payload_str<'p>(tag: Tag, payload: &'p [WireScalar]) -> Result<&'p str> {
    match payload {
        [WireScalar::Str(s)] => Ok(s),
        _ => Err(bad_payload(tag)),
    }
}

fn payload_pair(tag: Tag, payload: &[WireScalar]) -> Result<(i64, u32)> {
    match payload {
        [WireScalar::Int(sec), WireScalar::Int(nsec)] => {
            let nsec = u32::try_from(*nsec).map_err(|_| bad_payload(tag))?;
            Ok((*sec, nsec))
        }
        _ => Err(bad_payload(tag)),
    }
}

fn bad_payload(tag: Tag) -> CodecError {
    CodecError::malformed(format!("bad payload for tag 0x{:02x}", tag.code()))
}
