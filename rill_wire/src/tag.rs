use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use rill_types::CodecError;

/// Extension tag table. The codes are the wire contract and must never be
/// renumbered; the gaps between ranges partition the value space
/// (back-references, structural headers, special markers, domain scalars).
#[repr(u8)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, FromPrimitive, ToPrimitive, Debug)]
pub enum Tag {
    /// Back-reference managed by the wire codec itself (repeated strings).
    InnerTabulation = 0x00,
    /// Back-reference managed by the object-graph layer.
    Tabulation = 0x01,

    ArrayStart = 0x10,
    MapStart = 0x11,
    ObjectStart = 0x12,
    SensitiveStart = 0x13,

    Default = 0x20,
    Comment = 0x21,

    Regexp = 0x30,
    TypeReference = 0x31,
    Symbol = 0x32,
    Time = 0x33,
    Timespan = 0x34,
    Version = 0x35,
    VersionRange = 0x36,
    Binary = 0x37,
    Base64 = 0x38,
}

impl TryFrom<u8> for Tag {
    type Error = CodecError;
    fn try_from(code: u8) -> Result<Self, CodecError> {
        Tag::from_u8(code).ok_or(CodecError::InvalidExtension { tag: code })
    }
}

impl Tag {
    pub fn code(self) -> u8 {
        self.to_u8().unwrap()
    }

    /// How many scalars make up this tag's payload. Fixed per tag; the text
    /// codec needs it to split an extension array into payload and children.
    pub fn payload_arity(self) -> usize {
        match self {
            Tag::InnerTabulation => 1,
            Tag::Tabulation => 1,
            Tag::ArrayStart => 1,
            Tag::MapStart => 1,
            Tag::ObjectStart => 2,
            Tag::SensitiveStart => 0,
            Tag::Default => 0,
            Tag::Comment => 1,
            Tag::Regexp => 1,
            Tag::TypeReference => 1,
            Tag::Symbol => 1,
            Tag::Time => 2,
            Tag::Timespan => 2,
            Tag::Version => 1,
            Tag::VersionRange => 1,
            Tag::Binary => 1,
            Tag::Base64 => 1,
        }
    }
}
