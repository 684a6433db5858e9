use crate::{CodecError, Result};
use std::fmt;

/// Point in time as whole seconds since the epoch plus a nanosecond part.
///
/// The canonical string form is `sec.nnnnnnnnn` (nine nanosecond digits);
/// locale-aware formatting is out of scope for this engine.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: u32,
}

/// Elapsed time as whole seconds plus a nanosecond part.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Timespan {
    pub sec: i64,
    pub nsec: u32,
}

const NANOS_PER_SEC: u32 = 1_000_000_000;

fn parse_sec_nsec(kind: &str, s: &str) -> Result<(i64, u32)> {
    let (sec_s, nsec_s) = s
        .split_once('.')
        .ok_or_else(|| CodecError::malformed(format!("{kind} '{s}' lacks a '.' separator")))?;
    let sec = sec_s
        .parse::<i64>()
        .map_err(|e| CodecError::malformed(format!("{kind} seconds '{sec_s}': {e}")))?;
    let nsec = nsec_s
        .parse::<u32>()
        .map_err(|e| CodecError::malformed(format!("{kind} nanoseconds '{nsec_s}': {e}")))?;
    if nsec >= NANOS_PER_SEC {
        return Err(CodecError::malformed(format!(
            "{kind} nanoseconds {nsec} out of range"
        )));
    }
    Ok((sec, nsec))
}

impl Timestamp {
    pub fn new(sec: i64, nsec: u32) -> Result<Self> {
        if nsec >= NANOS_PER_SEC {
            return Err(CodecError::malformed(format!(
                "timestamp nanoseconds {nsec} out of range"
            )));
        }
        Ok(Self { sec, nsec })
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (sec, nsec) = parse_sec_nsec("timestamp", s)?;
        Ok(Self { sec, nsec })
    }
}

impl Timespan {
    pub fn new(sec: i64, nsec: u32) -> Result<Self> {
        if nsec >= NANOS_PER_SEC {
            return Err(CodecError::malformed(format!(
                "timespan nanoseconds {nsec} out of range"
            )));
        }
        Ok(Self { sec, nsec })
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (sec, nsec) = parse_sec_nsec("timespan", s)?;
        Ok(Self { sec, nsec })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Compiled regular expression carried by its source text.
///
/// Equality and serialization go through the source; the compiled form is
/// only an execution convenience.
#[derive(Debug)]
pub struct Pattern {
    regex: regex::Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        let regex = regex::Regex::new(source)
            .map_err(|e| CodecError::malformed(format!("pattern '{source}': {e}")))?;
        Ok(Self { regex })
    }

    pub fn source(&self) -> &str {
        self.regex.as_str()
    }

    pub fn regex(&self) -> &regex::Regex {
        &self.regex
    }
}

/// Semantic-version requirement carried by its source text.
///
/// The range algebra itself is `semver::VersionReq`; this engine only needs
/// the string round-trip.
#[derive(Debug)]
pub struct VersionRange {
    source: String,
    req: semver::VersionReq,
}

impl VersionRange {
    pub fn parse(source: &str) -> Result<Self> {
        let req = semver::VersionReq::parse(source)
            .map_err(|e| CodecError::malformed(format!("version range '{source}': {e}")))?;
        Ok(Self {
            source: source.to_owned(),
            req,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn requirement(&self) -> &semver::VersionReq {
        &self.req
    }
}
