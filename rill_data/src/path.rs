//! Canonical paths into a data tree, `$['key'][0]` form.
//!
//! Local references store these strings, so rendering must be canonical:
//! one quoting scheme (`\'` and `\\` escapes inside keys), no whitespace.

use rill_types::{CodecError, Result};
use std::fmt::Write as _;

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Step {
    Key(String),
    Index(usize),
}

pub fn render(steps: &[Step]) -> String {
    let mut out = String::from("$");
    for step in steps {
        match step {
            Step::Index(i) => {
                let _ = write!(out, "[{i}]");
            }
            Step::Key(k) => {
                out.push_str("['");
                for c in k.chars() {
                    match c {
                        '\'' | '\\' => {
                            out.push('\\');
                            out.push(c);
                        }
                        _ => out.push(c),
                    }
                }
                out.push_str("']");
            }
        }
    }
    out
}

pub fn parse(path: &str) -> Result<Vec<Step>> {
    let bad = |detail: &str| CodecError::malformed(format!("bad path '{path}': {detail}"));

    let mut chars = path.chars().peekable();
    if chars.next() != Some('$') {
        return Err(bad("must start with '$'"));
    }
    let mut steps = vec![];
    while let Some(c) = chars.next() {
        if c != '[' {
            return Err(bad("expected '['"));
        }
        match chars.peek() {
            Some('\'') => {
                chars.next();
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(esc @ ('\'' | '\\')) => key.push(esc),
                            _ => return Err(bad("bad escape in key")),
                        },
                        Some('\'') => break,
                        Some(c) => key.push(c),
                        None => return Err(bad("unterminated key")),
                    }
                }
                if chars.next() != Some(']') {
                    return Err(bad("expected ']' after key"));
                }
                steps.push(Step::Key(key));
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    chars.next();
                    digits.push(d);
                }
                if chars.next() != Some(']') {
                    return Err(bad("expected ']' after index"));
                }
                let idx = digits
                    .parse::<usize>()
                    .map_err(|_| bad("index out of range"))?;
                steps.push(Step::Index(idx));
            }
            _ => return Err(bad("expected a key or an index")),
        }
    }
    Ok(steps)
}
