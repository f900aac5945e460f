//! Permissive field access for command bodies.
//!
//! Command bodies are JSON objects, parsed with `serde_json`.  Hosts in
//! the field are not always strict, so a body that fails to parse falls
//! back to a tolerant `"key": value` scanner that accepts bare tokens and
//! stray whitespace.  Either way, numeric fields accept a JSON number or a
//! string holding decimal or `0x`-prefixed hexadecimal.

use serde_json::{Map, Value};

use super::guard::{CommandId, NO_ID};

/// Parsed command body.
#[derive(Debug, Clone, Default)]
pub struct CommandFields {
    map: Map<String, Value>,
}

impl CommandFields {
    /// Parse a command body (the text after the marker).
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Map<String, Value>>(body.trim()) {
            Ok(map) => Self { map },
            Err(_) => Self {
                map: scan_fields(body),
            },
        }
    }

    /// Command id, or [`NO_ID`] when missing or unparsable.
    pub fn id(&self) -> CommandId {
        self.uint("id")
            .and_then(|v| CommandId::try_from(v).ok())
            .unwrap_or(NO_ID)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// String field.  Numbers and booleans are not coerced.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.map.get(key)?.as_str()
    }

    /// Unsigned field: JSON number, boolean, or decimal / `0x` hex string.
    pub fn uint(&self, key: &str) -> Option<u64> {
        match self.map.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => parse_uint(s),
            Value::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }

    /// Signed field: JSON number or decimal / `0x` hex string.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.map.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => parse_int(s),
            _ => None,
        }
    }
}

/// Decimal or `0x`-prefixed hexadecimal.
pub fn parse_uint(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Signed counterpart of [`parse_uint`].
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    match s.strip_prefix('-') {
        Some(rest) => parse_uint(rest)
            .and_then(|v| i64::try_from(v).ok())
            .map(|v| -v),
        None => parse_uint(s).and_then(|v| i64::try_from(v).ok()),
    }
}

// ── Fallback scanner ──────────────────────────────────────────

/// Extract `"key": value` pairs from text that is not valid JSON.
///
/// Quoted values become strings; bare tokens run until `,`, `}` or
/// whitespace and are kept as strings too, so the numeric accessors can
/// still interpret them.  The first occurrence of a key wins.
fn scan_fields(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    let mut rest = text;

    while let Some(open) = rest.find('"') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('"') else {
            break;
        };
        let key = &after_open[..close];
        let tail = after_open[close + 1..].trim_start();

        let Some(value_text) = tail.strip_prefix(':') else {
            // A quoted token that is not a key; resume after it.
            rest = &after_open[close + 1..];
            continue;
        };
        let value_text = value_text.trim_start();

        let (value, remainder) = if let Some(quoted) = value_text.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => break,
            }
        } else {
            let end = value_text
                .find(|c: char| c == ',' || c == '}' || c.is_whitespace())
                .unwrap_or(value_text.len());
            (&value_text[..end], &value_text[end..])
        };

        if !key.is_empty() && !map.contains_key(key) {
            map.insert(key.to_owned(), Value::String(value.to_owned()));
        }
        rest = remainder;
    }

    map
}
