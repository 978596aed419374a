//! Tolerant line parser and canonical JSON line writer.
//!
//! # Responsibility
//! - Parse one persisted line as strict JSON, falling back to the legacy
//!   bare grammar `{ id: <value>, x: <number>, y: <number> }` for records.
//! - Coerce loosely typed JSON values into tokens, ids and coordinates.
//! - Write one compact JSON value per line.
//!
//! # Invariants
//! - Blank lines are ignored; unparseable lines become `LineDiagnostic`s.
//! - Written numbers are integers when integral within `1e-9`, otherwise
//!   rounded to three decimals.

use crate::model::token::{normalize_token, Token, TokenError};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};

const INTEGRAL_TOLERANCE: f64 = 1e-9;
const MAX_REASON_CHARS: usize = 200;

static BARE_RECORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*\{\s*id\s*:\s*(?P<id>"[^"]*"|'[^']*'|[^,}]+)\s*,\s*x\s*:\s*(?P<x>-?\d+(?:\.\d+)?)\s*,\s*y\s*:\s*(?P<y>-?\d+(?:\.\d+)?)\s*\}\s*$"#,
    )
    .expect("valid bare record regex")
});

/// Why a single line was rejected.
#[derive(Debug)]
pub enum CodecError {
    /// Not JSON, and not the bare record grammar either.
    Json(serde_json::Error),
    /// Valid JSON but not an object.
    NotAnObject,
    /// Valid JSON but not a two-element array.
    NotAPair,
    /// Record object lacks `id`, `x` or `y`.
    MissingField(&'static str),
    /// Field present but unusable for this record kind.
    InvalidField { field: &'static str, value: String },
    /// Endpoint or pair normalization failed.
    Token(TokenError),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "{err}"),
            Self::NotAnObject => write!(f, "record is not an object"),
            Self::NotAPair => write!(f, "connection must be a JSON array with two ids"),
            Self::MissingField(field) => write!(f, "missing field `{field}`"),
            Self::InvalidField { field, value } => {
                write!(f, "invalid value {value} for field `{field}`")
            }
            Self::Token(err) => write!(f, "invalid connection endpoints: {err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Token(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TokenError> for CodecError {
    fn from(value: TokenError) -> Self {
        Self::Token(value)
    }
}

/// A skipped line, reported to the caller and logged at `warn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiagnostic {
    /// Source label, usually the file name.
    pub source: String,
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

impl Display for LineDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "skipping invalid line in {}:{}: {}",
            self.source, self.line, self.reason
        )
    }
}

/// Loosely typed marker record as found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: Value,
    pub x: Value,
    pub y: Value,
    pub adjacent_squares: Value,
    pub adjacent_circles: Value,
}

/// Parses one marker record line.
pub fn parse_record_line(line: &str) -> Result<RawRecord, CodecError> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => record_from_object(map),
        Ok(_) => Err(CodecError::NotAnObject),
        Err(json_err) => parse_bare_record(line).ok_or(CodecError::Json(json_err)),
    }
}

/// Parses one connection line into its two raw endpoints.
pub fn parse_connection_line(line: &str) -> Result<(Value, Value), CodecError> {
    match serde_json::from_str::<Value>(line).map_err(CodecError::Json)? {
        Value::Array(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            match (items.next(), items.next()) {
                (Some(a), Some(b)) => Ok((a, b)),
                _ => Err(CodecError::NotAPair),
            }
        }
        _ => Err(CodecError::NotAPair),
    }
}

/// Reads every non-blank line through `parse`, collecting skipped lines.
pub fn read_lines<R, T, F>(
    source: &str,
    mut reader: R,
    mut parse: F,
) -> std::io::Result<(Vec<T>, Vec<LineDiagnostic>)>
where
    R: BufRead,
    F: FnMut(&str) -> Result<T, CodecError>,
{
    let mut items = Vec::new();
    let mut diagnostics = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let outcome = match std::str::from_utf8(&buf) {
            Ok(text) => {
                let line = text.trim();
                if line.is_empty() {
                    continue;
                }
                parse(line).map(|item| items.push(item)).map_err(|err| err.to_string())
            }
            // Invalid UTF-8 is one bad line, not a bad file.
            Err(err) => Err(format!("line is not valid UTF-8: {err}")),
        };

        if let Err(reason) = outcome {
            let diagnostic = LineDiagnostic {
                source: source.to_string(),
                line: line_no,
                reason: crate::logging::single_line(&reason, MAX_REASON_CHARS),
            };
            warn!(
                "event=line_skipped module=codec status=skipped source={} line={} reason={}",
                diagnostic.source, diagnostic.line, diagnostic.reason
            );
            diagnostics.push(diagnostic);
        }
    }

    Ok((items, diagnostics))
}

/// Writes each value as one compact JSON line.
pub fn write_lines<W, T, I>(mut writer: W, values: I) -> std::io::Result<()>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    for value in values {
        serde_json::to_writer(&mut writer, &value)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Canonical JSON number for a coordinate.
pub fn json_number(value: f64) -> Value {
    let rounded = value.round();
    if (value - rounded).abs() <= INTEGRAL_TOLERANCE && rounded.abs() < i64::MAX as f64 {
        return Value::from(rounded as i64);
    }
    Number::from_f64((value * 1000.0).round() / 1000.0)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Token from a JSON string or integer.
pub fn value_to_token(value: &Value) -> Result<Token, TokenError> {
    match value {
        Value::String(text) => normalize_token(text),
        Value::Number(number) => match number.as_i64() {
            Some(id) => Ok(Token::circle(id)),
            None => normalize_token(&number.to_string()),
        },
        other => Err(TokenError::NotAToken(other.to_string())),
    }
}

/// Coordinate from a JSON number or numeric string.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Circle id from an integer, a float (truncated) or a numeric string.
pub fn value_to_circle_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite() && float.abs() < i64::MAX as f64)
                .map(|float| float.trunc() as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Valid square tokens from a list-shaped value, deduplicated in order.
///
/// Anything that is not a list yields an empty vector.
pub fn normalize_square_list(value: &Value) -> Vec<Token> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    let mut squares: Vec<Token> = Vec::new();
    for item in items {
        let Value::String(text) = item else {
            continue;
        };
        if let Ok(token) = Token::square(text) {
            if !squares.contains(&token) {
                squares.push(token);
            }
        }
    }
    squares
}

/// Valid circle ids from a list-shaped value, deduplicated in order.
pub fn normalize_circle_list(value: &Value) -> Vec<i64> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    let mut circles: Vec<i64> = Vec::new();
    for id in items.iter().filter_map(value_to_circle_id) {
        if !circles.contains(&id) {
            circles.push(id);
        }
    }
    circles
}

fn record_from_object(mut map: Map<String, Value>) -> Result<RawRecord, CodecError> {
    let id = map.remove("id").ok_or(CodecError::MissingField("id"))?;
    let x = map.remove("x").ok_or(CodecError::MissingField("x"))?;
    let y = map.remove("y").ok_or(CodecError::MissingField("y"))?;
    Ok(RawRecord {
        id,
        x,
        y,
        adjacent_squares: map
            .remove("adjacentSquares")
            .unwrap_or_else(|| Value::Array(Vec::new())),
        adjacent_circles: map
            .remove("adjacentCircles")
            .unwrap_or_else(|| Value::Array(Vec::new())),
    })
}

fn parse_bare_record(line: &str) -> Option<RawRecord> {
    let captures = BARE_RECORD_RE.captures(line)?;
    let raw_id = captures.name("id")?.as_str().trim();
    let x: f64 = captures.name("x")?.as_str().parse().ok()?;
    let y: f64 = captures.name("y")?.as_str().parse().ok()?;

    Some(RawRecord {
        id: bare_id_value(raw_id),
        x: Value::Number(Number::from_f64(x)?),
        y: Value::Number(Number::from_f64(y)?),
        adjacent_squares: Value::Array(Vec::new()),
        adjacent_circles: Value::Array(Vec::new()),
    })
}

fn bare_id_value(raw_id: &str) -> Value {
    let quoted = raw_id.len() >= 2
        && ((raw_id.starts_with('"') && raw_id.ends_with('"'))
            || (raw_id.starts_with('\'') && raw_id.ends_with('\'')));
    if quoted {
        return Value::String(raw_id[1..raw_id.len() - 1].to_string());
    }
    match raw_id.parse::<i64>() {
        Ok(id) => Value::from(id),
        Err(_) => Value::String(raw_id.to_string()),
    }
}
