//! Circle and square marker lists.
//!
//! # Responsibility
//! - Hold both marker lists in stable, index-addressable order.
//! - Load/save the lists as line-delimited JSON records.
//! - Allocate unused square ids.
//!
//! # Invariants
//! - Every marker in `circles` is a circle and every marker in `squares` is a square.
//! - Loaded circles never carry adjacent circles.
//! - Circle ids may repeat; lookups by token can therefore match several markers.

use crate::model::marker::{Marker, MarkerKind};
use crate::model::token::{Token, SQUARE_LETTERS};
use crate::repo::codec::{
    json_number, normalize_circle_list, normalize_square_list, parse_record_line, read_lines,
    value_to_circle_id, value_to_f64, write_lines, CodecError, LineDiagnostic, RawRecord,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};

/// Lowest square id handed out by `allocate_next_square_id`.
pub const SQUARE_ID_FLOOR: &str = "BB";

/// Index or kind misuse against the marker lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    IndexOutOfRange { kind: MarkerKind, index: usize },
    KindMismatch { expected: MarkerKind, found: MarkerKind },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { kind, index } => write!(f, "no {kind} at index {index}"),
            Self::KindMismatch { expected, found } => {
                write!(f, "expected a {expected} marker, got a {found}")
            }
        }
    }
}

impl Error for StoreError {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkerRecord<'a> {
    id: Value,
    x: Value,
    y: Value,
    adjacent_squares: &'a [Token],
    #[serde(skip_serializing_if = "Option::is_none")]
    adjacent_circles: Option<&'a [i64]>,
}

impl<'a> MarkerRecord<'a> {
    fn from_marker(marker: &'a Marker) -> Self {
        let (id, adjacent_circles) = match marker.id.circle_id() {
            Some(circle_id) => (Value::from(circle_id), None),
            None => (
                Value::from(marker.id.as_str()),
                Some(marker.adjacent_circles.as_slice()),
            ),
        };
        Self {
            id,
            x: json_number(marker.x),
            y: json_number(marker.y),
            adjacent_squares: &marker.adjacent_squares,
            adjacent_circles,
        }
    }
}

/// Authoritative circle and square lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerStore {
    circles: Vec<Marker>,
    squares: Vec<Marker>,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store, routing each marker to the list of its kind.
    pub fn from_markers<I: IntoIterator<Item = Marker>>(markers: I) -> Self {
        let mut store = Self::new();
        for marker in markers {
            store.add(marker);
        }
        store
    }

    /// Loads both lists, skipping lines that cannot become markers.
    ///
    /// `circles_source` / `squares_source` label diagnostics.
    pub fn load<C: BufRead, S: BufRead>(
        circles_source: &str,
        circles: C,
        squares_source: &str,
        squares: S,
    ) -> std::io::Result<(Self, Vec<LineDiagnostic>)> {
        let (circles, mut diagnostics) =
            Self::load_kind(MarkerKind::Circle, circles_source, circles)?;
        let (squares, square_diagnostics) =
            Self::load_kind(MarkerKind::Square, squares_source, squares)?;
        diagnostics.extend(square_diagnostics);
        Ok((Self { circles, squares }, diagnostics))
    }

    /// Loads one marker list, coercing every record to `kind`.
    pub fn load_kind<R: BufRead>(
        kind: MarkerKind,
        source: &str,
        reader: R,
    ) -> std::io::Result<(Vec<Marker>, Vec<LineDiagnostic>)> {
        read_lines(source, reader, |line| {
            marker_from_record(kind, parse_record_line(line)?)
        })
    }

    /// Writes both lists, one canonical record per line.
    pub fn save<C: Write, S: Write>(&self, circles: C, squares: S) -> std::io::Result<()> {
        self.save_kind(MarkerKind::Circle, circles)?;
        self.save_kind(MarkerKind::Square, squares)
    }

    /// Writes one list. Circle records omit `adjacentCircles`.
    pub fn save_kind<W: Write>(&self, kind: MarkerKind, writer: W) -> std::io::Result<()> {
        write_lines(
            writer,
            self.markers(kind).iter().map(MarkerRecord::from_marker),
        )
    }

    pub fn circles(&self) -> &[Marker] {
        &self.circles
    }

    pub fn squares(&self) -> &[Marker] {
        &self.squares
    }

    pub fn markers(&self, kind: MarkerKind) -> &[Marker] {
        match kind {
            MarkerKind::Circle => &self.circles,
            MarkerKind::Square => &self.squares,
        }
    }

    pub(crate) fn markers_mut(&mut self, kind: MarkerKind) -> &mut Vec<Marker> {
        match kind {
            MarkerKind::Circle => &mut self.circles,
            MarkerKind::Square => &mut self.squares,
        }
    }

    pub fn get(&self, kind: MarkerKind, index: usize) -> Option<&Marker> {
        self.markers(kind).get(index)
    }

    pub fn len(&self) -> usize {
        self.circles.len() + self.squares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circles.is_empty() && self.squares.is_empty()
    }

    /// All markers, circles first.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.circles.iter().chain(self.squares.iter())
    }

    /// Appends `marker` to the list of its kind and returns its index.
    pub fn add(&mut self, marker: Marker) -> usize {
        let list = self.markers_mut(marker.kind());
        list.push(marker);
        list.len() - 1
    }

    /// Swaps in `marker` at `index`, returning the previous marker.
    pub fn replace(
        &mut self,
        kind: MarkerKind,
        index: usize,
        marker: Marker,
    ) -> Result<Marker, StoreError> {
        if marker.kind() != kind {
            return Err(StoreError::KindMismatch {
                expected: kind,
                found: marker.kind(),
            });
        }
        let slot = self
            .markers_mut(kind)
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { kind, index })?;
        Ok(std::mem::replace(slot, marker))
    }

    /// Removes and returns the marker at `index`; later indices shift down.
    pub fn remove(&mut self, kind: MarkerKind, index: usize) -> Result<Marker, StoreError> {
        let list = self.markers_mut(kind);
        if index >= list.len() {
            return Err(StoreError::IndexOutOfRange { kind, index });
        }
        Ok(list.remove(index))
    }

    /// First marker carrying `token`.
    pub fn find_by_token(&self, token: &Token) -> Option<&Marker> {
        self.markers(token.kind())
            .iter()
            .find(|marker| &marker.id == token)
    }

    /// Every marker carrying `token`, in list order.
    pub fn find_all_by_token<'a>(&'a self, token: &'a Token) -> impl Iterator<Item = &'a Marker> {
        self.markers(token.kind())
            .iter()
            .filter(move |marker| &marker.id == token)
    }

    /// Square ids in use, optionally ignoring the square being edited.
    pub fn used_square_ids(&self, excluding_index: Option<usize>) -> BTreeSet<Token> {
        self.squares
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != excluding_index)
            .map(|(_, marker)| marker.id.clone())
            .collect()
    }

    /// First unused square id in lexicographic order starting at `BB`.
    ///
    /// Returns `None` once all two-consonant codes are taken.
    pub fn allocate_next_square_id(&self) -> Option<Token> {
        let used = self.used_square_ids(None);
        SQUARE_LETTERS
            .iter()
            .flat_map(|first| SQUARE_LETTERS.iter().map(move |second| format!("{first}{second}")))
            .filter(|candidate| candidate.as_str() >= SQUARE_ID_FLOOR)
            .filter_map(|candidate| Token::square(&candidate).ok())
            .find(|candidate| !used.contains(candidate))
    }
}

fn marker_from_record(kind: MarkerKind, record: RawRecord) -> Result<Marker, CodecError> {
    let id = match kind {
        MarkerKind::Circle => value_to_circle_id(&record.id)
            .map(Token::circle)
            .ok_or_else(|| invalid_field("id", &record.id))?,
        MarkerKind::Square => match &record.id {
            Value::String(text) => Token::square(text).map_err(|_| invalid_field("id", &record.id))?,
            other => return Err(invalid_field("id", other)),
        },
    };
    let x = value_to_f64(&record.x).ok_or_else(|| invalid_field("x", &record.x))?;
    let y = value_to_f64(&record.y).ok_or_else(|| invalid_field("y", &record.y))?;

    let mut marker = Marker::new(id, x, y)
        .with_adjacent_squares(normalize_square_list(&record.adjacent_squares));
    if kind == MarkerKind::Square {
        marker.adjacent_circles = normalize_circle_list(&record.adjacent_circles);
    }
    Ok(marker)
}

fn invalid_field(field: &'static str, value: &Value) -> CodecError {
    CodecError::InvalidField {
        field,
        value: value.to_string(),
    }
}
