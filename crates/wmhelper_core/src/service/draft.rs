//! Edit-form input parsing and validation.
//!
//! # Responsibility
//! - Turn the raw text of the marker edit form into a `Marker`.
//! - Report the first validation failure with an operator-facing message.
//! - Offer a lenient parse for live previews while the operator is typing.
//!
//! # Invariants
//! - Strict parsing never yields a marker outside the image bounds, with a
//!   malformed id, with a square id already used by another square, or with
//!   malformed adjacency entries.
//! - A square never lists itself as adjacent; circles never list circles.

use crate::config::{nudge, ImageBounds};
use crate::model::marker::{Marker, MarkerKind};
use crate::model::token::Token;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failure for a marker draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    /// X or Y is not a number.
    InvalidCoordinates,
    /// Coordinates fall outside the image.
    OutOfBounds { width: u32, height: u32 },
    InvalidCircleId(String),
    InvalidSquareId(String),
    /// Another square already uses this id.
    DuplicateSquareId(Token),
    InvalidAdjacentSquare(String),
    InvalidAdjacentCircle(String),
}

impl Display for DraftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCoordinates => write!(f, "X and Y must be numbers."),
            Self::OutOfBounds { width, height } => write!(
                f,
                "Coordinates must be inside image bounds: x=0..{}, y=0..{}.",
                width.saturating_sub(1),
                height.saturating_sub(1)
            ),
            Self::InvalidCircleId(_) => write!(f, "Circle ID must be a number."),
            Self::InvalidSquareId(_) => write!(
                f,
                "Square ID must be two uppercase consonants (no vowels), e.g. BB."
            ),
            Self::DuplicateSquareId(id) => write!(f, "Square ID \"{id}\" already exists."),
            Self::InvalidAdjacentSquare(raw) => write!(
                f,
                "Adjacent square id \"{raw}\" must be two uppercase consonants (e.g. BB)."
            ),
            Self::InvalidAdjacentCircle(raw) => {
                write!(f, "Adjacent circle id \"{raw}\" must be a number.")
            }
        }
    }
}

impl Error for DraftError {}

/// What a draft is validated against.
#[derive(Debug, Clone, Copy)]
pub struct DraftContext<'a> {
    pub kind: MarkerKind,
    pub bounds: ImageBounds,
    /// Ids of every other square; empty for circles.
    pub used_square_ids: &'a BTreeSet<Token>,
}

/// Raw text fields of the marker edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerDraft {
    pub id: String,
    pub x: String,
    pub y: String,
    /// Comma-separated square ids.
    pub adjacent_squares: String,
    /// Comma-separated circle ids; ignored for circle drafts.
    pub adjacent_circles: String,
}

impl MarkerDraft {
    /// Pre-fills the form from an existing marker.
    pub fn from_marker(marker: &Marker) -> Self {
        Self {
            id: marker.id.to_string(),
            x: format_coord(marker.x),
            y: format_coord(marker.y),
            adjacent_squares: join_ids(&marker.adjacent_squares),
            adjacent_circles: join_ids(&marker.adjacent_circles),
        }
    }

    /// Form for a marker that does not exist yet; `id` is blank for circles.
    pub fn for_new_marker(id: Option<&Token>, x: f64, y: f64) -> Self {
        Self {
            id: id.map(Token::to_string).unwrap_or_default(),
            x: format_coord(x),
            y: format_coord(y),
            ..Self::default()
        }
    }

    /// Strict parse used when the operator commits the form.
    pub fn build(&self, context: &DraftContext<'_>) -> Result<Marker, DraftError> {
        self.parse(context, true)
    }

    /// Lenient parse for live previews.
    ///
    /// Malformed adjacency entries are dropped and duplicate square ids are
    /// tolerated; unusable coordinates or ids yield `None`.
    pub fn preview(&self, context: &DraftContext<'_>) -> Option<Marker> {
        self.parse(context, false).ok()
    }

    /// Replaces the adjacent squares field, deduplicated in order.
    pub fn set_adjacent_squares(&mut self, squares: &[Token]) {
        let mut unique: Vec<&Token> = Vec::new();
        for square in squares.iter().filter(|token| token.is_square()) {
            if !unique.contains(&square) {
                unique.push(square);
            }
        }
        self.adjacent_squares = join_ids(&unique);
    }

    /// Replaces the adjacent circles field, deduplicated in order.
    pub fn set_adjacent_circles(&mut self, circles: &[i64]) {
        let mut unique: Vec<i64> = Vec::new();
        for circle in circles {
            if !unique.contains(circle) {
                unique.push(*circle);
            }
        }
        self.adjacent_circles = join_ids(&unique);
    }

    /// Moves X by `delta`; unparseable text restarts from `fallback`.
    pub fn nudge_x(&mut self, delta: f64, bounds: ImageBounds, fallback: f64) {
        let current = self.x.trim().parse().unwrap_or(fallback);
        self.x = format_coord(nudge(current, delta, bounds.width));
    }

    /// Moves Y by `delta`; unparseable text restarts from `fallback`.
    pub fn nudge_y(&mut self, delta: f64, bounds: ImageBounds, fallback: f64) {
        let current = self.y.trim().parse().unwrap_or(fallback);
        self.y = format_coord(nudge(current, delta, bounds.height));
    }

    fn parse(&self, context: &DraftContext<'_>, strict: bool) -> Result<Marker, DraftError> {
        let x: f64 = self
            .x
            .trim()
            .parse()
            .map_err(|_| DraftError::InvalidCoordinates)?;
        let y: f64 = self
            .y
            .trim()
            .parse()
            .map_err(|_| DraftError::InvalidCoordinates)?;
        if !context.bounds.contains(x, y) {
            return Err(DraftError::OutOfBounds {
                width: context.bounds.width,
                height: context.bounds.height,
            });
        }

        let raw_id = self.id.trim();
        let id = match context.kind {
            MarkerKind::Circle => raw_id
                .parse::<i64>()
                .map(Token::circle)
                .map_err(|_| DraftError::InvalidCircleId(raw_id.to_string()))?,
            MarkerKind::Square => {
                let token = Token::square(raw_id)
                    .map_err(|_| DraftError::InvalidSquareId(raw_id.to_string()))?;
                if strict && context.used_square_ids.contains(&token) {
                    return Err(DraftError::DuplicateSquareId(token));
                }
                token
            }
        };

        let mut adjacent_squares = parse_square_list(&self.adjacent_squares, strict)?;
        adjacent_squares.retain(|square| square != &id);
        let adjacent_circles = match context.kind {
            MarkerKind::Circle => Vec::new(),
            MarkerKind::Square => parse_circle_list(&self.adjacent_circles, strict)?,
        };

        Ok(Marker::new(id, x, y)
            .with_adjacent_squares(adjacent_squares)
            .with_adjacent_circles(adjacent_circles))
    }
}

/// Integral values without decimals, everything else in shortest form.
pub fn format_coord(value: f64) -> String {
    if (value - value.round()).abs() <= 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        value.to_string()
    }
}

fn split_ids(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|part| !part.is_empty())
}

fn join_ids<T: ToString>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_square_list(raw: &str, strict: bool) -> Result<Vec<Token>, DraftError> {
    let mut squares: Vec<Token> = Vec::new();
    for part in split_ids(raw) {
        match Token::square(part) {
            Ok(token) => {
                if !squares.contains(&token) {
                    squares.push(token);
                }
            }
            Err(_) if strict => return Err(DraftError::InvalidAdjacentSquare(part.to_string())),
            Err(_) => {}
        }
    }
    Ok(squares)
}

fn parse_circle_list(raw: &str, strict: bool) -> Result<Vec<i64>, DraftError> {
    let mut circles: Vec<i64> = Vec::new();
    for part in split_ids(raw) {
        match part.parse::<i64>() {
            Ok(id) => {
                if !circles.contains(&id) {
                    circles.push(id);
                }
            }
            Err(_) if strict => return Err(DraftError::InvalidAdjacentCircle(part.to_string())),
            Err(_) => {}
        }
    }
    Ok(circles)
}
