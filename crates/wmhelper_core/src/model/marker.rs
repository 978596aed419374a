//! Marker domain model.
//!
//! # Responsibility
//! - Define the placed annotation shared by circle and square lists.
//!
//! # Invariants
//! - A marker's kind is derived from its token and cannot disagree with it.
//! - `adjacent_squares` / `adjacent_circles` are caches projected from the
//!   connection set; call sites must not treat them as the source of truth.
//! - Circles never carry adjacent circles.

use crate::model::token::{Token, TokenError};
use std::fmt::{Display, Formatter};

/// Which list a marker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKind {
    /// Numbered location.
    Circle,
    /// Two-consonant lettered location.
    Square,
}

impl MarkerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
        }
    }
}

impl Display for MarkerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One placed annotation in image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: Token,
    pub x: f64,
    pub y: f64,
    /// Sorted square tokens connected to this marker.
    pub adjacent_squares: Vec<Token>,
    /// Sorted circle ids connected to this marker. Always empty for circles.
    pub adjacent_circles: Vec<i64>,
}

impl Marker {
    /// Creates a marker with empty adjacency caches.
    pub fn new(id: Token, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            adjacent_squares: Vec::new(),
            adjacent_circles: Vec::new(),
        }
    }

    pub fn circle(id: i64, x: f64, y: f64) -> Self {
        Self::new(Token::circle(id), x, y)
    }

    pub fn square(id: &str, x: f64, y: f64) -> Result<Self, TokenError> {
        Ok(Self::new(Token::square(id)?, x, y))
    }

    /// Builder-style helper used by import paths and tests.
    pub fn with_adjacent_squares(mut self, squares: Vec<Token>) -> Self {
        self.adjacent_squares = squares;
        self
    }

    /// Builder-style helper; ignored by the connection logic for circles.
    pub fn with_adjacent_circles(mut self, circles: Vec<i64>) -> Self {
        self.adjacent_circles = circles;
        self
    }

    pub fn kind(&self) -> MarkerKind {
        self.id.kind()
    }

    pub fn token(&self) -> &Token {
        &self.id
    }

    pub fn clear_adjacency(&mut self) {
        self.adjacent_squares.clear();
        self.adjacent_circles.clear();
    }

    /// Squared euclidean distance to `(x, y)`.
    pub fn distance_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}
