//! Token normalization for marker identities.
//!
//! # Responsibility
//! - Canonicalize raw identifiers into square or circle tokens.
//! - Classify already-normalized text.
//! - Build canonical, order-independent connection pairs.
//!
//! # Invariants
//! - Square tokens are exactly two uppercase consonants (`B..Z` without vowels).
//! - Circle tokens are the decimal rendering of an `i64` (`" 007 "` becomes `"7"`).
//! - Token ordering is plain lexicographic order of the canonical text.

use crate::model::connection::Connection;
use crate::model::marker::MarkerKind;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Letters allowed in square ids, in allocation order.
pub const SQUARE_LETTERS: [char; 21] = [
    'B', 'C', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W',
    'X', 'Y', 'Z',
];

/// Normalized identity of a marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Token of the circle with numeric id `id`.
    pub fn circle(id: i64) -> Self {
        Self(id.to_string())
    }

    /// Parses a square id, rejecting anything that is not two consonants.
    pub fn square(raw: &str) -> Result<Self, TokenError> {
        let token = normalize_token(raw)?;
        if token.is_square() {
            Ok(token)
        } else {
            Err(TokenError::NotASquare(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> MarkerKind {
        if is_square_text(&self.0) {
            MarkerKind::Square
        } else {
            MarkerKind::Circle
        }
    }

    pub fn is_square(&self) -> bool {
        self.kind() == MarkerKind::Square
    }

    pub fn is_circle(&self) -> bool {
        self.kind() == MarkerKind::Circle
    }

    /// Numeric id for circle tokens, `None` for squares.
    pub fn circle_id(&self) -> Option<i64> {
        if self.is_circle() {
            self.0.parse().ok()
        } else {
            None
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why raw input could not become a token or connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Input is blank after trimming.
    Empty,
    /// Input is neither two consonants nor an integer.
    NotAToken(String),
    /// A square id was required but the input is not one.
    NotASquare(String),
    /// Both endpoints normalize to the same token.
    SelfLoop(Token),
    /// Circles may only connect to squares.
    CircleToCircle(Token, Token),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "id must not be blank"),
            Self::NotAToken(raw) => write!(
                f,
                "`{raw}` is neither a two-consonant square id nor a numeric circle id"
            ),
            Self::NotASquare(raw) => write!(
                f,
                "`{raw}` must be two uppercase consonants (no vowels), e.g. BB"
            ),
            Self::SelfLoop(token) => write!(f, "`{token}` cannot connect to itself"),
            Self::CircleToCircle(a, b) => {
                write!(f, "circles `{a}` and `{b}` cannot be connected directly")
            }
        }
    }
}

impl Error for TokenError {}

/// Canonicalizes a raw identifier.
///
/// Whitespace is trimmed; two consonant letters (any case) become a square
/// token, anything that parses as an integer becomes a circle token.
pub fn normalize_token(raw: &str) -> Result<Token, TokenError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TokenError::Empty);
    }

    let upper = trimmed.to_uppercase();
    if is_square_text(&upper) {
        return Ok(Token(upper));
    }

    trimmed
        .parse::<i64>()
        .map(Token::circle)
        .map_err(|_| TokenError::NotAToken(trimmed.to_string()))
}

/// Classifies already-normalized text; `None` means invalid.
pub fn classify(text: &str) -> Option<MarkerKind> {
    if is_square_text(text) {
        Some(MarkerKind::Square)
    } else if text.parse::<i64>().is_ok() {
        Some(MarkerKind::Circle)
    } else {
        None
    }
}

/// Normalizes both endpoints into a canonical connection.
pub fn normalize_pair(a_raw: &str, b_raw: &str) -> Result<Connection, TokenError> {
    Connection::new(normalize_token(a_raw)?, normalize_token(b_raw)?)
}

pub(crate) fn is_square_text(text: &str) -> bool {
    let mut chars = text.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(first), Some(second), None) => is_square_letter(first) && is_square_letter(second),
        _ => false,
    }
}

fn is_square_letter(ch: char) -> bool {
    SQUARE_LETTERS.contains(&ch)
}

#[cfg(test)]
mod tests {
    use super::{is_square_text, SQUARE_LETTERS};

    #[test]
    fn square_alphabet_has_no_vowels() {
        assert_eq!(SQUARE_LETTERS.len(), 21);
        assert!(!SQUARE_LETTERS.iter().any(|ch| "AEIOU".contains(*ch)));
    }

    #[test]
    fn square_text_requires_exactly_two_uppercase_consonants() {
        assert!(is_square_text("BZ"));
        assert!(!is_square_text("bz"));
        assert!(!is_square_text("BA"));
        assert!(!is_square_text("B"));
        assert!(!is_square_text("BBB"));
    }
}
