//! Undirected edge between two marker tokens.

use crate::model::token::{Token, TokenError};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Canonical unordered pair of distinct tokens.
///
/// The pair is stored sorted, so `{a, b}` and `{b, a}` are the same value and
/// derived ordering is lexicographic on the canonical tuple. Serializes as a
/// two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Connection(Token, Token);

impl Connection {
    /// Builds the canonical pair, rejecting self-loops and circle-to-circle edges.
    pub fn new(a: Token, b: Token) -> Result<Self, TokenError> {
        if a == b {
            return Err(TokenError::SelfLoop(a));
        }
        if a.is_circle() && b.is_circle() {
            return Err(TokenError::CircleToCircle(a, b));
        }
        if a <= b {
            Ok(Self(a, b))
        } else {
            Ok(Self(b, a))
        }
    }

    pub fn first(&self) -> &Token {
        &self.0
    }

    pub fn second(&self) -> &Token {
        &self.1
    }

    pub fn contains(&self, token: &Token) -> bool {
        &self.0 == token || &self.1 == token
    }

    /// The endpoint opposite `token`, if `token` is one of the endpoints.
    pub fn other(&self, token: &Token) -> Option<&Token> {
        if &self.0 == token {
            Some(&self.1)
        } else if &self.1 == token {
            Some(&self.0)
        } else {
            None
        }
    }

    pub fn is_square_to_square(&self) -> bool {
        self.0.is_square() && self.1.is_square()
    }

    /// `(square, circle id)` for square-to-circle edges.
    pub fn square_and_circle(&self) -> Option<(&Token, i64)> {
        match (self.0.circle_id(), self.1.circle_id()) {
            (Some(circle), None) => Some((&self.1, circle)),
            (None, Some(circle)) => Some((&self.0, circle)),
            _ => None,
        }
    }
}

impl Display for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}--{}", self.0, self.1)
    }
}
