//! Marker and connection value types.
//!
//! # Responsibility
//! - Define the typed identity (`Token`) shared by markers and edges.
//! - Keep normalization rules for raw identifiers in one place.
//!
//! # Invariants
//! - A `Token` can only be built through normalization, never from raw text.
//! - A `Connection` is never circle-to-circle and never a self-loop.

pub mod connection;
pub mod marker;
pub mod token;
