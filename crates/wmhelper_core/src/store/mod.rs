//! In-memory authoritative state.
//!
//! # Responsibility
//! - Own the circle and square lists (`MarkerStore`).
//! - Own the canonical edge set (`ConnectionSet`).
//!
//! # Invariants
//! - The two stores are siblings; neither mutates the other.
//! - Adjacency caches inside markers are refreshed only by
//!   `service::adjacency_sync::resync`.

pub mod connection_set;
pub mod marker_store;
