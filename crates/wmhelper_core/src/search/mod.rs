//! Read-only queries over the marker store.
//!
//! # Responsibility
//! - Nearest-marker lookups for click targeting (`spatial`).
//! - Display-entry resolution for connection drawing with an edit preview
//!   overlaid on the stored markers (`overlay`).
//!
//! # Invariants
//! - Queries never mutate the stores.
//! - Distances are squared euclidean over a full linear scan.

pub mod overlay;
pub mod spatial;
