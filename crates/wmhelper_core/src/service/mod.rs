//! Use-case services over the marker and connection stores.
//!
//! # Responsibility
//! - Keep marker adjacency caches projected from the connection set.
//! - Validate edit-form input before anything is mutated.
//! - Expose the input-layer operations as one owned editor session.

pub mod adjacency_sync;
pub mod draft;
pub mod editor_service;
pub mod render_schedule;
