//! Core marker/adjacency logic for the Whitehall map helper.
//! This crate is the single source of truth for marker and connection invariants;
//! rendering and dialog plumbing live outside and call in through `EditorService`.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod store;

pub use config::{EditorConfig, ImageBounds, StorePaths};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::connection::Connection;
pub use model::marker::{Marker, MarkerKind};
pub use model::token::{classify, normalize_pair, normalize_token, Token, TokenError};
pub use repo::codec::{CodecError, LineDiagnostic};
pub use repo::jsonl_repo::{JsonlMarkerRepository, LoadedState, MarkerRepository};
pub use repo::{RepoError, RepoResult};
pub use search::overlay::{
    choose_connection_endpoints, ActiveEdit, ConnectionSegment, DisplayEntry, DisplayKey, OverlayView,
};
pub use search::spatial::{
    nearest_adjacency_target_for_square, nearest_any, nearest_circle, nearest_square,
};
pub use service::adjacency_sync::{migrate_legacy, resync};
pub use service::draft::{DraftContext, DraftError, MarkerDraft};
pub use service::editor_service::{
    toggle_adjacency, EditAction, EditOutcome, EditorError, EditorResult, EditorService,
};
pub use service::render_schedule::{RenderQuality, RenderScheduler};
pub use store::connection_set::{ConnectionSet, LoadedConnections};
pub use store::marker_store::{MarkerStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
