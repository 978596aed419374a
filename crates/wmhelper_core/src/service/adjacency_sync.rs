//! Projection of the connection set onto marker adjacency caches.
//!
//! # Responsibility
//! - Rebuild every marker's `adjacent_squares` / `adjacent_circles` from the
//!   canonical connection set.
//! - Build the connection set from embedded adjacency when no connections
//!   file exists (legacy migration).
//!
//! # Invariants
//! - `resync` is idempotent and always safe to call.
//! - Every marker sharing a token receives the same adjacency.
//! - Circles end with an empty `adjacent_circles`.

use crate::model::marker::MarkerKind;
use crate::model::token::Token;
use crate::store::connection_set::ConnectionSet;
use crate::store::marker_store::MarkerStore;
use log::{debug, info};
use std::collections::HashMap;

/// Rewrites all adjacency caches in `markers` from `connections`.
pub fn resync(markers: &mut MarkerStore, connections: &ConnectionSet) {
    let circles_by_token = clear_and_index(markers, MarkerKind::Circle);
    let squares_by_token = clear_and_index(markers, MarkerKind::Square);

    for connection in connections {
        if connection.is_square_to_square() {
            let (a, b) = (connection.first(), connection.second());
            push_square(markers, MarkerKind::Square, &squares_by_token, a, b);
            push_square(markers, MarkerKind::Square, &squares_by_token, b, a);
            continue;
        }

        let Some((square, circle_id)) = connection.square_and_circle() else {
            continue;
        };
        for &index in squares_by_token.get(square).into_iter().flatten() {
            markers.markers_mut(MarkerKind::Square)[index]
                .adjacent_circles
                .push(circle_id);
        }
        let circle = Token::circle(circle_id);
        push_square(markers, MarkerKind::Circle, &circles_by_token, &circle, square);
    }

    for marker in markers.markers_mut(MarkerKind::Circle) {
        marker.adjacent_squares.sort();
        marker.adjacent_squares.dedup();
        marker.adjacent_circles.clear();
    }
    for marker in markers.markers_mut(MarkerKind::Square) {
        marker.adjacent_squares.sort();
        marker.adjacent_squares.dedup();
        marker.adjacent_circles.sort_unstable();
        marker.adjacent_circles.dedup();
    }

    debug!(
        "event=adjacency_resync module=sync status=ok markers={} connections={}",
        markers.len(),
        connections.len()
    );
}

/// Builds the connection set from markers' embedded adjacency lists.
pub fn migrate_legacy(markers: &MarkerStore) -> ConnectionSet {
    let connections = ConnectionSet::from_marker_adjacency(markers);
    info!(
        "event=legacy_migration module=sync status=ok markers={} connections={}",
        markers.len(),
        connections.len()
    );
    connections
}

/// Returns `true` when the caches already match `connections`.
pub fn is_in_sync(markers: &MarkerStore, connections: &ConnectionSet) -> bool {
    let mut projected = markers.clone();
    resync(&mut projected, connections);
    &projected == markers
}

fn clear_and_index(markers: &mut MarkerStore, kind: MarkerKind) -> HashMap<Token, Vec<usize>> {
    let mut by_token: HashMap<Token, Vec<usize>> = HashMap::new();
    for (index, marker) in markers.markers_mut(kind).iter_mut().enumerate() {
        marker.clear_adjacency();
        by_token.entry(marker.id.clone()).or_default().push(index);
    }
    by_token
}

fn push_square(
    markers: &mut MarkerStore,
    kind: MarkerKind,
    index: &HashMap<Token, Vec<usize>>,
    owner: &Token,
    square: &Token,
) {
    let list = markers.markers_mut(kind);
    for &position in index.get(owner).into_iter().flatten() {
        list[position].adjacent_squares.push(square.clone());
    }
}
