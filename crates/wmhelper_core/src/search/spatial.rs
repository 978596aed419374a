//! Nearest-marker lookups.
//!
//! Marker counts are in the tens to low hundreds, so every query is a linear
//! scan comparing squared distances. On equal distance the earlier marker wins.

use crate::model::marker::{Marker, MarkerKind};
use crate::store::marker_store::MarkerStore;

/// Nearest square, optionally skipping the square at `exclude_index`.
pub fn nearest_square(
    store: &MarkerStore,
    x: f64,
    y: f64,
    exclude_index: Option<usize>,
) -> Option<(usize, &Marker)> {
    nearest_in(store.squares(), x, y, exclude_index).map(|(index, marker, _)| (index, marker))
}

pub fn nearest_circle(store: &MarkerStore, x: f64, y: f64) -> Option<(usize, &Marker)> {
    nearest_in(store.circles(), x, y, None).map(|(index, marker, _)| (index, marker))
}

/// Nearest marker of either kind; circles win ties.
pub fn nearest_any(store: &MarkerStore, x: f64, y: f64) -> Option<(MarkerKind, usize, &Marker)> {
    let circle = nearest_in(store.circles(), x, y, None);
    let square = nearest_in(store.squares(), x, y, None);
    match (circle, square) {
        (Some((ci, c, cd)), Some((si, s, sd))) => {
            if sd < cd {
                Some((MarkerKind::Square, si, s))
            } else {
                Some((MarkerKind::Circle, ci, c))
            }
        }
        (Some((index, marker, _)), None) => Some((MarkerKind::Circle, index, marker)),
        (None, Some((index, marker, _))) => Some((MarkerKind::Square, index, marker)),
        (None, None) => None,
    }
}

/// Nearest thing a square being edited could be connected to.
///
/// `exclude_square_index` is the square under edit. Squares win ties.
pub fn nearest_adjacency_target_for_square(
    store: &MarkerStore,
    x: f64,
    y: f64,
    exclude_square_index: Option<usize>,
) -> Option<(MarkerKind, &Marker)> {
    let square = nearest_in(store.squares(), x, y, exclude_square_index);
    let circle = nearest_in(store.circles(), x, y, None);
    match (square, circle) {
        (Some((_, s, sd)), Some((_, c, cd))) => {
            if sd <= cd {
                Some((MarkerKind::Square, s))
            } else {
                Some((MarkerKind::Circle, c))
            }
        }
        (Some((_, s, _)), None) => Some((MarkerKind::Square, s)),
        (None, Some((_, c, _))) => Some((MarkerKind::Circle, c)),
        (None, None) => None,
    }
}

fn nearest_in(
    markers: &[Marker],
    x: f64,
    y: f64,
    exclude_index: Option<usize>,
) -> Option<(usize, &Marker, f64)> {
    let mut best: Option<(usize, &Marker, f64)> = None;
    for (index, marker) in markers.iter().enumerate() {
        if Some(index) == exclude_index {
            continue;
        }
        let distance = marker.distance_sq(x, y);
        if best.map_or(true, |(_, _, best_distance)| distance < best_distance) {
            best = Some((index, marker, distance));
        }
    }
    best
}
