//! What the canvas shows while an edit dialog is open.
//!
//! # Responsibility
//! - Overlay the in-progress preview marker on the stored markers.
//! - Derive the working connection set: the edited marker's stored
//!   connections replaced by those its preview implies.
//! - Resolve each connection to one pair of display entries.
//!
//! # Invariants
//! - Stored markers and the connection set are never modified.
//! - A segment never joins a display entry to itself.
//! - Segments follow canonical connection order.

use crate::model::connection::Connection;
use crate::model::marker::{Marker, MarkerKind};
use crate::model::token::Token;
use crate::store::connection_set::ConnectionSet;
use crate::store::marker_store::MarkerStore;
use std::collections::{BTreeMap, BTreeSet};

/// Identity of something drawn on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayKey {
    Stored { kind: MarkerKind, index: usize },
    /// Preview of a marker that is not stored yet.
    Preview(MarkerKind),
}

/// One drawable marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayEntry<'a> {
    pub key: DisplayKey,
    pub marker: &'a Marker,
}

/// State of the open edit dialog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveEdit {
    /// Stored marker being edited; `None` while placing a new marker.
    pub target: Option<(MarkerKind, usize)>,
    /// Lenient parse of the dialog; `None` while its fields are unusable.
    pub preview: Option<Marker>,
}

/// A connection resolved to two display entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSegment<'a> {
    pub connection: Connection,
    pub from: DisplayEntry<'a>,
    pub to: DisplayEntry<'a>,
    /// Touches the selected entry and should be drawn highlighted.
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct OverlayView<'a> {
    entries: Vec<DisplayEntry<'a>>,
    selected: Option<DisplayKey>,
    working_connections: ConnectionSet,
    highlighted_squares: BTreeSet<Token>,
    highlighted_circles: BTreeSet<i64>,
}

impl<'a> OverlayView<'a> {
    pub fn build(
        store: &'a MarkerStore,
        connections: &ConnectionSet,
        edit: Option<&'a ActiveEdit>,
    ) -> Self {
        let preview = edit.and_then(|edit| edit.preview.as_ref());
        let target = edit.and_then(|edit| edit.target);

        let mut entries = Vec::with_capacity(store.len() + 1);
        for kind in [MarkerKind::Circle, MarkerKind::Square] {
            for (index, marker) in store.markers(kind).iter().enumerate() {
                let shown = match preview {
                    Some(preview) if target == Some((kind, index)) => preview,
                    _ => marker,
                };
                entries.push(DisplayEntry {
                    key: DisplayKey::Stored { kind, index },
                    marker: shown,
                });
            }
            if let Some(preview) = preview.filter(|p| target.is_none() && p.kind() == kind) {
                entries.push(DisplayEntry {
                    key: DisplayKey::Preview(kind),
                    marker: preview,
                });
            }
        }

        let selected = match (preview, target) {
            (_, Some((kind, index))) => Some(DisplayKey::Stored { kind, index }),
            (Some(preview), None) => Some(DisplayKey::Preview(preview.kind())),
            (None, None) => None,
        };

        let mut working_connections = connections.clone();
        let mut highlighted_squares = BTreeSet::new();
        let mut highlighted_circles = BTreeSet::new();
        if let Some(preview) = preview {
            if let Some(original) = target.and_then(|(kind, index)| store.get(kind, index)) {
                working_connections.remove_all_containing(original.token());
            }
            working_connections.add_marker(preview);
            highlighted_squares.extend(preview.adjacent_squares.iter().cloned());
            highlighted_circles.extend(preview.adjacent_circles.iter().copied());
        }

        Self {
            entries,
            selected,
            working_connections,
            highlighted_squares,
            highlighted_circles,
        }
    }

    /// Circles first, then squares; a new-marker preview follows its kind.
    pub fn entries(&self) -> &[DisplayEntry<'a>] {
        &self.entries
    }

    pub fn selected(&self) -> Option<DisplayKey> {
        self.selected
    }

    pub fn working_connections(&self) -> &ConnectionSet {
        &self.working_connections
    }

    /// Squares the preview lists as adjacent.
    pub fn is_highlighted_square(&self, token: &Token) -> bool {
        self.highlighted_squares.contains(token)
    }

    /// Circles the preview lists as adjacent.
    pub fn is_highlighted_circle(&self, id: i64) -> bool {
        self.highlighted_circles.contains(&id)
    }

    /// Drawable segments for the working connections.
    ///
    /// Connections with an endpoint nothing displays are skipped.
    pub fn segments(&self) -> Vec<ConnectionSegment<'a>> {
        let mut by_token: BTreeMap<&Token, Vec<DisplayEntry<'a>>> = BTreeMap::new();
        for entry in &self.entries {
            by_token.entry(entry.marker.token()).or_default().push(*entry);
        }

        let mut segments = Vec::new();
        for connection in &self.working_connections {
            let (Some(a), Some(b)) = (
                by_token.get(connection.first()),
                by_token.get(connection.second()),
            ) else {
                continue;
            };
            let Some((from, to)) = choose_connection_endpoints(a, b, self.selected) else {
                continue;
            };
            let selected = self
                .selected
                .map_or(false, |key| from.key == key || to.key == key);
            segments.push(ConnectionSegment {
                connection: connection.clone(),
                from,
                to,
                selected,
            });
        }
        segments
    }
}

/// Picks the display entries a connection is drawn between.
///
/// A side containing the `pinned` entry is fixed and the other side takes
/// its nearest distinct candidate. Otherwise the closest distinct pair wins,
/// earlier candidates winning ties.
pub fn choose_connection_endpoints<'a>(
    candidates_a: &[DisplayEntry<'a>],
    candidates_b: &[DisplayEntry<'a>],
    pinned: Option<DisplayKey>,
) -> Option<(DisplayEntry<'a>, DisplayEntry<'a>)> {
    let pinned_in = |candidates: &[DisplayEntry<'a>]| {
        pinned.and_then(|key| candidates.iter().copied().find(|entry| entry.key == key))
    };

    match (pinned_in(candidates_a), pinned_in(candidates_b)) {
        (Some(a), Some(b)) => (a.key != b.key).then_some((a, b)),
        (Some(a), None) => nearest_other(a, candidates_b).map(|b| (a, b)),
        (None, Some(b)) => nearest_other(b, candidates_a).map(|a| (a, b)),
        (None, None) => {
            let mut best: Option<(DisplayEntry<'a>, DisplayEntry<'a>, f64)> = None;
            for a in candidates_a {
                for b in candidates_b.iter().filter(|b| b.key != a.key) {
                    let distance = entry_distance_sq(a, b);
                    if best.map_or(true, |(_, _, d)| distance < d) {
                        best = Some((*a, *b, distance));
                    }
                }
            }
            best.map(|(a, b, _)| (a, b))
        }
    }
}

fn nearest_other<'a>(
    fixed: DisplayEntry<'a>,
    candidates: &[DisplayEntry<'a>],
) -> Option<DisplayEntry<'a>> {
    let mut best: Option<(DisplayEntry<'a>, f64)> = None;
    for candidate in candidates.iter().filter(|c| c.key != fixed.key) {
        let distance = entry_distance_sq(&fixed, candidate);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((*candidate, distance));
        }
    }
    best.map(|(entry, _)| entry)
}

fn entry_distance_sq(a: &DisplayEntry<'_>, b: &DisplayEntry<'_>) -> f64 {
    a.marker.distance_sq(b.marker.x, b.marker.y)
}
