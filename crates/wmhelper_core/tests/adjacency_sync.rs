use wmhelper_core::service::adjacency_sync::is_in_sync;
use wmhelper_core::{migrate_legacy, normalize_pair, resync, ConnectionSet, Marker, MarkerStore, Token};

fn sq(id: &str) -> Token {
    Token::square(id).unwrap()
}

fn set(pairs: &[(&str, &str)]) -> ConnectionSet {
    pairs
        .iter()
        .map(|(a, b)| normalize_pair(a, b).unwrap())
        .collect()
}

#[test]
fn resync_projects_both_directions() {
    let mut store = MarkerStore::from_markers([
        Marker::circle(1, 0.0, 0.0),
        Marker::square("BB", 1.0, 1.0).unwrap(),
        Marker::square("BC", 2.0, 2.0).unwrap(),
    ]);
    resync(&mut store, &set(&[("1", "BB"), ("BC", "BB")]));

    assert_eq!(store.circles()[0].adjacent_squares, vec![sq("BB")]);
    assert_eq!(store.squares()[0].adjacent_squares, vec![sq("BC")]);
    assert_eq!(store.squares()[0].adjacent_circles, vec![1]);
    assert_eq!(store.squares()[1].adjacent_squares, vec![sq("BB")]);
    assert!(store.squares()[1].adjacent_circles.is_empty());
}

#[test]
fn resync_discards_stale_caches() {
    let mut store = MarkerStore::from_markers([
        Marker::circle(1, 0.0, 0.0).with_adjacent_squares(vec![sq("BZ")]),
        Marker::square("BB", 1.0, 1.0)
            .unwrap()
            .with_adjacent_circles(vec![9])
            .with_adjacent_squares(vec![sq("BZ")]),
    ]);
    resync(&mut store, &ConnectionSet::new());
    assert!(store.iter().all(|m| m.adjacent_squares.is_empty()));
    assert!(store.iter().all(|m| m.adjacent_circles.is_empty()));
}

#[test]
fn resync_is_idempotent() {
    let connections = set(&[("1", "BB"), ("2", "BB"), ("BB", "BC"), ("BC", "BD")]);
    let mut store = MarkerStore::from_markers([
        Marker::circle(2, 0.0, 0.0),
        Marker::circle(1, 0.0, 0.0),
        Marker::square("BD", 1.0, 1.0).unwrap(),
        Marker::square("BB", 1.0, 1.0).unwrap(),
        Marker::square("BC", 1.0, 1.0).unwrap(),
    ]);
    resync(&mut store, &connections);
    let once = store.clone();
    resync(&mut store, &connections);
    assert_eq!(store, once);
    assert!(is_in_sync(&store, &connections));
    assert_eq!(store.squares()[1].adjacent_circles, vec![1, 2]);
}

#[test]
fn every_marker_sharing_a_token_is_updated() {
    let mut store = MarkerStore::from_markers([
        Marker::circle(3, 0.0, 0.0),
        Marker::circle(3, 50.0, 50.0),
        Marker::square("BB", 1.0, 1.0).unwrap(),
    ]);
    resync(&mut store, &set(&[("3", "BB")]));
    assert!(store
        .circles()
        .iter()
        .all(|circle| circle.adjacent_squares == vec![sq("BB")]));
    assert_eq!(store.squares()[0].adjacent_circles, vec![3]);
}

#[test]
fn connections_to_missing_markers_are_ignored() {
    let mut store = MarkerStore::from_markers([Marker::square("BB", 1.0, 1.0).unwrap()]);
    resync(&mut store, &set(&[("BB", "BC"), ("7", "BB")]));
    assert_eq!(store.squares()[0].adjacent_squares, vec![sq("BC")]);
    assert_eq!(store.squares()[0].adjacent_circles, vec![7]);
}

#[test]
fn legacy_migration_then_resync_symmetrizes_one_sided_adjacency() {
    let mut store = MarkerStore::from_markers([
        Marker::circle(1, 0.0, 0.0),
        Marker::square("BB", 1.0, 1.0)
            .unwrap()
            .with_adjacent_circles(vec![1]),
    ]);
    let connections = migrate_legacy(&store);
    resync(&mut store, &connections);
    assert_eq!(store.circles()[0].adjacent_squares, vec![sq("BB")]);
}
