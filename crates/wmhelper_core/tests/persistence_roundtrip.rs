use std::fs;
use tempfile::TempDir;
use wmhelper_core::{
    normalize_pair, resync, ConnectionSet, JsonlMarkerRepository, Marker, MarkerRepository,
    MarkerStore, StorePaths, Token,
};

fn sample() -> (MarkerStore, ConnectionSet) {
    let mut markers = MarkerStore::from_markers([
        Marker::circle(1, 10.0, 12.5),
        Marker::circle(2, 0.125, 99.0),
        Marker::square("BB", 40.0, 40.0).unwrap(),
        Marker::square("BC", 41.5, 3.0).unwrap(),
    ]);
    let connections: ConnectionSet = [("1", "BB"), ("2", "BC"), ("BB", "BC")]
        .iter()
        .map(|(a, b)| normalize_pair(a, b).unwrap())
        .collect();
    resync(&mut markers, &connections);
    (markers, connections)
}

#[test]
fn save_then_load_is_observably_equal() {
    let dir = TempDir::new().unwrap();
    let repo = JsonlMarkerRepository::new(StorePaths::in_dir(dir.path()));
    let (markers, connections) = sample();

    repo.save(&markers, &connections).unwrap();
    let loaded = repo.load().unwrap();

    assert!(loaded.found_connections_file);
    assert!(loaded.diagnostics.is_empty());
    assert_eq!(loaded.connections, connections);

    let mut reloaded = loaded.markers;
    resync(&mut reloaded, &loaded.connections);
    assert_eq!(reloaded, markers);
}

#[test]
fn saving_twice_produces_identical_files() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    let repo = JsonlMarkerRepository::new(paths.clone());
    let (markers, connections) = sample();

    repo.save(&markers, &connections).unwrap();
    let first = fs::read_to_string(&paths.connections).unwrap();
    let loaded = repo.load().unwrap();
    repo.save(&loaded.markers, &loaded.connections).unwrap();

    assert_eq!(fs::read_to_string(&paths.connections).unwrap(), first);
    assert_eq!(first, "[\"1\",\"BB\"]\n[\"2\",\"BC\"]\n[\"BB\",\"BC\"]\n");
    assert!(!dir.path().join("connections.jsonl.tmp").exists());
}

#[test]
fn empty_directory_loads_empty_state() {
    let dir = TempDir::new().unwrap();
    let repo = JsonlMarkerRepository::new(StorePaths::in_dir(dir.path()));
    let loaded = repo.load().unwrap();
    assert!(loaded.markers.is_empty());
    assert!(!loaded.found_connections_file);
}

#[test]
fn connections_file_wins_over_embedded_adjacency() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    fs::write(
        &paths.squares,
        "{\"id\":\"BB\",\"x\":1,\"y\":1,\"adjacentSquares\":[\"BC\"],\"adjacentCircles\":[]}\n\
         {\"id\":\"BC\",\"x\":2,\"y\":2,\"adjacentSquares\":[\"BB\"],\"adjacentCircles\":[]}\n",
    )
    .unwrap();
    fs::write(&paths.connections, "").unwrap();

    let loaded = JsonlMarkerRepository::new(paths).load().unwrap();
    assert!(loaded.found_connections_file);
    assert!(loaded.connections.is_empty());

    let mut markers = loaded.markers;
    resync(&mut markers, &loaded.connections);
    assert!(markers.squares().iter().all(|s| s.adjacent_squares.is_empty()));
    assert_eq!(markers.squares()[0].id, Token::square("BB").unwrap());
}

#[test]
fn square_lines_carry_both_adjacency_lists() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    let (markers, connections) = sample();
    JsonlMarkerRepository::new(paths.clone())
        .save(&markers, &connections)
        .unwrap();

    let text = fs::read_to_string(&paths.squares).unwrap();
    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(
        first,
        serde_json::json!({
            "id": "BB",
            "x": 40,
            "y": 40,
            "adjacentSquares": ["BC"],
            "adjacentCircles": [1]
        })
    );

    let circles = fs::read_to_string(&paths.circles).unwrap();
    let second: serde_json::Value = serde_json::from_str(circles.lines().nth(1).unwrap()).unwrap();
    assert_eq!(second["x"], serde_json::json!(0.125));
    assert!(second.get("adjacentCircles").is_none());
}
