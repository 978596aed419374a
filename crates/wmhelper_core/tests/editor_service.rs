use std::cell::{Cell, RefCell};
use std::fs;
use tempfile::TempDir;
use wmhelper_core::{
    normalize_pair, ActiveEdit, ConnectionSet, DisplayKey, DraftError, EditAction, EditOutcome,
    EditorError, EditorService, ImageBounds, JsonlMarkerRepository, LoadedState, Marker,
    MarkerDraft, MarkerKind, MarkerRepository, MarkerStore, OverlayView, RepoResult, StorePaths,
    Token,
};

/// Repository double that records saves instead of touching files.
#[derive(Default)]
struct MemoryRepository {
    initial: LoadedState,
    saves: Cell<usize>,
    last_saved: RefCell<Option<(MarkerStore, ConnectionSet)>>,
}

impl MarkerRepository for MemoryRepository {
    fn load(&self) -> RepoResult<LoadedState> {
        Ok(self.initial.clone())
    }

    fn save(&self, markers: &MarkerStore, connections: &ConnectionSet) -> RepoResult<()> {
        self.saves.set(self.saves.get() + 1);
        *self.last_saved.borrow_mut() = Some((markers.clone(), connections.clone()));
        Ok(())
    }
}

fn bounds() -> ImageBounds {
    ImageBounds::new(100, 100)
}

fn sq(id: &str) -> Token {
    Token::square(id).unwrap()
}

fn memory_service(markers: Vec<Marker>, pairs: &[(&str, &str)]) -> EditorService<MemoryRepository> {
    let repo = MemoryRepository {
        initial: LoadedState {
            markers: MarkerStore::from_markers(markers),
            connections: pairs
                .iter()
                .map(|(a, b)| normalize_pair(a, b).unwrap())
                .collect(),
            found_connections_file: true,
            diagnostics: Vec::new(),
        },
        ..MemoryRepository::default()
    };
    EditorService::open(repo, bounds()).unwrap()
}

fn draft(id: &str, x: &str, y: &str) -> MarkerDraft {
    MarkerDraft {
        id: id.to_string(),
        x: x.to_string(),
        y: y.to_string(),
        ..MarkerDraft::default()
    }
}

#[test]
fn legacy_open_then_add_square_links_the_circle() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    fs::write(&paths.circles, "{\"id\":1,\"x\":10,\"y\":10}\n").unwrap();

    let mut service =
        EditorService::open(JsonlMarkerRepository::new(paths.clone()), bounds()).unwrap();
    assert!(service.migrated_legacy());
    assert!(service.list_connections().is_empty());
    assert!(!paths.connections.exists());

    let mut square = draft("BB", "5", "5");
    square.adjacent_circles = "1".to_string();
    service.add_marker(MarkerKind::Square, &square).unwrap();

    assert!(service
        .list_connections()
        .contains(&normalize_pair("1", "BB").unwrap()));
    assert_eq!(service.list_circles()[0].adjacent_squares, vec![sq("BB")]);
    assert_eq!(service.list_squares()[0].adjacent_circles, vec![1]);
    assert_eq!(
        fs::read_to_string(&paths.connections).unwrap(),
        "[\"1\",\"BB\"]\n"
    );
    assert_eq!(
        fs::read_to_string(&paths.circles).unwrap(),
        "{\"id\":1,\"x\":10,\"y\":10,\"adjacentSquares\":[\"BB\"]}\n"
    );
}

#[test]
fn deleting_a_square_drops_its_connections() {
    let mut service = memory_service(
        vec![
            Marker::square("BB", 1.0, 1.0).unwrap(),
            Marker::square("BC", 2.0, 2.0).unwrap(),
        ],
        &[("BB", "BC")],
    );
    assert_eq!(service.list_squares()[1].adjacent_squares, vec![sq("BB")]);

    let removed = service.delete_marker(MarkerKind::Square, 0).unwrap();
    assert_eq!(removed.id, sq("BB"));
    assert!(service.list_connections().is_empty());
    assert_eq!(service.list_squares().len(), 1);
    assert!(service.list_squares()[0].adjacent_squares.is_empty());
    assert_eq!(service.repository().saves.get(), 1);
    let saved = service.repository().last_saved.borrow();
    let (markers, connections) = saved.as_ref().unwrap();
    assert_eq!(markers.squares().len(), 1);
    assert!(connections.is_empty());
}

#[test]
fn rejected_drafts_change_nothing() {
    let mut service = memory_service(
        vec![
            Marker::square("BB", 1.0, 1.0).unwrap(),
            Marker::square("BC", 2.0, 2.0).unwrap(),
        ],
        &[],
    );
    let before = service.markers().clone();

    let err = service
        .add_marker(MarkerKind::Square, &draft("bb", "3", "3"))
        .unwrap_err();
    assert!(matches!(err, EditorError::Draft(DraftError::DuplicateSquareId(_))));
    assert_eq!(err.to_string(), "Square ID \"BB\" already exists.");

    let err = service
        .add_marker(MarkerKind::Circle, &draft("4", "100", "3"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Coordinates must be inside image bounds: x=0..99, y=0..99."
    );

    let mut bad_list = draft("5", "1", "1");
    bad_list.adjacent_squares = "BB, AE".to_string();
    assert!(matches!(
        service.add_marker(MarkerKind::Circle, &bad_list),
        Err(EditorError::Draft(DraftError::InvalidAdjacentSquare(_)))
    ));

    assert!(matches!(
        service.edit_marker(MarkerKind::Square, 1, EditAction::Save(draft("BB", "2", "2"))),
        Err(EditorError::Draft(DraftError::DuplicateSquareId(_)))
    ));

    assert_eq!(service.markers(), &before);
    assert_eq!(service.repository().saves.get(), 0);
}

#[test]
fn editing_keeps_own_id_and_rename_moves_connections() {
    let mut service = memory_service(
        vec![
            Marker::circle(7, 50.0, 50.0),
            Marker::square("BB", 1.0, 1.0).unwrap(),
            Marker::square("BC", 2.0, 2.0).unwrap(),
        ],
        &[("BB", "BC"), ("7", "BC")],
    );

    let stored = service.list_squares()[1].clone();
    let mut form = MarkerDraft::from_marker(&stored);
    assert_eq!(form.adjacent_squares, "BB");
    assert_eq!(form.adjacent_circles, "7");
    form.x = "2.5".to_string();
    let outcome = service
        .edit_marker(MarkerKind::Square, 1, EditAction::Save(form.clone()))
        .unwrap();
    let EditOutcome::Saved(saved) = outcome else {
        panic!("expected a save");
    };
    assert_eq!(saved.x, 2.5);
    assert_eq!(service.list_connections().len(), 2);

    form.id = "BD".to_string();
    service
        .edit_marker(MarkerKind::Square, 1, EditAction::Save(form))
        .unwrap();
    let lines: Vec<_> = service
        .list_connections()
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(lines, vec!["7--BD", "BB--BD"]);
    assert_eq!(service.list_squares()[0].adjacent_squares, vec![sq("BD")]);
    assert_eq!(service.list_circles()[0].adjacent_squares, vec![sq("BD")]);
}

#[test]
fn cancel_and_delete_actions() {
    let mut service = memory_service(
        vec![Marker::circle(1, 1.0, 1.0), Marker::square("BB", 1.0, 1.0).unwrap()],
        &[("1", "BB")],
    );
    assert_eq!(
        service
            .edit_marker(MarkerKind::Circle, 0, EditAction::Cancel)
            .unwrap(),
        EditOutcome::Cancelled
    );
    assert_eq!(service.repository().saves.get(), 0);

    assert!(matches!(
        service.edit_marker(MarkerKind::Circle, 3, EditAction::Delete),
        Err(EditorError::MarkerNotFound { index: 3, .. })
    ));

    let outcome = service
        .edit_marker(MarkerKind::Circle, 0, EditAction::Delete)
        .unwrap();
    assert!(matches!(outcome, EditOutcome::Deleted(marker) if marker.id == Token::circle(1)));
    assert!(service.list_connections().is_empty());
    assert!(service.list_squares()[0].adjacent_circles.is_empty());
}

#[test]
fn prepare_new_marker_snaps_and_allocates() {
    let service = memory_service(vec![Marker::square("BB", 1.0, 1.0).unwrap()], &[]);

    let square = service
        .prepare_new_marker(MarkerKind::Square, 12.26, 140.0)
        .unwrap();
    assert_eq!(square.id, "BC");
    assert_eq!(square.x, "12.5");
    assert_eq!(square.y, "99.5");

    let circle = service.prepare_new_marker(MarkerKind::Circle, -3.0, 4.0).unwrap();
    assert_eq!(circle.id, "");
    assert_eq!(circle.x, "0");
    assert_eq!(circle.y, "4");
}

#[test]
fn no_square_ids_left_aborts_the_add() {
    let mut store = MarkerStore::new();
    while let Some(id) = store.allocate_next_square_id() {
        store.add(Marker::new(id, 1.0, 1.0));
    }
    let service = memory_service(store.squares().to_vec(), &[]);
    assert!(matches!(
        service.prepare_new_marker(MarkerKind::Square, 1.0, 1.0),
        Err(EditorError::NoSquareIdsLeft)
    ));
}

#[test]
fn toggle_near_edits_only_the_preview() {
    let service = memory_service(
        vec![
            Marker::circle(1, 10.0, 10.0),
            Marker::square("BB", 20.0, 10.0).unwrap(),
            Marker::square("BC", 80.0, 80.0).unwrap(),
        ],
        &[],
    );

    let preview = service.list_squares()[1].clone();
    let (target, toggled) = service
        .toggle_adjacency_near(&preview, 11.0, 10.0, Some(1))
        .unwrap();
    assert_eq!(target, Token::circle(1));
    assert_eq!(toggled.adjacent_circles, vec![1]);
    assert!(service.list_connections().is_empty());

    let (target, toggled) = service
        .toggle_adjacency_near(&toggled, 21.0, 10.0, Some(1))
        .unwrap();
    assert_eq!(target, sq("BB"));
    assert_eq!(toggled.adjacent_squares, vec![sq("BB")]);

    let circle = service.list_circles()[0].clone();
    let (target, _) = service.toggle_adjacency_near(&circle, 10.0, 10.0, None).unwrap();
    assert_eq!(target, sq("BB"));
}

#[test]
fn toggle_near_without_candidates_fails() {
    let service = memory_service(vec![Marker::square("BB", 1.0, 1.0).unwrap()], &[]);
    let preview = service.list_squares()[0].clone();
    assert!(matches!(
        service.toggle_adjacency_near(&preview, 1.0, 1.0, Some(0)),
        Err(EditorError::NoAdjacencyTarget)
    ));
}

#[test]
fn toggle_connection_commits_immediately() {
    let mut service = memory_service(
        vec![Marker::circle(1, 1.0, 1.0), Marker::square("BB", 1.0, 1.0).unwrap()],
        &[],
    );
    assert!(service
        .toggle_connection(MarkerKind::Circle, 0, &sq("BB"))
        .unwrap());
    assert_eq!(service.list_squares()[0].adjacent_circles, vec![1]);
    assert!(!service
        .toggle_connection(MarkerKind::Square, 0, &Token::circle(1))
        .unwrap());
    assert!(service.list_connections().is_empty());
    assert_eq!(service.repository().saves.get(), 2);
    assert!(matches!(
        service.toggle_connection(MarkerKind::Circle, 0, &Token::circle(2)),
        Err(EditorError::InvalidAdjacencyTarget { .. })
    ));
}

#[test]
fn remove_connection_drops_dangling_pairs() {
    let mut service = memory_service(
        vec![Marker::square("BB", 1.0, 1.0).unwrap()],
        &[("BB", "BC"), ("1", "BC")],
    );
    let dangling: Vec<_> = service
        .list_connections()
        .dangling(service.markers())
        .cloned()
        .collect();
    assert_eq!(dangling.len(), 2);

    assert!(service.remove_connection(&normalize_pair("1", "BC").unwrap()).unwrap());
    assert!(!service.remove_connection(&normalize_pair("1", "BC").unwrap()).unwrap());
    assert_eq!(service.repository().saves.get(), 1);

    assert!(service.remove_connection(&normalize_pair("BC", "BB").unwrap()).unwrap());
    assert!(service.list_connections().is_empty());
    assert!(service.list_squares()[0].adjacent_squares.is_empty());
    let saved = service.repository().last_saved.borrow();
    assert!(saved.as_ref().unwrap().1.is_empty());
}

#[test]
fn overlay_replaces_the_edited_marker_with_its_preview() {
    let service = memory_service(
        vec![
            Marker::circle(1, 10.0, 10.0),
            Marker::square("BB", 20.0, 10.0).unwrap(),
            Marker::square("BC", 30.0, 10.0).unwrap(),
        ],
        &[("1", "BB")],
    );
    let preview = service
        .preview_draft(MarkerKind::Square, Some(0), &{
            let mut form = MarkerDraft::from_marker(&service.list_squares()[0]);
            form.adjacent_circles = String::new();
            form.adjacent_squares = "BC".to_string();
            form
        })
        .unwrap();
    let edit = ActiveEdit {
        target: Some((MarkerKind::Square, 0)),
        preview: Some(preview),
    };

    let view = OverlayView::build(service.markers(), service.list_connections(), Some(&edit));
    let selected = DisplayKey::Stored {
        kind: MarkerKind::Square,
        index: 0,
    };
    assert_eq!(view.selected(), Some(selected));
    assert_eq!(view.entries().len(), 3);
    assert!(view.is_highlighted_square(&sq("BC")));
    assert!(!view.is_highlighted_circle(1));

    let segments = view.segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].connection, normalize_pair("BB", "BC").unwrap());
    assert!(segments[0].selected);
    assert_eq!(segments[0].from.key, selected);
    assert_eq!(service.list_connections().len(), 1);
}

#[test]
fn overlay_shows_a_new_marker_preview() {
    let service = memory_service(vec![Marker::circle(1, 10.0, 10.0)], &[]);
    let mut form = draft("BB", "12", "12");
    form.adjacent_circles = "1".to_string();
    let edit = ActiveEdit {
        target: None,
        preview: service.preview_draft(MarkerKind::Square, None, &form),
    };

    let view = OverlayView::build(service.markers(), service.list_connections(), Some(&edit));
    let preview_key = DisplayKey::Preview(MarkerKind::Square);
    assert_eq!(view.selected(), Some(preview_key));
    assert_eq!(view.entries().last().unwrap().key, preview_key);
    let segments = view.segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].to.key, preview_key);
}
