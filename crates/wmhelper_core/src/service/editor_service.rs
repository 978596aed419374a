//! Marker editing use-case service.
//!
//! # Responsibility
//! - Own the in-memory marker store and connection set for one editing session.
//! - Provide the add / edit / delete / toggle entry points the input layer calls.
//! - Persist all three files after every committed mutation.
//!
//! # Invariants
//! - The connection set is canonical; marker adjacency is resynced from it
//!   before every save and after open.
//! - A rejected draft leaves stores and files untouched.
//! - Service APIs never write files except through the repository.

use crate::config::ImageBounds;
use crate::model::connection::Connection;
use crate::model::marker::{Marker, MarkerKind};
use crate::model::token::Token;
use crate::repo::codec::LineDiagnostic;
use crate::repo::jsonl_repo::MarkerRepository;
use crate::repo::RepoError;
use crate::search::spatial::{nearest_adjacency_target_for_square, nearest_square};
use crate::service::adjacency_sync::{migrate_legacy, resync};
use crate::service::draft::{DraftContext, DraftError, MarkerDraft};
use crate::store::connection_set::ConnectionSet;
use crate::store::marker_store::{MarkerStore, StoreError};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Error type for editor use-cases.
#[derive(Debug)]
pub enum EditorError {
    /// Draft failed validation; nothing was changed.
    Draft(DraftError),
    /// Every two-consonant square id is taken.
    NoSquareIdsLeft,
    MarkerNotFound { kind: MarkerKind, index: usize },
    /// No marker near the clicked point can be toggled.
    NoAdjacencyTarget,
    /// `target` cannot be adjacent to a marker of kind `marker`.
    InvalidAdjacencyTarget { marker: MarkerKind, target: Token },
    Store(StoreError),
    Repo(RepoError),
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft(err) => write!(f, "{err}"),
            Self::NoSquareIdsLeft => write!(f, "No more two-consonant square IDs available."),
            Self::MarkerNotFound { kind, index } => write!(f, "no {kind} at index {index}"),
            Self::NoAdjacencyTarget => write!(f, "no marker near that point to toggle"),
            Self::InvalidAdjacencyTarget { marker, target } => {
                write!(f, "{target} cannot be adjacent to a {marker}")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Draft(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DraftError> for EditorError {
    fn from(value: DraftError) -> Self {
        Self::Draft(value)
    }
}

impl From<StoreError> for EditorError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::IndexOutOfRange { kind, index } => Self::MarkerNotFound { kind, index },
            other => Self::Store(other),
        }
    }
}

impl From<RepoError> for EditorError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Result alias for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// How the operator closed the edit dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    Save(MarkerDraft),
    Cancel,
    Delete,
}

/// What an edit did to the stores.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// Stored marker after resync.
    Saved(Marker),
    Cancelled,
    Deleted(Marker),
}

/// Editing session over one data directory.
pub struct EditorService<R: MarkerRepository> {
    repo: R,
    bounds: ImageBounds,
    markers: MarkerStore,
    connections: ConnectionSet,
    diagnostics: Vec<LineDiagnostic>,
    migrated_legacy: bool,
}

impl<R: MarkerRepository> EditorService<R> {
    /// Loads persisted state and projects adjacency from connections.
    ///
    /// # Contract
    /// - Without a connections file, connections are built from the markers'
    ///   embedded adjacency. Nothing is written until the first mutation.
    /// - Skipped lines are kept in `load_diagnostics`.
    pub fn open(repo: R, bounds: ImageBounds) -> EditorResult<Self> {
        let loaded = repo.load()?;
        let migrated_legacy = !loaded.found_connections_file;
        let connections = if migrated_legacy {
            migrate_legacy(&loaded.markers)
        } else {
            loaded.connections
        };
        let mut markers = loaded.markers;
        resync(&mut markers, &connections);

        if !loaded.diagnostics.is_empty() {
            warn!(
                "event=session_open module=service status=degraded skipped_lines={}",
                loaded.diagnostics.len()
            );
        }
        info!(
            "event=session_open module=service status=ok circles={} squares={} connections={} migrated={}",
            markers.circles().len(),
            markers.squares().len(),
            connections.len(),
            migrated_legacy
        );

        Ok(Self {
            repo,
            bounds,
            markers,
            connections,
            diagnostics: loaded.diagnostics,
            migrated_legacy,
        })
    }

    pub fn bounds(&self) -> ImageBounds {
        self.bounds
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    pub fn list_circles(&self) -> &[Marker] {
        self.markers.circles()
    }

    pub fn list_squares(&self) -> &[Marker] {
        self.markers.squares()
    }

    pub fn list_connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// Lines skipped while loading.
    pub fn load_diagnostics(&self) -> &[LineDiagnostic] {
        &self.diagnostics
    }

    /// `true` when connections were rebuilt from embedded adjacency on open.
    pub fn migrated_legacy(&self) -> bool {
        self.migrated_legacy
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Ids a square draft must not reuse; `editing` is the square being edited.
    pub fn used_square_ids(&self, kind: MarkerKind, editing: Option<usize>) -> BTreeSet<Token> {
        match kind {
            MarkerKind::Circle => BTreeSet::new(),
            MarkerKind::Square => self.markers.used_square_ids(editing),
        }
    }

    /// Strict draft validation against the current session.
    pub fn validate_draft(
        &self,
        kind: MarkerKind,
        editing: Option<usize>,
        draft: &MarkerDraft,
    ) -> Result<Marker, DraftError> {
        let used = self.used_square_ids(kind, editing);
        draft.build(&self.draft_context(kind, &used))
    }

    /// Lenient draft parse for the live overlay preview.
    pub fn preview_draft(
        &self,
        kind: MarkerKind,
        editing: Option<usize>,
        draft: &MarkerDraft,
    ) -> Option<Marker> {
        let used = self.used_square_ids(kind, editing);
        draft.preview(&self.draft_context(kind, &used))
    }

    /// Pre-fills the form for a marker placed at the clicked point.
    ///
    /// # Contract
    /// - Coordinates are clamped into the image and snapped to 0.5.
    /// - Squares get the next free id; circles start with a blank id.
    /// - Fails with `NoSquareIdsLeft` before any dialog would open.
    pub fn prepare_new_marker(&self, kind: MarkerKind, x: f64, y: f64) -> EditorResult<MarkerDraft> {
        let (x, y) = self.bounds.snap_inside(x, y);
        match kind {
            MarkerKind::Circle => Ok(MarkerDraft::for_new_marker(None, x, y)),
            MarkerKind::Square => {
                let id = self
                    .markers
                    .allocate_next_square_id()
                    .ok_or(EditorError::NoSquareIdsLeft)?;
                Ok(MarkerDraft::for_new_marker(Some(&id), x, y))
            }
        }
    }

    /// Validates `draft`, appends the marker and persists.
    ///
    /// Returns the new marker's index within its kind.
    pub fn add_marker(&mut self, kind: MarkerKind, draft: &MarkerDraft) -> EditorResult<usize> {
        let marker = self.validate_draft(kind, None, draft)?;
        self.connections.add_marker(&marker);
        let token = marker.id.clone();
        let index = self.markers.add(marker);
        info!(
            "event=marker_add module=service status=ok kind={} id={} index={}",
            kind, token, index
        );
        self.persist()?;
        Ok(index)
    }

    /// Applies the operator's choice from the edit dialog.
    ///
    /// # Contract
    /// - `Save` revalidates the draft; on failure nothing changes.
    /// - Saving replaces every connection of the old token with those the
    ///   updated marker's adjacency implies.
    /// - `Delete` removes the marker and every connection touching its token.
    pub fn edit_marker(
        &mut self,
        kind: MarkerKind,
        index: usize,
        action: EditAction,
    ) -> EditorResult<EditOutcome> {
        if self.markers.get(kind, index).is_none() {
            return Err(EditorError::MarkerNotFound { kind, index });
        }
        match action {
            EditAction::Cancel => Ok(EditOutcome::Cancelled),
            EditAction::Delete => self.delete_marker(kind, index).map(EditOutcome::Deleted),
            EditAction::Save(draft) => {
                let updated = self.validate_draft(kind, Some(index), &draft)?;
                self.commit_replacement(kind, index, updated)
                    .map(EditOutcome::Saved)
            }
        }
    }

    /// Removes a marker and all connections touching its token, then persists.
    pub fn delete_marker(&mut self, kind: MarkerKind, index: usize) -> EditorResult<Marker> {
        let removed = self.markers.remove(kind, index)?;
        let dropped = self.connections.remove_all_containing(removed.token());
        info!(
            "event=marker_delete module=service status=ok kind={} id={} connections_removed={}",
            kind, removed.id, dropped
        );
        self.persist()?;
        Ok(removed)
    }

    /// Toggles adjacency between the preview and the marker nearest `(x, y)`.
    ///
    /// # Contract
    /// - Circle previews target the nearest square.
    /// - Square previews target the nearest square (other than
    ///   `editing_square`) or circle, squares winning ties.
    /// - Only the returned preview changes; commit it through `edit_marker`
    ///   or `add_marker`.
    pub fn toggle_adjacency_near(
        &self,
        preview: &Marker,
        x: f64,
        y: f64,
        editing_square: Option<usize>,
    ) -> EditorResult<(Token, Marker)> {
        let target = match preview.kind() {
            MarkerKind::Circle => nearest_square(&self.markers, x, y, None).map(|(_, m)| m),
            MarkerKind::Square => {
                nearest_adjacency_target_for_square(&self.markers, x, y, editing_square)
                    .map(|(_, m)| m)
            }
        }
        .ok_or(EditorError::NoAdjacencyTarget)?;

        let token = target.id.clone();
        let updated = toggle_adjacency(preview, &token)?;
        Ok((token, updated))
    }

    /// Toggles the connection between a stored marker and `target` and persists.
    ///
    /// Returns `true` when the connection exists afterwards.
    pub fn toggle_connection(
        &mut self,
        kind: MarkerKind,
        index: usize,
        target: &Token,
    ) -> EditorResult<bool> {
        let current = self
            .markers
            .get(kind, index)
            .ok_or(EditorError::MarkerNotFound { kind, index })?;
        let updated = toggle_adjacency(current, target)?;
        let connection = Connection::new(updated.id.clone(), target.clone()).map_err(|_| {
            EditorError::InvalidAdjacencyTarget {
                marker: kind,
                target: target.clone(),
            }
        })?;
        self.commit_replacement(kind, index, updated)?;
        Ok(self.connections.contains(&connection))
    }

    /// Drops `connection` from the set and persists.
    ///
    /// Works even when an endpoint marker no longer exists. Returns `false`
    /// without saving when the connection was absent.
    pub fn remove_connection(&mut self, connection: &Connection) -> EditorResult<bool> {
        if !self.connections.remove(connection) {
            return Ok(false);
        }
        info!(
            "event=connection_remove module=service status=ok connection={}",
            connection
        );
        self.persist()?;
        Ok(true)
    }

    /// Resyncs adjacency and writes all three files.
    pub fn persist(&mut self) -> EditorResult<()> {
        resync(&mut self.markers, &self.connections);
        self.repo.save(&self.markers, &self.connections)?;
        Ok(())
    }

    fn commit_replacement(
        &mut self,
        kind: MarkerKind,
        index: usize,
        updated: Marker,
    ) -> EditorResult<Marker> {
        let previous = self.markers.replace(kind, index, updated.clone())?;
        self.connections.replace_marker(&previous, &updated);
        info!(
            "event=marker_edit module=service status=ok kind={} old_id={} new_id={}",
            kind, previous.id, updated.id
        );
        self.persist()?;
        self.markers
            .get(kind, index)
            .cloned()
            .ok_or(EditorError::MarkerNotFound { kind, index })
    }

    fn draft_context<'a>(&self, kind: MarkerKind, used: &'a BTreeSet<Token>) -> DraftContext<'a> {
        DraftContext {
            kind,
            bounds: self.bounds,
            used_square_ids: used,
        }
    }
}

/// Adds `target` to the preview's adjacency, or removes it when present.
///
/// Circles only accept squares; a square never accepts itself.
pub fn toggle_adjacency(preview: &Marker, target: &Token) -> EditorResult<Marker> {
    let invalid = || EditorError::InvalidAdjacencyTarget {
        marker: preview.kind(),
        target: target.clone(),
    };
    let mut updated = preview.clone();
    match (preview.kind(), target.circle_id()) {
        (_, None) => {
            if target == preview.token() {
                return Err(invalid());
            }
            toggle_in(&mut updated.adjacent_squares, target.clone());
        }
        (MarkerKind::Square, Some(circle)) => toggle_in(&mut updated.adjacent_circles, circle),
        (MarkerKind::Circle, Some(_)) => return Err(invalid()),
    }
    Ok(updated)
}

fn toggle_in<T: Ord>(list: &mut Vec<T>, value: T) {
    if let Some(position) = list.iter().position(|item| item == &value) {
        list.remove(position);
    } else {
        list.push(value);
        list.sort();
    }
}
