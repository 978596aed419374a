//! Repository contract and the three-file JSONL implementation.
//!
//! # Responsibility
//! - Read `circles.jsonl`, `squares.jsonl` and `connections.jsonl`.
//! - Rewrite all three files after every committed mutation.
//!
//! # Invariants
//! - Missing marker files load as empty lists.
//! - A missing connections file is reported through `found_connections_file`
//!   so the caller can run legacy migration; it is never an error.
//! - Each file is written to a sibling temporary file and renamed into place.

use crate::config::StorePaths;
use crate::model::marker::{Marker, MarkerKind};
use crate::repo::codec::LineDiagnostic;
use crate::repo::{RepoError, RepoResult};
use crate::store::connection_set::ConnectionSet;
use crate::store::marker_store::MarkerStore;
use log::{error, info};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything read from persistence, before migration and resync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedState {
    pub markers: MarkerStore,
    /// Empty when `found_connections_file` is `false`.
    pub connections: ConnectionSet,
    pub found_connections_file: bool,
    pub diagnostics: Vec<LineDiagnostic>,
}

/// Persistence contract used by `EditorService`.
pub trait MarkerRepository {
    fn load(&self) -> RepoResult<LoadedState>;
    fn save(&self, markers: &MarkerStore, connections: &ConnectionSet) -> RepoResult<()>;
}

/// File-backed repository over `StorePaths`.
#[derive(Debug, Clone)]
pub struct JsonlMarkerRepository {
    paths: StorePaths,
}

impl JsonlMarkerRepository {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }
}

impl MarkerRepository for JsonlMarkerRepository {
    fn load(&self) -> RepoResult<LoadedState> {
        let started_at = Instant::now();
        info!("event=store_load module=repo status=start");

        let result = self.load_files();
        match &result {
            Ok(state) => info!(
                "event=store_load module=repo status=ok duration_ms={} circles={} squares={} connections={} connections_file={} skipped_lines={}",
                started_at.elapsed().as_millis(),
                state.markers.circles().len(),
                state.markers.squares().len(),
                state.connections.len(),
                state.found_connections_file,
                state.diagnostics.len()
            ),
            Err(err) => error!(
                "event=store_load module=repo status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn save(&self, markers: &MarkerStore, connections: &ConnectionSet) -> RepoResult<()> {
        let started_at = Instant::now();

        let result = write_replacing(&self.paths.circles, |writer| {
            markers.save_kind(MarkerKind::Circle, writer)
        })
        .and_then(|()| {
            write_replacing(&self.paths.squares, |writer| {
                markers.save_kind(MarkerKind::Square, writer)
            })
        })
        .and_then(|()| write_replacing(&self.paths.connections, |writer| connections.save(writer)));

        match &result {
            Ok(()) => info!(
                "event=store_save module=repo status=ok duration_ms={} circles={} squares={} connections={}",
                started_at.elapsed().as_millis(),
                markers.circles().len(),
                markers.squares().len(),
                connections.len()
            ),
            Err(err) => error!(
                "event=store_save module=repo status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

impl JsonlMarkerRepository {
    fn load_files(&self) -> RepoResult<LoadedState> {
        let (circles, mut diagnostics) = load_markers(MarkerKind::Circle, &self.paths.circles)?;
        let (squares, square_diagnostics) =
            load_markers(MarkerKind::Square, &self.paths.squares)?;
        diagnostics.extend(square_diagnostics);

        let loaded = ConnectionSet::load_from_file(
            &source_label(&self.paths.connections),
            open_optional(&self.paths.connections)?,
        )
        .map_err(|source| RepoError::Read {
            path: self.paths.connections.clone(),
            source,
        })?;
        diagnostics.extend(loaded.diagnostics);

        Ok(LoadedState {
            markers: MarkerStore::from_markers(circles.into_iter().chain(squares)),
            connections: loaded.connections,
            found_connections_file: loaded.found_file,
            diagnostics,
        })
    }
}

fn load_markers(
    kind: MarkerKind,
    path: &Path,
) -> RepoResult<(Vec<Marker>, Vec<LineDiagnostic>)> {
    let Some(reader) = open_optional(path)? else {
        return Ok((Vec::new(), Vec::new()));
    };
    MarkerStore::load_kind(kind, &source_label(path), reader).map_err(|source| {
        RepoError::Read {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn open_optional(path: &Path) -> RepoResult<Option<BufReader<File>>> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RepoError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_replacing<F>(path: &Path, write: F) -> RepoResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let wrap = |source: std::io::Error| RepoError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    let staging = staging_path(path);
    let mut writer = BufWriter::new(File::create(&staging).map_err(wrap)?);
    write(&mut writer).map_err(wrap)?;
    let file = writer
        .into_inner()
        .map_err(|err| wrap(err.into_error()))?;
    file.sync_all().map_err(wrap)?;
    drop(file);

    fs::rename(&staging, path).map_err(wrap)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
