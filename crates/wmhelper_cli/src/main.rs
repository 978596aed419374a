//! Command-line front end for the marker editor.
//!
//! # Responsibility
//! - Resolve image bounds, data and log locations at startup.
//! - Map each subcommand onto one `EditorService` operation.
//!
//! # Invariants
//! - A missing or unreadable image aborts before any data file is touched.
//! - Every mutating subcommand commits through the service, which resyncs and
//!   rewrites all three files.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use wmhelper_core::service::draft::format_coord;
use wmhelper_core::{
    default_log_level, init_logging, nearest_any, nearest_circle, nearest_square, normalize_pair,
    normalize_token, EditAction, EditOutcome, EditorConfig, EditorService, ImageBounds,
    JsonlMarkerRepository, Marker, MarkerDraft, MarkerKind, Token,
};

#[derive(Parser)]
#[command(name = "wmhelper")]
#[command(about = "Place and connect circle/square markers on a map image", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding circles.jsonl, squares.jsonl and connections.jsonl
    #[arg(long, env = "WMHELPER_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Map image; its pixel size becomes the coordinate bounds
    #[arg(long, conflicts_with_all = ["width", "height"])]
    image: Option<PathBuf>,

    /// Image width when no image file is given
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Image height when no image file is given
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Log directory (defaults to <data-dir>/logs)
    #[arg(long, env = "WMHELPER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print marker and connection counts
    Summary,

    /// List skipped lines and connections to missing markers
    Check,

    /// Rewrite all files in canonical form (creates connections.jsonl)
    Migrate,

    /// Print the id the next new square would get
    NextSquareId,

    /// Add a circle marker
    AddCircle {
        id: String,
        x: f64,
        y: f64,

        /// Comma-separated adjacent square ids
        #[arg(long, default_value = "")]
        squares: String,
    },

    /// Add a square marker
    AddSquare {
        x: f64,
        y: f64,

        /// Square id (defaults to the next free id)
        #[arg(long)]
        id: Option<String>,

        /// Comma-separated adjacent square ids
        #[arg(long, default_value = "")]
        squares: String,

        /// Comma-separated adjacent circle ids
        #[arg(long, default_value = "")]
        circles: String,
    },

    /// Change fields of a stored marker
    Edit {
        /// Marker id (circle number or square code)
        id: String,

        #[arg(long)]
        new_id: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        x: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        y: Option<String>,

        /// Replacement comma-separated adjacent square ids
        #[arg(long)]
        squares: Option<String>,

        /// Replacement comma-separated adjacent circle ids (squares only)
        #[arg(long)]
        circles: Option<String>,
    },

    /// Delete a marker and all of its connections
    Delete { id: String },

    /// Connect two markers
    Connect { a: String, b: String },

    /// Remove the connection between two markers
    Disconnect { a: String, b: String },

    /// Find the marker nearest to a point
    Nearest {
        x: f64,
        y: f64,

        /// Restrict to circles or squares
        #[arg(long, value_parser = ["circle", "square"])]
        kind: Option<String>,
    },
}

type Service = EditorService<JsonlMarkerRepository>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let bounds = resolve_bounds(&cli)?;
    let log_dir = absolute(
        cli.log_dir
            .clone()
            .unwrap_or_else(|| cli.data_dir.join("logs")),
    )?;
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &log_dir)
        .map_err(|err| anyhow!("failed to start logging: {err}"))?;

    let config = EditorConfig::new(&cli.data_dir, bounds);
    let mut service = EditorService::open(JsonlMarkerRepository::new(config.paths), config.bounds)
        .with_context(|| format!("failed to load markers from {}", cli.data_dir.display()))?;
    info!(
        "event=cli_start module=cli status=ok width={} height={}",
        bounds.width, bounds.height
    );

    run(&mut service, cli.command)
}

fn resolve_bounds(cli: &Cli) -> Result<ImageBounds> {
    match (&cli.image, cli.width, cli.height) {
        (Some(image), _, _) => image_bounds(image),
        (None, Some(width), Some(height)) if width > 0 && height > 0 => {
            Ok(ImageBounds::new(width, height))
        }
        (None, Some(_), Some(_)) => bail!("--width and --height must be positive"),
        _ => bail!("pass --image <path> or --width/--height to set the map bounds"),
    }
}

/// Log files need an absolute directory.
fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("failed to resolve the working directory")?;
    Ok(cwd.join(path))
}

fn image_bounds(path: &Path) -> Result<ImageBounds> {
    if !path.is_file() {
        bail!("image not found: {}", path.display());
    }
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("failed to read image size from {}", path.display()))?;
    Ok(ImageBounds::new(width, height))
}

fn run(service: &mut Service, command: Command) -> Result<()> {
    match command {
        Command::Summary => summary(service),
        Command::Check => check(service),
        Command::Migrate => {
            service.persist()?;
            println!(
                "rewrote {} markers and {} connections",
                service.markers().len(),
                service.list_connections().len()
            );
        }
        Command::NextSquareId => match service.markers().allocate_next_square_id() {
            Some(id) => println!("{id}"),
            None => bail!("no more two-consonant square ids available"),
        },
        Command::AddCircle { id, x, y, squares } => {
            let mut draft = service.prepare_new_marker(MarkerKind::Circle, x, y)?;
            exact_position(&mut draft, x, y);
            draft.id = id;
            draft.adjacent_squares = squares;
            let index = service.add_marker(MarkerKind::Circle, &draft)?;
            print_marker(&service.list_circles()[index]);
        }
        Command::AddSquare {
            x,
            y,
            id,
            squares,
            circles,
        } => {
            let mut draft = service.prepare_new_marker(MarkerKind::Square, x, y)?;
            exact_position(&mut draft, x, y);
            if let Some(id) = id {
                draft.id = id;
            }
            draft.adjacent_squares = squares;
            draft.adjacent_circles = circles;
            let index = service.add_marker(MarkerKind::Square, &draft)?;
            print_marker(&service.list_squares()[index]);
        }
        Command::Edit {
            id,
            new_id,
            x,
            y,
            squares,
            circles,
        } => {
            let (kind, index) = locate(service, &id)?;
            let mut draft = MarkerDraft::from_marker(&service.markers().markers(kind)[index]);
            draft.id = new_id.unwrap_or(draft.id);
            draft.x = x.unwrap_or(draft.x);
            draft.y = y.unwrap_or(draft.y);
            draft.adjacent_squares = squares.unwrap_or(draft.adjacent_squares);
            draft.adjacent_circles = circles.unwrap_or(draft.adjacent_circles);
            if let EditOutcome::Saved(marker) =
                service.edit_marker(kind, index, EditAction::Save(draft))?
            {
                print_marker(&marker);
            }
        }
        Command::Delete { id } => {
            let (kind, index) = locate(service, &id)?;
            let removed = service.delete_marker(kind, index)?;
            println!("deleted {} {}", kind, removed.id);
        }
        Command::Connect { a, b } => set_connected(service, &a, &b, true)?,
        Command::Disconnect { a, b } => set_connected(service, &a, &b, false)?,
        Command::Nearest { x, y, kind } => {
            let found = match kind.as_deref() {
                Some("circle") => nearest_circle(service.markers(), x, y).map(|(_, m)| m),
                Some("square") => nearest_square(service.markers(), x, y, None).map(|(_, m)| m),
                _ => nearest_any(service.markers(), x, y).map(|(_, _, m)| m),
            };
            match found {
                Some(marker) => print_marker(marker),
                None => println!("no markers"),
            }
        }
    }
    Ok(())
}

/// Typed coordinates are validated as given rather than snapped like clicks.
fn exact_position(draft: &mut MarkerDraft, x: f64, y: f64) {
    draft.x = format_coord(x);
    draft.y = format_coord(y);
}

fn summary(service: &Service) {
    println!("circles:     {}", service.list_circles().len());
    println!("squares:     {}", service.list_squares().len());
    println!("connections: {}", service.list_connections().len());
    if service.migrated_legacy() {
        println!("connections rebuilt from marker adjacency (no connections file yet)");
    }
    if !service.load_diagnostics().is_empty() {
        println!("skipped lines: {}", service.load_diagnostics().len());
    }
}

fn check(service: &Service) {
    let mut problems = 0;
    for diagnostic in service.load_diagnostics() {
        println!("{diagnostic}");
        problems += 1;
    }
    for connection in service.list_connections().dangling(service.markers()) {
        println!("connection {connection} refers to a missing marker");
        problems += 1;
    }
    if problems == 0 {
        println!("ok");
    }
}

/// Finds the stored marker for a raw id; the first match wins for duplicates.
fn locate(service: &Service, raw: &str) -> Result<(MarkerKind, usize)> {
    let token = normalize_token(raw).with_context(|| format!("invalid marker id {raw:?}"))?;
    let kind = token.kind();
    service
        .markers()
        .markers(kind)
        .iter()
        .position(|marker| marker.id == token)
        .map(|index| (kind, index))
        .ok_or_else(|| anyhow!("no {kind} with id {token}"))
}

fn set_connected(service: &mut Service, a: &str, b: &str, connected: bool) -> Result<()> {
    let connection = normalize_pair(a, b).with_context(|| format!("cannot connect {a} and {b}"))?;
    if service.list_connections().contains(&connection) == connected {
        println!("{connection} unchanged");
        return Ok(());
    }

    // The square side can hold either kind of neighbour.
    let (owner, other) = if connection.second().is_square() {
        (connection.second(), connection.first())
    } else {
        (connection.first(), connection.second())
    };
    let owner_found = locate(service, owner.as_str());
    if !connected && owner_found.is_err() {
        // Dangling connection: no marker is left to toggle it through.
        service.remove_connection(&connection)?;
        println!("{connection} disconnected");
        return Ok(());
    }
    let (kind, index) = owner_found?;
    if connected {
        locate(service, other.as_str())?;
    }
    let target: Token = other.clone();
    let now_connected = service.toggle_connection(kind, index, &target)?;
    println!(
        "{connection} {}",
        if now_connected { "connected" } else { "disconnected" }
    );
    Ok(())
}

fn print_marker(marker: &Marker) {
    let squares: Vec<String> = marker.adjacent_squares.iter().map(Token::to_string).collect();
    print!(
        "{} {} x={} y={} squares=[{}]",
        marker.kind(),
        marker.id,
        marker.x,
        marker.y,
        squares.join(",")
    );
    if marker.kind() == MarkerKind::Square {
        let circles: Vec<String> = marker.adjacent_circles.iter().map(i64::to_string).collect();
        print!(" circles=[{}]", circles.join(","));
    }
    println!();
}
