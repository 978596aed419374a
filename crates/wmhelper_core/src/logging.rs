//! File logging bootstrap for the map helper.
//!
//! # Responsibility
//! - Start rotating file logs exactly once per process.
//! - Capture panics into the log before the default hook runs.
//!
//! # Invariants
//! - Re-initializing with identical settings is a no-op.
//! - Re-initializing with a different level or directory is rejected.
//! - Initialization never panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "wmhelper";
const ROTATE_AT_BYTES: u64 = 2 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_TEXT_LIMIT: usize = 160;
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static LOGGER: OnceCell<RunningLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    level: &'static str,
    dir: PathBuf,
}

struct RunningLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts file logging at `level` under `log_dir`.
///
/// # Errors
/// - `level` is not one of `trace|debug|info|warn|error`.
/// - `log_dir` is relative or cannot be created.
/// - Logging is already running with another level or directory.
pub fn init_logging(level: &str, log_dir: &Path) -> Result<(), String> {
    let wanted = LogSettings {
        level: parse_level(level)?,
        dir: checked_dir(log_dir)?,
    };

    let running = LOGGER.get_or_try_init(|| start(wanted.clone()))?;
    if running.settings == wanted {
        return Ok(());
    }
    Err(format!(
        "logging already running (level={}, dir={}); cannot switch to level={}, dir={}",
        running.settings.level,
        running.settings.dir.display(),
        wanted.level,
        wanted.dir.display()
    ))
}

/// `(level, log_dir)` of the running logger, if any.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGER
        .get()
        .map(|running| (running.settings.level, running.settings.dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(settings: LogSettings) -> Result<RunningLogger, String> {
    std::fs::create_dir_all(&settings.dir)
        .map_err(|err| format!("cannot create {}: {err}", settings.dir.display()))?;

    let handle = Logger::try_with_str(settings.level)
        .map_err(|err| format!("bad log spec {}: {err}", settings.level))?
        .log_to_file(
            FileSpec::default()
                .directory(&settings.dir)
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("logger did not start: {err}"))?;

    if PANIC_HOOK.set(()).is_ok() {
        install_panic_hook();
    }
    info!(
        "event=logging_init module=logging status=ok version={} level={} dir={}",
        env!("CARGO_PKG_VERSION"),
        settings.level,
        settings.dir.display()
    );

    Ok(RunningLogger {
        settings,
        _handle: handle,
    })
}

fn parse_level(raw: &str) -> Result<&'static str, String> {
    let wanted = match raw.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        other => other.to_string(),
    };
    LEVELS
        .iter()
        .copied()
        .find(|level| *level == wanted)
        .ok_or_else(|| format!("unknown log level {raw:?}; use one of {}", LEVELS.join("|")))
}

fn checked_dir(dir: &Path) -> Result<PathBuf, String> {
    if dir.as_os_str().is_empty() {
        return Err("log directory is empty".to_string());
    }
    if !dir.is_absolute() {
        return Err(format!("log directory must be absolute: {}", dir.display()));
    }
    Ok(dir.to_path_buf())
}

fn install_panic_hook() {
    let next = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "?".to_string(), |at| format!("{}:{}", at.file(), at.line()));
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&panic_text(info.payload()), PANIC_TEXT_LIMIT)
        );
        next(info);
    }));
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string payload>".to_string())
}

/// Flattens `value` onto one line and caps it at `max_chars`.
pub(crate) fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut capped: String = flattened.chars().take(max_chars).collect();
    capped.push_str("...");
    capped
}

#[cfg(test)]
mod tests {
    use super::{checked_dir, init_logging, logging_status, panic_text, parse_level, single_line};
    use std::path::Path;

    #[test]
    fn levels_are_case_insensitive_and_accept_warning() {
        assert_eq!(parse_level("INFO").unwrap(), "info");
        assert_eq!(parse_level(" warning ").unwrap(), "warn");
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn log_dir_must_be_absolute() {
        assert!(checked_dir(Path::new("logs/dev")).is_err());
        assert!(checked_dir(Path::new("")).is_err());
    }

    #[test]
    fn single_line_flattens_and_caps() {
        let flattened = single_line("bad\nline\rhere", 6);
        assert_eq!(flattened, "bad li...");
        assert_eq!(single_line("ok", 6), "ok");
    }

    #[test]
    fn panic_text_reads_both_string_kinds() {
        assert_eq!(panic_text(&"static"), "static");
        assert_eq!(panic_text(&String::from("owned")), "owned");
        assert_eq!(panic_text(&7_u8), "<non-string payload>");
    }

    #[test]
    fn second_init_must_match_the_first() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        init_logging("info", first.path()).unwrap();
        init_logging("info", first.path()).unwrap();
        assert!(init_logging("debug", first.path())
            .unwrap_err()
            .contains("cannot switch"));
        assert!(init_logging("info", second.path())
            .unwrap_err()
            .contains("cannot switch"));

        let (level, dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}
