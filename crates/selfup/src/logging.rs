use std::fs::{File, OpenOptions};
use std::io::{self, Read as _, Seek as _, SeekFrom};
use std::path::Path;

#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use selfup_platform::AppPaths;

/// Open `path` for appending. When the file has grown past `max_size` it is
/// first cut down to its newest `max_size / 2` bytes, starting on a line
/// boundary.
fn open_capped(path: &Path, max_size: u64) -> io::Result<File> {
    let len = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => 0,
        Err(error) => return Err(error),
    };

    if len > max_size {
        let mut tail = Vec::new();
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(len - max_size / 2))?;
        file.read_to_end(&mut tail)?;
        let start = tail
            .iter()
            .position(|&b| b == b'\n')
            .map_or(0, |newline| newline + 1);
        std::fs::write(path, &tail[start..])?;
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global logger when debug logging is on: a file logger under
/// the data directory, plus a stderr logger in debug builds. With logging off
/// no logger is installed and every record is dropped.
pub fn init_logging(debug_enabled: bool, max_log_size: u64) {
    if !debug_enabled {
        return;
    }

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("selfup")
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));

    let log_path = AppPaths::new()
        .ok()
        .filter(|paths| paths.ensure_dirs().is_ok())
        .map(|paths| paths.log_file());
    let mut file_error = None;
    if let Some(path) = &log_path {
        match open_capped(path, max_log_size) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
            Err(error) => file_error = Some(error),
        }
    }

    if CombinedLogger::init(loggers).is_err() {
        return;
    }

    match (log_path, file_error) {
        (Some(path), None) => log::info!("Writing debug log to {}", path.display()),
        (Some(path), Some(error)) => {
            log::warn!("Cannot open debug log {}: {error}", path.display());
        }
        (None, _) => log::warn!("No data directory available for the debug log"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::open_capped;

    #[test]
    fn oversized_log_keeps_newest_whole_lines() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("debug.log");
        let lines: String = (1..=20).map(|n| format!("check {n:02}\n")).collect();
        std::fs::write(&log_path, &lines).expect("test log file should be written");

        drop(open_capped(&log_path, 90).expect("log should open"));

        let kept = std::fs::read_to_string(&log_path).expect("log should be readable");
        assert!(kept.len() <= 45);
        assert!(kept.starts_with("check "));
        assert!(kept.ends_with("check 20\n"));
        assert!(!kept.contains("check 01"));
    }

    #[test]
    fn log_under_the_cap_is_appended_to() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("debug.log");
        std::fs::write(&log_path, "check 01\n").expect("test log file should be written");

        let mut file = open_capped(&log_path, 1024).expect("log should open");
        file.write_all(b"check 02\n").expect("log should be writable");
        drop(file);

        let contents = std::fs::read_to_string(&log_path).expect("log should be readable");
        assert_eq!(contents, "check 01\ncheck 02\n");
    }

    #[test]
    fn missing_log_is_created() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("debug.log");

        drop(open_capped(&log_path, 1024).expect("log should be created"));

        assert!(log_path.exists());
    }
}
