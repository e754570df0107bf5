use std::path::{Path, PathBuf};

use log::info;

const DELETED_SUFFIX: &str = " (deleted)";

/// Path of the running executable.
///
/// After an in-place replace on Linux, `/proc/self/exe` points at the old,
/// unlinked inode and `current_exe()` reports it with a `" (deleted)"`
/// suffix. The suffix is stripped so callers get the path where the current
/// binary now lives.
///
/// # Errors
/// Returns an error if the executable path cannot be determined.
pub fn current_executable() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(strip_deleted_suffix(exe))
}

fn strip_deleted_suffix(exe: PathBuf) -> PathBuf {
    let path_str = exe.to_string_lossy();
    if let Some(trimmed) = path_str.strip_suffix(DELETED_SUFFIX) {
        let fixed = PathBuf::from(trimmed);
        info!("Adjusted exe path from deleted inode: {}", fixed.display());
        fixed
    } else {
        exe
    }
}

/// Directory holding the running executable.
///
/// # Errors
/// Returns an error if the executable path cannot be determined or has no
/// parent directory.
pub fn executable_dir() -> std::io::Result<PathBuf> {
    let exe = current_executable()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} has no parent directory", exe.display()),
        )
    })
}

/// Resolve `dir` against the executable's directory unless it is already
/// absolute.
///
/// # Errors
/// Returns an error if `dir` is relative and the executable directory cannot
/// be determined.
pub fn resolve_relative_to_executable(dir: &Path) -> std::io::Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(executable_dir()?.join(dir))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{executable_dir, resolve_relative_to_executable, strip_deleted_suffix};

    #[test]
    fn strip_deleted_suffix_removes_marker() {
        let fixed = strip_deleted_suffix(PathBuf::from("/usr/local/bin/app (deleted)"));
        assert_eq!(fixed, PathBuf::from("/usr/local/bin/app"));
    }

    #[test]
    fn strip_deleted_suffix_keeps_regular_paths() {
        let path = PathBuf::from("/usr/local/bin/app");
        assert_eq!(strip_deleted_suffix(path.clone()), path);
    }

    #[test]
    fn absolute_dirs_are_returned_unchanged() {
        let dir = std::env::temp_dir().join("selfup-state");
        let resolved = resolve_relative_to_executable(&dir).expect("absolute path should resolve");
        assert_eq!(resolved, dir);
    }

    #[test]
    fn relative_dirs_resolve_next_to_executable() {
        let resolved = resolve_relative_to_executable(std::path::Path::new("update"))
            .expect("relative path should resolve");
        let exe_dir = executable_dir().expect("test binary should have a directory");

        assert_eq!(resolved, exe_dir.join("update"));
    }
}
