//! Patch-and-replace of an executable on disk.
//!
//! A candidate executable is built in memory, either by applying a BSDIFF40
//! patch to the current bytes or by decompressing a gzip payload. It is only
//! written over the target after its SHA-256 matches the manifest, so a bad
//! payload never touches the installed binary.

use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::UpdateError;
use crate::fetch::ByteStream;
use crate::manifest::{Sha256Digest, hex_digest};

/// How an update payload turns into the new executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchMode {
    /// Payload is a binary diff against the current executable.
    Diff,
    /// Payload is the whole gzip-compressed executable.
    Replace,
}

impl std::fmt::Display for PatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diff => f.write_str("diff"),
            Self::Replace => f.write_str("replace"),
        }
    }
}

/// Patch-and-replace capability consumed by the updater.
///
/// Implementations must verify the candidate against `expected` before
/// committing it, and must leave the current executable untouched when
/// verification or installation fails.
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(
        &self,
        mode: PatchMode,
        payload: ByteStream,
        expected: &Sha256Digest,
    ) -> Result<(), UpdateError>;
}

/// Default [`Applier`] that rewrites an executable file.
#[derive(Debug, Clone)]
pub struct ExecutableApplier {
    target: PathBuf,
    running: bool,
}

impl ExecutableApplier {
    /// Target the currently running executable.
    ///
    /// # Errors
    /// Returns an error if the executable path cannot be determined.
    pub fn current() -> Result<Self, UpdateError> {
        let target = selfup_platform::current_executable()
            .map_err(|error| UpdateError::io("failed to get current executable", error))?;
        Ok(Self {
            target,
            running: true,
        })
    }

    /// Target an executable that is not the running process.
    #[must_use]
    pub fn at(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            running: false,
        }
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Remove a backup left behind by an earlier install, if any.
    pub fn remove_stale_backup(&self) {
        let backup = backup_path(&self.target);
        if backup.exists() {
            info!("Cleaning up previous executable: {}", backup.display());
            let _ = std::fs::remove_file(&backup);
        }
    }

    fn install(&self, candidate: &[u8]) -> Result<(), UpdateError> {
        let target = &self.target;
        let dir = target.parent().ok_or_else(|| {
            UpdateError::install(
                target,
                std::io::Error::new(std::io::ErrorKind::NotFound, "target has no parent directory"),
            )
        })?;

        let mut staged = tempfile::Builder::new()
            .prefix(".selfup-")
            .tempfile_in(dir)
            .map_err(|error| UpdateError::install(target, error))?;
        staged
            .write_all(candidate)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|error| UpdateError::install(target, error))?;

        let permissions = std::fs::metadata(target)
            .map_err(|error| UpdateError::install(target, error))?
            .permissions();
        std::fs::set_permissions(staged.path(), permissions)
            .map_err(|error| UpdateError::install(target, error))?;

        if self.running {
            info!("Replacing running executable via self-replace");
            self_replace::self_replace(staged.path())
                .map_err(|error| UpdateError::install(target, error))?;
            return Ok(());
        }

        replace_with_rollback(staged, target)
    }
}

#[async_trait]
impl Applier for ExecutableApplier {
    async fn apply(
        &self,
        mode: PatchMode,
        mut payload: ByteStream,
        expected: &Sha256Digest,
    ) -> Result<(), UpdateError> {
        let mut body = Vec::new();
        payload
            .read_to_end(&mut body)
            .await
            .map_err(|error| UpdateError::io("failed to read update payload", error))?;
        drop(payload);
        debug!("Read {} byte {mode} payload", body.len());

        let candidate = match mode {
            PatchMode::Diff => {
                let current = tokio::fs::read(&self.target)
                    .await
                    .map_err(|error| UpdateError::io("failed to read current executable", error))?;
                apply_bsdiff(&current, &body)?
            }
            PatchMode::Replace => gunzip(&body)?,
        };

        verify_digest(&candidate, expected)?;
        info!("Update checksum verified ({mode})");

        self.install(&candidate)?;
        info!("Installed new executable at {}", self.target.display());
        Ok(())
    }
}

fn apply_bsdiff(source: &[u8], patch: &[u8]) -> Result<Vec<u8>, UpdateError> {
    let patcher = qbsdiff::Bspatch::new(patch).map_err(UpdateError::Patch)?;
    let mut target = Vec::with_capacity(usize::try_from(patcher.hint_target_size()).unwrap_or(0));
    patcher
        .apply(source, std::io::Cursor::new(&mut target))
        .map_err(UpdateError::Patch)?;
    Ok(target)
}

fn gunzip(payload: &[u8]) -> Result<Vec<u8>, UpdateError> {
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(payload)
        .read_to_end(&mut decoded)
        .map_err(UpdateError::Decompress)?;
    Ok(decoded)
}

fn verify_digest(candidate: &[u8], expected: &Sha256Digest) -> Result<(), UpdateError> {
    let actual = Sha256::digest(candidate);
    if actual.as_slice() == expected.as_slice() {
        Ok(())
    } else {
        Err(UpdateError::HashMismatch {
            expected: hex_digest(expected),
            actual: hex_digest(&actual),
        })
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.old"))
}

fn replace_with_rollback(staged: tempfile::NamedTempFile, target: &Path) -> Result<(), UpdateError> {
    let backup = backup_path(target);
    if backup.exists() {
        std::fs::remove_file(&backup).map_err(|error| UpdateError::install(&backup, error))?;
    }

    std::fs::rename(target, &backup).map_err(|error| UpdateError::install(target, error))?;

    if let Err(persist) = staged.persist(target) {
        warn!("Install failed, restoring previous executable: {}", persist.error);
        if let Err(restore) = std::fs::rename(&backup, target) {
            error!(
                "Failed to restore {} from {}: {restore}",
                target.display(),
                backup.display()
            );
        }
        return Err(UpdateError::install(target, persist.error));
    }

    if let Err(error) = std::fs::remove_file(&backup) {
        debug!("Leaving previous executable at {}: {error}", backup.display());
    }
    Ok(())
}
