use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::io::AsyncReadExt;

use crate::apply::{Applier, ExecutableApplier, PatchMode};
use crate::config::UpdaterConfig;
use crate::error::UpdateError;
use crate::fetch::{ByteStream, Fetcher, HttpFetcher};
use crate::manifest::Manifest;
use crate::schedule::CheckSchedule;

/// Result of a successful update pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The schedule gate declined to run a check.
    NotDue,
    /// The manifest advertises the running version.
    UpToDate,
    /// Installed `version` by applying a binary diff.
    Patched { version: String },
    /// Installed `version` from the full binary after the patch failed.
    Replaced { version: String },
}

impl UpdateOutcome {
    #[must_use]
    pub fn installed_version(&self) -> Option<&str> {
        match self {
            Self::Patched { version } | Self::Replaced { version } => Some(version),
            Self::NotDue | Self::UpToDate => None,
        }
    }
}

/// Checks a release manifest and replaces the running executable.
///
/// ```no_run
/// # async fn run() -> Result<(), selfup_core::UpdateError> {
/// use selfup_core::{Updater, UpdaterConfig};
///
/// let config = UpdaterConfig::new("myapp", env!("CARGO_PKG_VERSION"), "https://updates.example.com/");
/// let updater = Updater::new(config)?;
/// tokio::spawn(async move { updater.background_run().await });
/// # Ok(())
/// # }
/// ```
pub struct Updater {
    config: UpdaterConfig,
    fetcher: Arc<dyn Fetcher>,
    applier: Arc<dyn Applier>,
}

impl Updater {
    /// Build an updater that fetches over HTTP and replaces the running
    /// executable.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the running
    /// executable cannot be located.
    pub fn new(config: UpdaterConfig) -> Result<Self, UpdateError> {
        Ok(Self::with_parts(
            config,
            Arc::new(HttpFetcher::new()?),
            Arc::new(ExecutableApplier::current()?),
        ))
    }

    #[must_use]
    pub fn with_parts(
        config: UpdaterConfig,
        fetcher: Arc<dyn Fetcher>,
        applier: Arc<dyn Applier>,
    ) -> Self {
        Self {
            config,
            fetcher,
            applier,
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_applier(mut self, applier: Arc<dyn Applier>) -> Self {
        self.applier = applier;
        self
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Schedule gate stored in the resolved state directory.
    ///
    /// # Errors
    /// Returns an error if the state directory cannot be resolved.
    pub fn schedule(&self) -> Result<CheckSchedule, UpdateError> {
        let state_dir = self
            .config
            .resolved_state_dir()
            .map_err(|error| UpdateError::io("failed to resolve state directory", error))?;
        Ok(CheckSchedule::in_dir(&state_dir))
    }

    /// Fetch and validate the release manifest.
    ///
    /// # Errors
    /// Returns transport errors from the fetcher, [`UpdateError::EmptyResponse`]
    /// when it yields no body, and decode errors for a malformed manifest.
    pub async fn fetch_manifest(&self) -> Result<Manifest, UpdateError> {
        let url = self.config.manifest_url();
        let mut stream = self.fetch(&url).await?;
        let mut body = Vec::new();
        let read = stream.read_to_end(&mut body).await;
        drop(stream);
        read.map_err(|error| UpdateError::io("failed to read update manifest", error))?;
        Manifest::from_slice(&body)
    }

    /// Fetch the manifest and return it when it advertises a different
    /// version than the running one.
    ///
    /// # Errors
    /// Returns the manifest fetch or decode error.
    pub async fn check(&self) -> Result<Option<Manifest>, UpdateError> {
        let manifest = self.fetch_manifest().await?;
        if manifest.version == self.config.current_version {
            info!("{} {} is up to date", self.config.cmd_name, manifest.version);
            return Ok(None);
        }
        info!(
            "Update available for {}: {} -> {}",
            self.config.cmd_name, self.config.current_version, manifest.version
        );
        Ok(Some(manifest))
    }

    /// Whether the manifest advertises a different version.
    ///
    /// # Errors
    /// Returns the manifest fetch or decode error.
    pub async fn update_available(&self) -> Result<bool, UpdateError> {
        Ok(self.check().await?.is_some())
    }

    /// Check for an update and install it, first as a binary diff and then,
    /// if that fails for any reason, as a full binary.
    ///
    /// # Errors
    /// Returns the manifest error when the check fails, and
    /// [`UpdateError::Recovery`] carrying both failures when neither the patch
    /// nor the full binary could be installed.
    pub async fn update(&self) -> Result<UpdateOutcome, UpdateError> {
        let Some(manifest) = self.check().await? else {
            return Ok(UpdateOutcome::UpToDate);
        };
        let version = manifest.version.clone();

        let patch_url = self.config.patch_url(&version);
        let patch_error = match self.apply_from(&patch_url, PatchMode::Diff, &manifest).await {
            Ok(()) => {
                info!("Updated to {version} via binary patch");
                return Ok(UpdateOutcome::Patched { version });
            }
            Err(error) => error,
        };
        warn!(
            "Patch update failed ({} error), falling back to full binary: {patch_error}",
            patch_error.kind()
        );

        let binary_url = self.config.binary_url(&version);
        match self
            .apply_from(&binary_url, PatchMode::Replace, &manifest)
            .await
        {
            Ok(()) => {
                info!("Updated to {version} via full binary");
                Ok(UpdateOutcome::Replaced { version })
            }
            Err(full_error) => Err(UpdateError::Recovery {
                patch: Box::new(patch_error),
                full: Box::new(full_error),
            }),
        }
    }

    /// Run at most one scheduled check-and-update pass.
    ///
    /// Meant to be spawned once per process on a background task. Scheduling
    /// problems are logged and reported as [`UpdateOutcome::NotDue`].
    ///
    /// # Errors
    /// Returns the error of [`Updater::update`] when a due check fails.
    pub async fn background_run(&self) -> Result<UpdateOutcome, UpdateError> {
        let schedule = match self.schedule() {
            Ok(schedule) => schedule,
            Err(error) => {
                warn!("Skipping update check: {error}");
                return Ok(UpdateOutcome::NotDue);
            }
        };
        if let Some(state_dir) = schedule.path().parent()
            && let Err(error) = tokio::fs::create_dir_all(state_dir).await
        {
            warn!(
                "Failed to create update state directory {}: {error}",
                state_dir.display()
            );
        }

        if !schedule.should_check_now(&self.config.current_version, Utc::now()) {
            return Ok(UpdateOutcome::NotDue);
        }
        info!("Update check due");
        self.update().await
    }

    async fn fetch(&self, url: &str) -> Result<ByteStream, UpdateError> {
        self.fetcher
            .fetch(url)
            .await?
            .ok_or_else(|| UpdateError::EmptyResponse {
                url: url.to_string(),
            })
    }

    async fn apply_from(
        &self,
        url: &str,
        mode: PatchMode,
        manifest: &Manifest,
    ) -> Result<(), UpdateError> {
        info!("Fetching {mode} payload from {url}");
        let payload = self.fetch(url).await?;
        self.applier.apply(mode, payload, &manifest.sha256).await
    }
}
