use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use log::{debug, warn};
use rand::Rng as _;

/// Version string that disables update checks entirely.
pub const DEV_VERSION: &str = "dev";

const SCHEDULE_FILE: &str = "cktime";
const CHECK_INTERVAL_SECS: i64 = 24 * 60 * 60;
const MAX_JITTER_SECS: i64 = 24 * 60 * 60;

/// Rate limiter for update checks backed by a single timestamp file.
///
/// The file holds the earliest instant at which the next check may run. Each
/// check that gets past the gate pushes that instant 24 hours plus up to 24
/// hours of random jitter into the future.
#[derive(Debug, Clone)]
pub struct CheckSchedule {
    path: PathBuf,
}

impl CheckSchedule {
    #[must_use]
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(SCHEDULE_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The persisted "do not check before" instant, if one can be read.
    #[must_use]
    pub fn next_check(&self) -> Option<DateTime<Utc>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        DateTime::parse_from_rfc3339(content.trim())
            .map(|at| at.with_timezone(&Utc))
            .ok()
    }

    /// Decide whether an update check should run at `now`.
    ///
    /// Returns `false` for [`DEV_VERSION`] and while the persisted instant is
    /// still in the future. Otherwise reschedules and returns whether the new
    /// instant was persisted; a write failure never lets the check proceed.
    #[must_use]
    pub fn should_check_now(&self, current_version: &str, now: DateTime<Utc>) -> bool {
        self.should_check_with_jitter(current_version, now, random_jitter())
    }

    fn should_check_with_jitter(
        &self,
        current_version: &str,
        now: DateTime<Utc>,
        jitter: TimeDelta,
    ) -> bool {
        if current_version == DEV_VERSION {
            debug!("Update checks disabled for development builds");
            return false;
        }
        if let Some(next) = self.next_check()
            && next > now
        {
            debug!("Next update check not due until {next}");
            return false;
        }

        let next = now + TimeDelta::seconds(CHECK_INTERVAL_SECS) + jitter;
        match self.write_next_check(next) {
            Ok(()) => {
                debug!("Next update check scheduled for {next}");
                true
            }
            Err(error) => {
                warn!(
                    "Failed to persist update schedule to {}: {error}",
                    self.path.display()
                );
                false
            }
        }
    }

    fn write_next_check(&self, at: DateTime<Utc>) -> std::io::Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "schedule path has no parent",
            )
        })?;

        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        file.write_all(at.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}

fn random_jitter() -> TimeDelta {
    TimeDelta::seconds(rand::thread_rng().gen_range(0..MAX_JITTER_SECS))
}
