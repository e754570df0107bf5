//! Self-update protocol for a running executable.
//!
//! This crate holds the update logic that is independent of the host
//! binary:
//! - Release manifest fetching and validation.
//! - A persisted schedule that rate-limits update checks.
//! - Patch-then-full-binary installation with SHA-256 verification.
//! - Pluggable fetch and apply capabilities for tests and custom transports.

mod apply;
mod config;
mod error;
mod fetch;
mod manifest;
mod schedule;
mod updater;

/// Patch-and-replace capability and its on-disk implementation.
pub use apply::{Applier, ExecutableApplier, PatchMode};
/// Release locations and state directory of an updater.
pub use config::UpdaterConfig;
/// Error taxonomy shared by every update step.
pub use error::{ErrorKind, UpdateError};
/// Fetch capability, the HTTP implementation, and a scripted test double.
pub use fetch::{ByteStream, Fetcher, HttpFetcher, SequencedFetcher, byte_stream};
/// Release manifest model.
pub use manifest::{DIGEST_LEN, Manifest, Sha256Digest};
/// Update-check rate limiting.
pub use schedule::{CheckSchedule, DEV_VERSION};
/// Update orchestration.
pub use updater::{UpdateOutcome, Updater};

pub use selfup_platform::Platform;
