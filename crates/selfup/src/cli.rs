use std::path::PathBuf;

use clap::{Parser, Subcommand};
use selfup_platform::Platform;

use crate::settings::Settings;

/// Check for and install new releases of a self-updating executable.
#[derive(Debug, Parser)]
#[command(name = "selfup", version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the release manifests.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Base URL of full binaries.
    #[arg(long, global = true)]
    pub bin_url: Option<String>,

    /// Base URL of binary patches.
    #[arg(long, global = true)]
    pub diff_url: Option<String>,

    /// Command name used in release paths.
    #[arg(long, global = true)]
    pub cmd_name: Option<String>,

    /// Directory holding the check schedule, relative to the executable
    /// unless absolute.
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Platform identifier such as `linux-amd64`.
    #[arg(long, global = true)]
    pub platform: Option<Platform>,

    /// Version of the running executable.
    #[arg(long, global = true, default_value = env!("CARGO_PKG_VERSION"))]
    pub current_version: String,

    /// Write debug logs.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Report whether a new release is available.
    Check,
    /// Install the latest release now, ignoring the schedule.
    Update,
    /// Run a scheduled check in the background, at most once per window.
    Background,
    /// Show the check schedule.
    Status,
    /// Print the effective settings.
    Settings {
        /// Save the effective settings to the settings file.
        #[arg(long)]
        write: bool,
    },
}

impl Cli {
    /// Overlay the flags that were given on top of `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(api_url) = &self.api_url {
            settings.api_url.clone_from(api_url);
        }
        if self.bin_url.is_some() {
            settings.bin_url.clone_from(&self.bin_url);
        }
        if self.diff_url.is_some() {
            settings.diff_url.clone_from(&self.diff_url);
        }
        if let Some(cmd_name) = &self.cmd_name {
            settings.cmd_name.clone_from(cmd_name);
        }
        if let Some(state_dir) = &self.state_dir {
            settings.state_dir.clone_from(state_dir);
        }
        if self.platform.is_some() {
            settings.platform.clone_from(&self.platform);
        }
        if self.debug {
            settings.debug_logging = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::{CommandFactory, Parser};
    use selfup_platform::Platform;

    use super::{Cli, Command};
    use crate::settings::Settings;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "selfup",
            "check",
            "--api-url",
            "https://updates.example.com/",
            "--platform",
            "darwin-arm64",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.command, Command::Check);
        assert_eq!(cli.api_url.as_deref(), Some("https://updates.example.com/"));
        assert_eq!(cli.platform, Some(Platform::new("darwin", "arm64")));
        assert_eq!(cli.current_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn malformed_platform_is_rejected() {
        let result = Cli::try_parse_from(["selfup", "--platform", "linux", "status"]);

        assert!(result.is_err());
    }

    #[test]
    fn flags_override_only_what_was_given() {
        let cli = Cli::try_parse_from([
            "selfup",
            "--diff-url",
            "https://diff.example.com/",
            "--state-dir",
            "/var/lib/selfup",
            "--debug",
            "settings",
            "--write",
        ])
        .expect("arguments should parse");
        let mut settings = Settings {
            api_url: "https://api.example.com/".to_string(),
            bin_url: Some("https://bin.example.com/".to_string()),
            ..Settings::default()
        };

        cli.apply_to(&mut settings);

        assert_eq!(cli.command, Command::Settings { write: true });
        assert_eq!(settings.api_url, "https://api.example.com/");
        assert_eq!(settings.bin_url.as_deref(), Some("https://bin.example.com/"));
        assert_eq!(settings.diff_url.as_deref(), Some("https://diff.example.com/"));
        assert_eq!(settings.state_dir, PathBuf::from("/var/lib/selfup"));
        assert!(settings.debug_logging);
    }
}
