use std::path::PathBuf;

use selfup_platform::Platform;

const DEFAULT_STATE_DIR: &str = "update";

/// Where an updater looks for releases and keeps its state.
///
/// `api_url`, `bin_url` and `diff_url` are independent base URLs; they hold
/// the same value when manifests, binaries and patches are served from one
/// location. Each is stored with a trailing `/` and extended by plain
/// concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    pub current_version: String,
    pub cmd_name: String,
    pub api_url: String,
    pub bin_url: String,
    pub diff_url: String,
    /// Relative paths are resolved against the executable's directory.
    pub state_dir: PathBuf,
    pub platform: Platform,
}

impl UpdaterConfig {
    /// Config serving manifests, binaries and patches from `base_url`.
    #[must_use]
    pub fn new(
        cmd_name: impl Into<String>,
        current_version: impl Into<String>,
        base_url: &str,
    ) -> Self {
        let base_url = with_trailing_slash(base_url);
        Self {
            current_version: current_version.into(),
            cmd_name: cmd_name.into(),
            api_url: base_url.clone(),
            bin_url: base_url.clone(),
            diff_url: base_url,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            platform: Platform::current(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = with_trailing_slash(url);
        self
    }

    #[must_use]
    pub fn with_bin_url(mut self, url: &str) -> Self {
        self.bin_url = with_trailing_slash(url);
        self
    }

    #[must_use]
    pub fn with_diff_url(mut self, url: &str) -> Self {
        self.diff_url = with_trailing_slash(url);
        self
    }

    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// `{api}{cmd}/{platform}.json`
    #[must_use]
    pub fn manifest_url(&self) -> String {
        format!("{}{}/{}.json", self.api_url, self.cmd_name, self.platform)
    }

    /// `{diff}{cmd}/{current}/{target}/{platform}`
    #[must_use]
    pub fn patch_url(&self, target_version: &str) -> String {
        format!(
            "{}{}/{}/{}/{}",
            self.diff_url, self.cmd_name, self.current_version, target_version, self.platform
        )
    }

    /// `{bin}{cmd}/{target}/{platform}.gz`
    #[must_use]
    pub fn binary_url(&self, target_version: &str) -> String {
        format!(
            "{}{}/{}/{}.gz",
            self.bin_url, self.cmd_name, target_version, self.platform
        )
    }

    /// The state directory as an absolute path.
    ///
    /// # Errors
    /// Returns an error if `state_dir` is relative and the executable's
    /// directory cannot be determined.
    pub fn resolved_state_dir(&self) -> std::io::Result<PathBuf> {
        selfup_platform::resolve_relative_to_executable(&self.state_dir)
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.is_empty() || url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

#[cfg(test)]
mod tests {
    use selfup_platform::Platform;

    use super::UpdaterConfig;

    fn config() -> UpdaterConfig {
        UpdaterConfig::new("hk", "1", "https://updates.example.com/")
            .with_platform(Platform::new("linux", "amd64"))
    }

    #[test]
    fn urls_follow_release_layout() {
        let config = config();

        assert_eq!(
            config.manifest_url(),
            "https://updates.example.com/hk/linux-amd64.json"
        );
        assert_eq!(
            config.patch_url("2"),
            "https://updates.example.com/hk/1/2/linux-amd64"
        );
        assert_eq!(
            config.binary_url("2"),
            "https://updates.example.com/hk/2/linux-amd64.gz"
        );
    }

    #[test]
    fn base_urls_are_independent() {
        let config = config()
            .with_api_url("https://api.example.com")
            .with_bin_url("https://dist.example.com/")
            .with_diff_url("https://patch.example.com/releases");

        assert_eq!(
            config.manifest_url(),
            "https://api.example.com/hk/linux-amd64.json"
        );
        assert_eq!(
            config.binary_url("3"),
            "https://dist.example.com/hk/3/linux-amd64.gz"
        );
        assert_eq!(
            config.patch_url("3"),
            "https://patch.example.com/releases/hk/1/3/linux-amd64"
        );
    }

    #[test]
    fn absolute_state_dir_is_kept() {
        let dir = std::env::temp_dir().join("selfup-config-state");
        let config = config().with_state_dir(&dir);

        assert_eq!(
            config
                .resolved_state_dir()
                .expect("absolute state dir should resolve"),
            dir
        );
    }

    #[test]
    fn default_state_dir_is_relative() {
        assert!(config().state_dir.is_relative());
    }
}
