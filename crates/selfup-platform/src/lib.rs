mod executable;
mod paths;
mod platform;

pub use executable::{current_executable, executable_dir, resolve_relative_to_executable};
pub use paths::{AppPaths, AppPathsError};
pub use platform::{ParsePlatformError, Platform};
