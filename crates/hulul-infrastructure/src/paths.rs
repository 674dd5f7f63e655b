//! Unified path management for hulul files.
//!
//! ```text
//! ~/.config/hulul/             # Config directory
//! ├── config.toml              # Client configuration
//! ├── auth-storage.toml        # Persisted session store record
//! ├── session/                 # Ephemeral per-session data, wiped on sign-out
//! │   └── drafts/              # Unsent message drafts per ticket
//! └── logs/                    # Client logs
//!     └── hulul.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;

/// Environment variable that relocates every hulul path.
pub const HULUL_HOME_ENV: &str = "HULUL_HOME";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves hulul's files relative to a root directory.
///
/// The root is, in order: the explicit override, `$HULUL_HOME`, then the
/// platform config directory joined with `hulul`.
#[derive(Debug, Clone)]
pub struct HululPaths {
    root_override: Option<PathBuf>,
}

impl HululPaths {
    pub fn new(root_override: Option<PathBuf>) -> Self {
        Self { root_override }
    }

    /// Returns the hulul configuration directory.
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        if let Some(root) = &self.root_override {
            return Ok(root.clone());
        }
        if let Some(home) = std::env::var_os(HULUL_HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        dirs::config_dir()
            .map(|dir| dir.join("hulul"))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the file holding the persisted auth record for `storage_key`.
    pub fn auth_storage_file(&self, storage_key: &str) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(format!("{}.toml", storage_key)))
    }

    /// Returns the ephemeral session directory.
    pub fn session_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("session"))
    }

    pub fn drafts_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.session_dir()?.join("drafts"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("logs"))
    }
}

impl Default for HululPaths {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_root() {
        let paths = HululPaths::new(Some(PathBuf::from("/tmp/hulul-test")));
        assert_eq!(
            paths.config_file().unwrap(),
            PathBuf::from("/tmp/hulul-test/config.toml")
        );
        assert_eq!(
            paths.auth_storage_file("auth-storage").unwrap(),
            PathBuf::from("/tmp/hulul-test/auth-storage.toml")
        );
    }

    #[test]
    fn test_drafts_live_under_session_dir() {
        let paths = HululPaths::new(Some(PathBuf::from("/tmp/hulul-test")));
        let session_dir = paths.session_dir().unwrap();
        let drafts_dir = paths.drafts_dir().unwrap();
        assert!(drafts_dir.starts_with(&session_dir));
        assert!(drafts_dir.ends_with("drafts"));
    }

    #[test]
    fn test_logs_dir() {
        let paths = HululPaths::new(Some(PathBuf::from("/tmp/hulul-test")));
        let logs_dir = paths.logs_dir().unwrap();
        assert!(logs_dir.ends_with("logs"));
        assert!(logs_dir.starts_with(paths.config_dir().unwrap()));
    }
}
