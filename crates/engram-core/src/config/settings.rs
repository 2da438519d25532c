use std::path::{Path, PathBuf};

use git2::Config;

use crate::error::CoreError;

const DEFAULT_REMOTE: &str = "origin";

/// User-level settings: where global engrams and the mirror cache live, and
/// which remote carries the index ref.
///
/// Values come from the `[engram]` section of the user's git config, falling
/// back to XDG locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub global_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub remote: String,
}

impl Settings {
    /// Load from the default (global/xdg/system) git config.
    pub fn load() -> Result<Self, CoreError> {
        let config = Config::open_default().ok();
        Self::from_config(config.as_ref())
    }

    /// Resolve settings from an explicit git config, if any.
    pub fn from_config(config: Option<&Config>) -> Result<Self, CoreError> {
        let get_path = |key: &str| config.and_then(|c| c.get_path(key).ok());

        let global_dir = match get_path("engram.globalDir") {
            Some(dir) => dir,
            None => default_global_dir()?,
        };
        let cache_dir = match get_path("engram.cacheDir") {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };
        let remote = config
            .and_then(|c| c.get_string("engram.remote").ok())
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string());

        Ok(Self {
            global_dir,
            cache_dir,
            remote,
        })
    }

    /// Settings rooted at explicit directories.
    pub fn with_roots(global_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_dir: global_dir.into(),
            cache_dir: cache_dir.into(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }

    /// Write these settings to the `[engram]` section of a git config.
    pub fn save(&self, config: &mut Config) -> Result<(), CoreError> {
        config.set_str("engram.globalDir", &path_str(&self.global_dir)?)?;
        config.set_str("engram.cacheDir", &path_str(&self.cache_dir)?)?;
        config.set_str("engram.remote", &self.remote)?;
        Ok(())
    }
}

fn path_str(path: &Path) -> Result<String, CoreError> {
    path.to_str()
        .map(String::from)
        .ok_or_else(|| CoreError::Config(format!("Non UTF-8 path: {}", path.display())))
}

/// `$XDG_CONFIG_HOME/engrams`, else `~/.config/engrams`.
fn default_global_dir() -> Result<PathBuf, CoreError> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join("engrams"));
    }
    dirs::home_dir()
        .map(|home| home.join(".config").join("engrams"))
        .ok_or_else(|| CoreError::Config("Cannot determine home directory".into()))
}

/// `$XDG_CACHE_HOME/engrams/repos`, else the platform cache dir.
fn default_cache_dir() -> Result<PathBuf, CoreError> {
    if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join("engrams").join("repos"));
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .map(|dir| dir.join("engrams").join("repos"))
        .ok_or_else(|| CoreError::Config("Cannot determine cache directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_from_git_config() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("gitconfig");
        std::fs::write(
            &config_path,
            "[engram]\n\tglobalDir = /srv/engrams\n\tcacheDir = /srv/cache\n\tremote = upstream\n",
        )
        .unwrap();
        let config = Config::open(&config_path).unwrap();

        let settings = Settings::from_config(Some(&config)).unwrap();
        assert_eq!(settings.global_dir, PathBuf::from("/srv/engrams"));
        assert_eq!(settings.cache_dir, PathBuf::from("/srv/cache"));
        assert_eq!(settings.remote, "upstream");
    }

    #[test]
    fn test_settings_save_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("gitconfig");
        std::fs::write(&config_path, "").unwrap();
        let mut config = Config::open(&config_path).unwrap();

        let settings = Settings::with_roots("/a/global", "/a/cache");
        settings.save(&mut config).unwrap();

        let reopened = Config::open(&config_path).unwrap();
        let loaded = Settings::from_config(Some(&reopened)).unwrap();
        assert_eq!(loaded, settings);
    }
}
