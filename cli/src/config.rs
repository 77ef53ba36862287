use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chirp_core::DEFAULT_ORIGIN;
use serde::Deserialize;
use tracing::debug;

/// Settings read from `<config_dir>/chirp/config.toml`. Every field is
/// optional; a missing file is the same as an empty one.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub origin: Option<String>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chirp").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Backend origin: the command line (or `CHIRP_ORIGIN`) wins over the
    /// file, which wins over the built-in default.
    pub fn origin(&self, cli_override: Option<&str>) -> String {
        cli_override
            .or(self.origin.as_deref())
            .unwrap_or(DEFAULT_ORIGIN)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.origin(None), DEFAULT_ORIGIN);
    }

    #[test]
    fn file_origin_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "origin = \"http://chirp.test:8000\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.origin(None), "http://chirp.test:8000");
        assert_eq!(config.origin(Some("http://other")), "http://other");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "orgin = \"typo\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
