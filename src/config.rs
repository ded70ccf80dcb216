use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::store::{Store, THUMBNAILS_DIR};

pub const CONFIG_FILE: &str = "thing-tracker.json";
pub const TRACKER_FILE: &str = "tracker.json";

/// On-disk configuration. Every field is optional; relative paths resolve
/// against the directory holding the config file.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub tracker: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub renderer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub tracker_path: Utf8PathBuf,
    pub thumbnails_root: Utf8PathBuf,
    pub base: Option<String>,
    pub renderer: Option<Utf8PathBuf>,
}

impl ResolvedConfig {
    pub fn store(&self) -> Store {
        Store::new_with_paths(self.tracker_path.clone(), self.thumbnails_root.clone())
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub tracker: Option<Utf8PathBuf>,
    pub thumbnails: Option<Utf8PathBuf>,
    pub base: Option<String>,
    pub renderer: Option<Utf8PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `thing-tracker.json` from `cwd` when present, or
    /// falls back to defaults rooted at `cwd`.
    pub fn resolve(path: Option<&Utf8Path>, cwd: &Utf8Path) -> Result<ResolvedConfig, TrackerError> {
        let config_path = match path {
            Some(path) => cwd.join(path),
            None => cwd.join(CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Self::resolve_config(Config::default(), cwd);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| TrackerError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| TrackerError::ConfigParse(err.to_string()))?;
        let root = config_path.parent().unwrap_or(cwd);
        Self::resolve_config(config, root)
    }

    pub fn resolve_config(config: Config, root: &Utf8Path) -> Result<ResolvedConfig, TrackerError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(TrackerError::ConfigParse(format!(
                "unsupported schemaVersion {schema_version}"
            )));
        }

        let tracker_path = root.join(config.tracker.as_deref().unwrap_or(TRACKER_FILE));
        let thumbnails_root = match config.thumbnails.as_deref() {
            Some(dir) => root.join(dir),
            None => default_thumbnails_root(&tracker_path),
        };

        Ok(ResolvedConfig {
            schema_version,
            tracker_path,
            thumbnails_root,
            base: config.base.filter(|base| !base.trim().is_empty()),
            renderer: config.renderer.map(|program| renderer_path(root, program)),
        })
    }

    pub fn apply_overrides(mut resolved: ResolvedConfig, overrides: ConfigOverrides) -> ResolvedConfig {
        if let Some(tracker) = overrides.tracker {
            if overrides.thumbnails.is_none() {
                resolved.thumbnails_root = default_thumbnails_root(&tracker);
            }
            resolved.tracker_path = tracker;
        }
        if let Some(thumbnails) = overrides.thumbnails {
            resolved.thumbnails_root = thumbnails;
        }
        if overrides.base.is_some() {
            resolved.base = overrides.base;
        }
        if overrides.renderer.is_some() {
            resolved.renderer = overrides.renderer;
        }
        resolved
    }
}

/// A bare program name is left for the `PATH` lookup; anything with a
/// separator is a path relative to the config directory.
fn renderer_path(root: &Utf8Path, program: String) -> Utf8PathBuf {
    if program.contains(['/', '\\']) {
        root.join(program)
    } else {
        Utf8PathBuf::from(program)
    }
}

/// Staged thumbnails sit next to the tracker document.
pub fn default_thumbnails_root(tracker_path: &Utf8Path) -> Utf8PathBuf {
    match tracker_path.parent() {
        Some(parent) => parent.join(THUMBNAILS_DIR),
        None => Utf8PathBuf::from(THUMBNAILS_DIR),
    }
}
