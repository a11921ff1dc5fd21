//! Process-wide display preferences.
//!
//! Loaded once at start with [`init`] and read with [`current`]. Nothing in
//! the job engine consults this module; only front ends do.

use crate::error::ToolboxError;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

static PREFERENCES: OnceCell<Preferences> = OnceCell::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        })
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme '{other}' (expected dark or light)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
}

impl Preferences {
    /// Read preferences from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ToolboxError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No preferences at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ToolboxError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|e| {
            ToolboxError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Write preferences to `path` as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ToolboxError> {
        let write_err = |source| ToolboxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ToolboxError::Internal(format!("serialising preferences: {e}")))?;
        std::fs::write(path, json + "\n").map_err(write_err)
    }
}

/// `$XDG_CONFIG_HOME/pdftool/preferences.json`, else under `$HOME/.config`.
pub fn default_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("pdftool").join("preferences.json"))
}

/// Load preferences from `path` into the process-wide slot.
///
/// Only the first call has an effect. A broken file is logged and replaced
/// by defaults rather than aborting start-up.
pub fn init(path: Option<&Path>) -> &'static Preferences {
    PREFERENCES.get_or_init(|| match path {
        Some(path) => Preferences::load(path).unwrap_or_else(|e| {
            warn!("Ignoring preferences: {}", e);
            Preferences::default()
        }),
        None => Preferences::default(),
    })
}

/// The process-wide preferences, or defaults if [`init`] was never called.
pub fn current() -> Preferences {
    PREFERENCES.get().cloned().unwrap_or_default()
}
