//! Small TOML-backed configuration for a single `Box`'s index connection:
//! which SQLite journal mode to open with and, if ever widened, knobs like
//! the busy timeout. An optional `config.toml` next to the box directory,
//! falling back to `Default` when absent.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Journal mode for the `.index.sqlite` connection. `Wal` is the default —
/// best throughput for the common single-host case. `Delete`/`Truncate`
/// disable shared-memory WAL, required on filesystems where mmap-backed WAL
/// locking is unreliable (network mounts), per the concurrency discipline
/// this crate follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Wal,
    Delete,
    Truncate,
}

impl JournalMode {
    pub fn as_pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
        }
    }
}

impl Default for JournalMode {
    fn default() -> Self {
        JournalMode::Wal
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoxConfig {
    #[serde(default)]
    pub journal_mode: JournalMode,
}

impl BoxConfig {
    /// Read `box_dir/config.toml` if present; otherwise the default
    /// (WAL mode). A box with no config file is the common case, not an
    /// error. A present-but-unparsable file is logged and treated as
    /// default rather than blocking the box from opening — a box's
    /// usability shouldn't hinge on an optional tuning file.
    pub fn load(box_dir: &Path) -> Self {
        let path = box_dir.join("config.toml");
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no box config file, using defaults");
            return Self::default();
        }
        match Self::read_and_parse(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable box config");
                Self::default()
            }
        }
    }

    fn read_and_parse(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading box config at {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing box config at {}", path.display()))
    }
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::default(),
        }
    }
}
