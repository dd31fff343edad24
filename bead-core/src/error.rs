//! The crate's error taxonomy. `BeadError` is the only error type that
//! crosses a public function boundary; internal helpers may thread
//! `anyhow::Context` through a chain of fallible steps but must convert to a
//! typed variant before returning from anything public.

use std::path::PathBuf;

/// Identity tuple carried by `IndexOutOfSync` so the message can show both
/// what the caller expected and what was actually found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTuple {
    pub name: String,
    pub content_id: String,
    pub kind: String,
}

impl std::fmt::Display for IdentityTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "name={:?} content_id={:?} kind={:?}",
            self.name, self.content_id, self.kind
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BeadError {
    #[error("archive invalid at {path}: {reason}")]
    ArchiveInvalid { path: PathBuf, reason: String },

    #[error("no bead matching name={name:?} content_id={content_id:?} in box {box_name:?}")]
    NotFound {
        box_name: String,
        name: String,
        content_id: String,
    },

    #[error(
        "ambiguous: {count} rows match name={name:?} content_id={content_id:?} in box {box_name:?}; rebuild the index"
    )]
    Ambiguous {
        box_name: String,
        name: String,
        content_id: String,
        count: usize,
    },

    #[error("index out of sync at {path}: expected ({expected}), found ({found})")]
    IndexOutOfSync {
        path: PathBuf,
        expected: IdentityTuple,
        found: IdentityTuple,
    },

    #[error("index at {path} is unwritable: {source}")]
    IndexUnwritable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("index at {path} is read-only")]
    IndexReadOnly { path: PathBuf },

    #[error("index unavailable at {path}; falling back to filesystem enumeration")]
    IndexUnavailable { path: PathBuf },

    #[error("index busy at {path} after {attempts} attempts")]
    IndexBusy { path: PathBuf, attempts: u32 },

    #[error("record from box {from_box:?} passed to box {to_box:?}")]
    WrongBox { from_box: String, to_box: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, BeadError>;
