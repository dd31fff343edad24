//! [`Box`] is the user-facing façade over one directory and its
//! `BoxIndex`: `get_beads`, `resolve`, `store`.
//!
//! Grounded on `services/memory.rs`'s promotion helpers
//! (`promote_to_dag`, `mark_archived`), which validate an identity tuple
//! before trusting a cross-layer handle — the same discipline `resolve`
//! applies to the archive it just opened against the record the caller
//! passed in.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{Archive, ArchiveMetadata, ArchiveReader};
use crate::condition::Condition;
use crate::config::BoxConfig;
use crate::error::{BeadError, IdentityTuple, Result};
use crate::index::BoxIndex;
use crate::record::BeadRecord;

/// A directory of BEAD archives plus the logical name assigned to it by the
/// caller. Owns exactly one `BoxIndex` bound to `{directory}/.index.sqlite`.
pub struct Box {
    box_name: String,
    directory: PathBuf,
    index: BoxIndex,
}

impl Box {
    /// Open `directory` as a box named `box_name`. Reads `config.toml` in
    /// the directory (if present) for the journal mode, then opens the
    /// index — which rebuilds if the index is missing/corrupt/stale and
    /// otherwise syncs any files added since the last open.
    pub fn open(box_name: impl Into<String>, directory: impl Into<PathBuf>) -> Result<Self> {
        let box_name = box_name.into();
        let directory = directory.into();
        let config = BoxConfig::load(&directory);
        let index = BoxIndex::open(box_name.clone(), &directory, config.journal_mode)?;
        Ok(Self {
            box_name,
            directory,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.box_name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Delegate to `BoxIndex::query`, requesting input rows as well.
    pub fn get_beads(&self, conditions: &[Condition]) -> Result<Vec<BeadRecord>> {
        self.index.query(conditions, true)
    }

    /// Validate `record` belongs to this box, locate its file, open it, and
    /// assert the archive's own identity tuple matches what the caller
    /// asked for. Any mismatch between what the index says and what the
    /// archive actually contains is `IndexOutOfSync`, not a silently
    /// different archive.
    pub fn resolve(&self, record: &BeadRecord) -> Result<Archive> {
        if record.box_name != self.box_name {
            return Err(BeadError::WrongBox {
                from_box: record.box_name.clone(),
                to_box: self.box_name.clone(),
            });
        }

        let file_path = self.index.locate(&record.name, &record.content_id)?;
        let metadata = ArchiveReader::open(&file_path)?;

        if metadata.kind != record.kind
            || metadata.content_id != record.content_id
            || derive_name_for_compare(&file_path, &metadata) != record.name
        {
            return Err(BeadError::IndexOutOfSync {
                path: file_path.clone(),
                expected: IdentityTuple {
                    name: record.name.clone(),
                    content_id: record.content_id.clone(),
                    kind: record.kind.clone(),
                },
                found: IdentityTuple {
                    name: derive_name_for_compare(&file_path, &metadata),
                    content_id: metadata.content_id.clone(),
                    kind: metadata.kind.clone(),
                },
            });
        }

        Archive::open(file_path, record.name.clone(), metadata)
    }

    /// Copy `source_archive_path` into this box's directory under a name
    /// derived from its own metadata (`<name>_<freeze_time>.<ext>`), then
    /// index it. Fails with `AlreadyExists` rather than silently
    /// overwriting a same-named destination.
    pub fn store(&self, source_archive_path: &Path) -> Result<BeadRecord> {
        let metadata = ArchiveReader::open(source_archive_path)?;
        let name = metadata
            .name_hint
            .clone()
            .or_else(|| {
                source_archive_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .ok_or_else(|| BeadError::ArchiveInvalid {
                path: source_archive_path.to_path_buf(),
                reason: "cannot derive a destination name: no name_hint and no usable file stem"
                    .to_string(),
            })?;

        let extension = source_archive_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("zip");
        let dest_file_name = format!("{name}_{}.{extension}", metadata.freeze_time);
        let dest_path = self.directory.join(&dest_file_name);

        if dest_path.exists() {
            return Err(BeadError::AlreadyExists { path: dest_path });
        }

        fs::copy(source_archive_path, &dest_path).map_err(|e| BeadError::Io {
            path: dest_path.clone(),
            source: e,
        })?;

        self.index.add(&dest_path)
    }
}

fn derive_name_for_compare(path: &Path, metadata: &ArchiveMetadata) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit_once('_'))
        .filter(|(name_part, _)| !name_part.is_empty())
        .map(|(name_part, _)| name_part.to_string())
        .or_else(|| metadata.name_hint.clone())
        .unwrap_or_default()
}
