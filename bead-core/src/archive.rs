//! [`ArchiveReader`] opens a single archive file and exposes its metadata
//! without touching payload bytes — cheap enough to call once per file
//! during `rebuild`/`sync`. [`Archive`] is the heavyweight, resource-owning
//! handle returned only by [`crate::box_::Box::resolve`], carrying the
//! validated identity plus the ability to enumerate and extract payload
//! files.
//!
//! On-disk format (the part of it this crate needs to know about): a BEAD
//! archive is a zip file containing a `meta/bead.json` entry with the
//! identity and input-binding metadata, plus opaque `data/` and `code/`
//! directories this crate never inspects at ingest time.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{BeadError, Result};
use crate::record::InputSpec;

pub const META_ENTRY: &str = "meta/bead.json";
const DATA_PREFIX: &str = "data/";
const CODE_PREFIX: &str = "code/";

/// `%.6f` requires a literal dot followed by exactly six fractional digits,
/// matching the `YYYYMMDDTHHMMSS.ffffffZ` convention this crate writes and
/// expects (spec §6, §9 open question (b)).
const FREEZE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// The fixed width every `freeze_time`/`input_freeze_time` value must have —
/// computed once from a canonical sample rather than hard-coded as a second
/// magic number that could drift out of step with `FREEZE_TIME_FORMAT`.
static FREEZE_TIME_LEN: Lazy<usize> = Lazy::new(|| "20200101T000000.000000Z".len());

/// Reject a `freeze_time`-shaped value that isn't a fixed-width UTC
/// timestamp in the convention this crate relies on for lexicographic
/// ordering (spec §3: "must be UTC, fixed-width"). Scoped to one field so the
/// caller can name which one failed in the `ArchiveInvalid` reason.
fn validate_freeze_time(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.len() != *FREEZE_TIME_LEN {
        return Err(format!(
            "{field} {value:?} is not a fixed-width timestamp (expected {} characters, got {})",
            *FREEZE_TIME_LEN,
            value.len()
        ));
    }
    NaiveDateTime::parse_from_str(value, FREEZE_TIME_FORMAT)
        .map(|_| ())
        .map_err(|e| format!("{field} {value:?} is not a valid UTC ISO-8601 timestamp: {e}"))
}

#[derive(Debug, Deserialize)]
struct RawInputSpec {
    input_name: String,
    input_kind: String,
    input_content_id: String,
    input_freeze_time: String,
}

impl From<RawInputSpec> for InputSpec {
    fn from(r: RawInputSpec) -> Self {
        InputSpec {
            input_name: r.input_name,
            input_kind: r.input_kind,
            input_content_id: r.input_content_id,
            input_freeze_time: r.input_freeze_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBeadMeta {
    kind: String,
    content_id: String,
    freeze_name: String,
    freeze_time: String,
    #[serde(default)]
    name_hint: Option<String>,
    #[serde(default)]
    inputs: Vec<RawInputSpec>,
}

/// Metadata read from an archive's `meta/bead.json`, without opening the
/// zip's payload entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveMetadata {
    pub name_hint: Option<String>,
    pub kind: String,
    pub content_id: String,
    pub freeze_name: String,
    pub freeze_time: String,
    pub inputs: Vec<InputSpec>,
}

/// Stateless reader: opens one archive file, parses its metadata entry, and
/// returns. Never caches a handle across calls — callers that need repeated
/// access (extraction) go through [`Archive`] instead.
pub struct ArchiveReader;

impl ArchiveReader {
    /// Read `meta/bead.json` out of the archive at `path`. Any failure —
    /// missing file, corrupt zip, missing or malformed metadata entry — is
    /// scoped to this one file and reported as `ArchiveInvalid`, never a
    /// panic, so a directory-wide `rebuild` can skip one bad file and keep
    /// going.
    pub fn open(path: &Path) -> Result<ArchiveMetadata> {
        let invalid = |reason: String| BeadError::ArchiveInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| invalid(format!("cannot open file: {e}")))?;
        let mut zip =
            zip::ZipArchive::new(file).map_err(|e| invalid(format!("not a valid zip: {e}")))?;
        let mut entry = zip
            .by_name(META_ENTRY)
            .map_err(|_| invalid(format!("missing {META_ENTRY}")))?;
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| invalid(format!("cannot read {META_ENTRY}: {e}")))?;
        drop(entry);

        let raw: RawBeadMeta = serde_json::from_str(&text)
            .map_err(|e| invalid(format!("malformed {META_ENTRY}: {e}")))?;

        validate_freeze_time("freeze_time", &raw.freeze_time).map_err(|r| invalid(r))?;
        for input in &raw.inputs {
            validate_freeze_time("input_freeze_time", &input.input_freeze_time)
                .map_err(|r| invalid(r))?;
        }

        Ok(ArchiveMetadata {
            name_hint: raw.name_hint,
            kind: raw.kind,
            content_id: raw.content_id,
            freeze_name: raw.freeze_name,
            freeze_time: raw.freeze_time,
            inputs: raw.inputs.into_iter().map(Into::into).collect(),
        })
    }
}

/// A resolved, open archive handle. Obtained only via `Box::resolve`, which
/// has already validated `(name, content_id, kind)` against the caller's
/// `BeadRecord`. Holds the zip reader for the duration of the caller's
/// scoped use; the underlying file descriptor is released on drop.
pub struct Archive {
    path: PathBuf,
    name: String,
    kind: String,
    content_id: String,
    freeze_name: String,
    freeze_time: String,
    inputs: Vec<InputSpec>,
    zip: Mutex<zip::ZipArchive<File>>,
}

impl Archive {
    pub(crate) fn open(
        path: PathBuf,
        name: String,
        metadata: ArchiveMetadata,
    ) -> Result<Self> {
        let invalid = |reason: String| BeadError::ArchiveInvalid {
            path: path.clone(),
            reason,
        };
        let file = File::open(&path).map_err(|e| invalid(format!("cannot open file: {e}")))?;
        let zip =
            zip::ZipArchive::new(file).map_err(|e| invalid(format!("not a valid zip: {e}")))?;
        Ok(Self {
            path,
            name,
            kind: metadata.kind,
            content_id: metadata.content_id,
            freeze_name: metadata.freeze_name,
            freeze_time: metadata.freeze_time,
            inputs: metadata.inputs,
            zip: Mutex::new(zip),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn freeze_name(&self) -> &str {
        &self.freeze_name
    }

    pub fn freeze_time(&self) -> &str {
        &self.freeze_time
    }

    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    /// Names of entries under `data/`, with the prefix stripped.
    pub fn data_files(&self) -> Result<Vec<String>> {
        self.entries_under(DATA_PREFIX)
    }

    /// Names of entries under `code/`, with the prefix stripped.
    pub fn code_files(&self) -> Result<Vec<String>> {
        self.entries_under(CODE_PREFIX)
    }

    fn entries_under(&self, prefix: &str) -> Result<Vec<String>> {
        let zip = self.zip.lock().expect("archive zip mutex poisoned");
        let mut out = Vec::new();
        for i in 0..zip.len() {
            // `by_index_raw` would avoid decompressing; `by_index` is fine here
            // since we only read the name, not the contents.
            let name = zip.name_for_index(i).unwrap_or_default();
            if let Some(rest) = name.strip_prefix(prefix) {
                if !rest.is_empty() {
                    out.push(rest.to_string());
                }
            }
        }
        Ok(out)
    }

    /// Extract every entry under `data/` into `target_dir`, preserving
    /// relative structure.
    pub fn extract_data_to(&self, target_dir: &Path) -> Result<()> {
        self.extract_prefix_to(DATA_PREFIX, target_dir)
    }

    /// Extract every entry under `code/` into `target_dir`, preserving
    /// relative structure.
    pub fn extract_code_to(&self, target_dir: &Path) -> Result<()> {
        self.extract_prefix_to(CODE_PREFIX, target_dir)
    }

    fn extract_prefix_to(&self, prefix: &str, target_dir: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| BeadError::Io {
            path: target_dir.to_path_buf(),
            source: e,
        };
        let mut zip = self.zip.lock().expect("archive zip mutex poisoned");
        let len = zip.len();
        for i in 0..len {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| BeadError::ArchiveInvalid {
                    path: self.path.clone(),
                    reason: format!("corrupt entry {i}: {e}"),
                })?;
            let name = entry.name().to_string();
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            if rest.is_empty() || name.ends_with('/') {
                continue;
            }
            if Path::new(rest)
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)))
            {
                return Err(BeadError::ArchiveInvalid {
                    path: self.path.clone(),
                    reason: format!("entry {name:?} escapes its extraction directory"),
                });
            }
            let dest = target_dir.join(rest);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            let mut out = File::create(&dest).map_err(io_err)?;
            std::io::copy(&mut entry, &mut out).map_err(io_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(dir: &Path, file_name: &str, meta_json: &str, extra_entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(file_name);
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file(META_ENTRY, options).unwrap();
        zip.write_all(meta_json.as_bytes()).unwrap();
        for (name, contents) in extra_entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn valid_freeze_time_passes_validation() {
        assert!(validate_freeze_time("freeze_time", "20200101T000000.000000Z").is_ok());
    }

    #[test]
    fn wrong_width_freeze_time_is_rejected() {
        assert!(validate_freeze_time("freeze_time", "2020-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn non_numeric_freeze_time_is_rejected() {
        assert!(validate_freeze_time("freeze_time", "2020010AT000000.000000Z").is_err());
    }

    #[test]
    fn archive_with_malformed_freeze_time_is_archive_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let meta = r#"{"kind":"k1","content_id":"c1","freeze_name":"c1","freeze_time":"not-a-timestamp","inputs":[]}"#;
        let path = write_zip(dir.path(), "bad.zip", meta, &[]);

        let err = ArchiveReader::open(&path).unwrap_err();
        assert!(matches!(err, BeadError::ArchiveInvalid { .. }));
    }

    #[test]
    fn archive_with_valid_metadata_opens_successfully() {
        let dir = tempfile::tempdir().unwrap();
        let meta = r#"{"kind":"k1","content_id":"c1","freeze_name":"c1","freeze_time":"20200101T000000.000000Z","inputs":[]}"#;
        let path = write_zip(dir.path(), "good.zip", meta, &[("data/out.txt", "hi")]);

        let metadata = ArchiveReader::open(&path).unwrap();
        assert_eq!(metadata.kind, "k1");
        assert_eq!(metadata.content_id, "c1");
        assert_eq!(metadata.freeze_time, "20200101T000000.000000Z");
    }

    #[test]
    fn extract_rejects_a_path_traversal_entry() {
        let dir = tempfile::tempdir().unwrap();
        let meta = r#"{"kind":"k1","content_id":"c1","freeze_name":"c1","freeze_time":"20200101T000000.000000Z","inputs":[]}"#;
        let path = write_zip(
            dir.path(),
            "evil.zip",
            meta,
            &[("data/../../escaped.txt", "gotcha")],
        );

        let metadata = ArchiveReader::open(&path).unwrap();
        let archive = Archive::open(path, "evil".to_string(), metadata).unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let err = archive.extract_data_to(out_dir.path()).unwrap_err();
        assert!(matches!(err, BeadError::ArchiveInvalid { .. }));
    }

    #[test]
    fn missing_meta_entry_is_archive_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_meta.zip");
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("data/out.txt", options).unwrap();
        zip.write_all(b"hi").unwrap();
        zip.finish().unwrap();

        let err = ArchiveReader::open(&path).unwrap_err();
        assert!(matches!(err, BeadError::ArchiveInvalid { .. }));
    }
}
