//! [`BoxIndex`] is the authoritative SQLite-backed index over one box
//! directory: schema lifecycle, ingest (`rebuild`/`sync`/`add`/`remove`),
//! and lookup (`query`/`locate`).
//!
//! Grounded on `services/memory.rs::Memory::open` for the open/migrate
//! shape (parent-dir-free here, since a box directory must already exist)
//! and `services/memory.rs`'s `unchecked_transaction`-guarded multi-row
//! writes for the single-writer transaction discipline.

mod retry;
mod schema;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};

use crate::archive::{ArchiveMetadata, ArchiveReader};
use crate::condition::{compile, record_matches, Condition};
use crate::config::JournalMode;
use crate::error::{BeadError, Result};
use crate::record::{BeadRecord, InputSpec};
use retry::{with_retry, RetryOutcome};
use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};

const INDEX_FILE_NAME: &str = ".index.sqlite";
const CONFIG_FILE_NAME: &str = "config.toml";

fn is_sidecar_or_own_file(file_name: &str) -> bool {
    file_name == INDEX_FILE_NAME
        || file_name == CONFIG_FILE_NAME
        || file_name.starts_with('.')
        || file_name.ends_with("-journal")
        || file_name.ends_with("-wal")
        || file_name.ends_with("-shm")
}

fn is_readonly(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ReadOnly)
}

/// Derive the indexed `name`: everything before the last underscore in the
/// file's basename (extension stripped), falling back to the archive's own
/// `name_hint` when the filename carries no underscore to split on.
fn derive_name(path: &Path, metadata: &ArchiveMetadata) -> std::result::Result<String, String> {
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        if let Some((name_part, _rest)) = stem.rsplit_once('_') {
            if !name_part.is_empty() {
                return Ok(name_part.to_string());
            }
        }
    }
    metadata
        .name_hint
        .clone()
        .ok_or_else(|| "filename has no underscore and archive carries no name_hint".to_string())
}

/// Either a live SQLite connection, or a degraded mode entered when the
/// index file is absent and the box directory turns out to be read-only —
/// `query`/`locate` fall back to direct filesystem enumeration in that mode,
/// and every write operation fails fast with `IndexReadOnly`.
enum Backend {
    Sqlite(Mutex<Connection>),
    Degraded,
}

/// What `open_connection` produced: a usable connection (plus whether the
/// schema was just (re)created and still needs populating), or a decision to
/// degrade to filesystem enumeration.
enum ConnectOutcome {
    Ready(Connection, bool),
    Degraded,
}

pub struct BoxIndex {
    box_name: String,
    box_dir: PathBuf,
    db_path: PathBuf,
    backend: Backend,
}

impl BoxIndex {
    /// Open (or create) the index for `box_dir`. If the database file is
    /// missing, unreadable as SQLite, or at the wrong schema version, the
    /// tables are recreated and the whole directory is walked and
    /// re-ingested before returning — callers never see a half-open index.
    /// Otherwise, a fast-path `sync` picks up any files added since the
    /// last open. If the index file is absent and cannot be created (a
    /// read-only box directory), the box degrades to filesystem enumeration
    /// instead of failing to open.
    pub fn open(box_name: impl Into<String>, box_dir: &Path, journal_mode: JournalMode) -> Result<Self> {
        let box_name = box_name.into();
        let box_dir = box_dir.to_path_buf();
        let db_path = box_dir.join(INDEX_FILE_NAME);

        match Self::open_connection(&db_path, journal_mode)? {
            ConnectOutcome::Degraded => Ok(Self {
                box_name,
                box_dir,
                db_path,
                backend: Backend::Degraded,
            }),
            ConnectOutcome::Ready(conn, needs_full_ingest) => {
                let index = Self {
                    box_name,
                    box_dir,
                    db_path,
                    backend: Backend::Sqlite(Mutex::new(conn)),
                };

                if needs_full_ingest {
                    index.ingest_all_within_existing_schema()?;
                } else if let Err(e) = index.sync() {
                    // A pre-existing, schema-current index on a read-only
                    // filesystem is still fully queryable; only picking up
                    // files added since the last open requires a write.
                    match e {
                        BeadError::IndexReadOnly { .. } => {
                            tracing::warn!(path = %index.db_path.display(), "index is read-only; serving existing rows without syncing new files");
                        }
                        other => return Err(other),
                    }
                }

                Ok(index)
            }
        }
    }

    /// Returns the connection plus whether the schema had to be (re)created,
    /// meaning the caller still needs to populate rows. The probe reads
    /// `PRAGMA user_version` before touching anything else, so a read-only
    /// filesystem with a healthy, current-version index never fails here
    /// even though setting `journal_mode` afterward might.
    fn open_connection(db_path: &Path, journal_mode: JournalMode) -> Result<ConnectOutcome> {
        let existed_before = db_path.exists();
        let probe = Connection::open(db_path).map_err(BeadError::Sqlite).and_then(|conn| {
            let version: i64 = conn
                .query_row("PRAGMA user_version", [], |row| row.get(0))
                .map_err(BeadError::Sqlite)?;
            Ok((conn, version))
        });

        let (conn, needs_full_ingest) = match probe {
            Ok((conn, v)) if v == CURRENT_SCHEMA_VERSION => (conn, false),
            Ok((conn, _)) => {
                tracing::warn!(path = %db_path.display(), "index schema version mismatch, rebuilding");
                Self::create_schema(&conn)?;
                (conn, true)
            }
            Err(e) if !existed_before => {
                tracing::warn!(
                    path = %db_path.display(),
                    error = %e,
                    "{}",
                    BeadError::IndexUnavailable { path: db_path.to_path_buf() },
                );
                return Ok(ConnectOutcome::Degraded);
            }
            Err(e) => {
                tracing::warn!(path = %db_path.display(), error = %e, "index unreadable as sqlite, recreating");
                let _ = fs::remove_file(db_path);
                let conn = Connection::open(db_path).map_err(|e| BeadError::IndexUnwritable {
                    path: db_path.to_path_buf(),
                    source: e,
                })?;
                Self::create_schema(&conn)?;
                (conn, true)
            }
        };

        if let Err(e) = conn.busy_timeout(Duration::from_millis(250)) {
            tracing::warn!(path = %db_path.display(), error = %e, "could not set busy_timeout");
        }
        if let Err(e) = conn.pragma_update(None, "journal_mode", journal_mode.as_pragma_value()) {
            tracing::warn!(path = %db_path.display(), error = %e, "could not set journal_mode, continuing with existing mode");
        }
        // SQLite enforces `ON DELETE CASCADE` (and FK constraints generally)
        // only when this pragma is on for the connection; it is off by
        // default and is not persisted in the database file itself.
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(BeadError::Sqlite)?;

        Ok(ConnectOutcome::Ready(conn, needs_full_ingest))
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch("DROP TABLE IF EXISTS inputs; DROP TABLE IF EXISTS beads;")
            .map_err(BeadError::Sqlite)?;
        conn.execute_batch(SCHEMA_SQL).map_err(BeadError::Sqlite)?;
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
            .map_err(BeadError::Sqlite)?;
        Ok(())
    }

    /// Lock the live SQLite connection, or fail fast with `IndexReadOnly`
    /// when this index is running in degraded (filesystem-only) mode.
    fn writable_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        match &self.backend {
            Backend::Sqlite(m) => Ok(m.lock().expect("index mutex poisoned")),
            Backend::Degraded => Err(BeadError::IndexReadOnly {
                path: self.db_path.clone(),
            }),
        }
    }

    /// Populate a just-(re)created, still-empty schema from the directory.
    /// Used only from `open` right after `open_connection` recreated the
    /// tables; `rebuild` recreates the schema itself and calls the same
    /// ingest loop under its own transaction.
    fn ingest_all_within_existing_schema(&self) -> Result<()> {
        let mut conn = self.writable_conn()?;
        with_retry(|| {
            let tx = conn.transaction()?;
            ingest_directory(&tx, &self.box_dir)?;
            tx.commit()
        })
        .map_err(|outcome| self.classify_write_error(outcome))
    }

    fn classify_write_error(&self, outcome: RetryOutcome) -> BeadError {
        match outcome {
            RetryOutcome::Busy { attempts } => BeadError::IndexBusy {
                path: self.db_path.clone(),
                attempts,
            },
            RetryOutcome::Failed(e) if is_readonly(&e) => BeadError::IndexReadOnly {
                path: self.db_path.clone(),
            },
            RetryOutcome::Failed(e) => BeadError::IndexUnwritable {
                path: self.db_path.clone(),
                source: e,
            },
        }
    }

    /// Drop and recreate both tables, then walk the directory and ingest
    /// every file that parses as an archive, skipping and logging the rest.
    /// One transaction: either the index is replaced in full or not at all.
    pub fn rebuild(&self) -> Result<()> {
        let mut conn = self.writable_conn()?;
        with_retry(|| {
            let tx = conn.transaction()?;
            tx.execute_batch("DROP TABLE IF EXISTS inputs; DROP TABLE IF EXISTS beads;")?;
            tx.execute_batch(SCHEMA_SQL)?;
            tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
            ingest_directory(&tx, &self.box_dir)?;
            tx.commit()
        })
        .map_err(|outcome| self.classify_write_error(outcome))
    }

    /// Ingest only files not already indexed. Each file is ingested in its
    /// own short-lived transaction, so one bad file late in the listing
    /// doesn't roll back files already ingested earlier in the same call.
    pub fn sync(&self) -> Result<()> {
        let known_paths: std::collections::HashSet<String> = {
            let conn = self.writable_conn()?;
            let mut stmt = conn
                .prepare("SELECT file_path FROM beads")
                .map_err(BeadError::Sqlite)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(BeadError::Sqlite)?;
            let mut set = std::collections::HashSet::new();
            for row in rows {
                set.insert(row.map_err(BeadError::Sqlite)?);
            }
            set
        };

        let entries = match fs::read_dir(&self.box_dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %self.box_dir.display(), error = %e, "cannot read box directory during sync");
                return Ok(());
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if is_sidecar_or_own_file(file_name) || known_paths.contains(file_name) {
                continue;
            }

            let mut conn = self.writable_conn()?;
            let outcome = with_retry(|| {
                let tx = conn.transaction()?;
                if let Err(e) = ingest_one(&tx, &path) {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unindexable archive during sync");
                    return Ok(());
                }
                tx.commit()
            });
            if let Err(outcome) = outcome {
                return Err(self.classify_write_error(outcome));
            }
        }

        Ok(())
    }

    /// Ingest one file by absolute or box-relative path, returning the
    /// resulting record. Used by `Box::store` right after writing a new
    /// archive into the directory.
    pub fn add(&self, archive_path: &Path) -> Result<BeadRecord> {
        let abs_path = if archive_path.is_absolute() {
            archive_path.to_path_buf()
        } else {
            self.box_dir.join(archive_path)
        };

        let metadata = ArchiveReader::open(&abs_path)?;
        let name = derive_name(&abs_path, &metadata).map_err(|reason| BeadError::ArchiveInvalid {
            path: abs_path.clone(),
            reason,
        })?;
        let file_name = abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BeadError::ArchiveInvalid {
                path: abs_path.clone(),
                reason: "non-utf8 file name".to_string(),
            })?
            .to_string();

        let mut conn = self.writable_conn()?;
        with_retry(|| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO beads (name, content_id, kind, freeze_name, freeze_time_str, file_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    name,
                    metadata.content_id,
                    metadata.kind,
                    metadata.freeze_name,
                    metadata.freeze_time,
                    file_name,
                ],
            )?;
            let bead_id = tx.last_insert_rowid();
            for input in &metadata.inputs {
                tx.execute(
                    "INSERT INTO inputs (bead_id, input_name, input_kind, input_content_id, input_freeze_time_str)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        bead_id,
                        input.input_name,
                        input.input_kind,
                        input.input_content_id,
                        input.input_freeze_time,
                    ],
                )?;
            }
            tx.commit()
        })
        .map_err(|outcome| self.classify_write_error(outcome))?;

        Ok(BeadRecord {
            box_name: self.box_name.clone(),
            name,
            kind: metadata.kind,
            content_id: metadata.content_id,
            freeze_name: metadata.freeze_name,
            freeze_time: metadata.freeze_time,
            inputs: metadata.inputs,
        })
    }

    /// Delete the `beads` row for `archive_path` (absolute or box-relative);
    /// cascades to `inputs` via the schema's `ON DELETE CASCADE`.
    pub fn remove(&self, archive_path: &Path) -> Result<()> {
        let file_name = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BeadError::ArchiveInvalid {
                path: archive_path.to_path_buf(),
                reason: "non-utf8 file name".to_string(),
            })?
            .to_string();

        let mut conn = self.writable_conn()?;
        with_retry(|| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM beads WHERE file_path = ?1", rusqlite::params![file_name])?;
            tx.commit()
        })
        .map_err(|outcome| self.classify_write_error(outcome))
    }

    /// Execute `conditions` and hydrate matching rows into `BeadRecord`s. If
    /// `with_inputs` is set, issues one additional batched query against
    /// `inputs` instead of one query per row. In degraded mode, conditions
    /// are applied in-memory over a direct directory walk instead.
    pub fn query(&self, conditions: &[Condition], with_inputs: bool) -> Result<Vec<BeadRecord>> {
        let conn = match &self.backend {
            Backend::Sqlite(m) => m.lock().expect("index mutex poisoned"),
            Backend::Degraded => return Ok(self.query_degraded(conditions, with_inputs)),
        };
        let compiled = compile(conditions);
        let sql = format!(
            "SELECT bead_id, name, content_id, kind, freeze_name, freeze_time_str FROM beads WHERE {}",
            compiled.where_clause
        );
        let mut stmt = conn.prepare(&sql).map_err(BeadError::Sqlite)?;
        let bound_params: Vec<&dyn rusqlite::ToSql> =
            compiled.params.iter().map(|p| p.as_ref()).collect();

        let mut bead_rows = Vec::new();
        {
            let rows = stmt
                .query_map(rusqlite::params_from_iter(bound_params), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(BeadError::Sqlite)?;
            for row in rows {
                bead_rows.push(row.map_err(BeadError::Sqlite)?);
            }
        }

        let mut inputs_by_bead: HashMap<i64, Vec<InputSpec>> = HashMap::new();
        if with_inputs && !bead_rows.is_empty() {
            let placeholders: Vec<String> = (1..=bead_rows.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT bead_id, input_name, input_kind, input_content_id, input_freeze_time_str \
                 FROM inputs WHERE bead_id IN ({})",
                placeholders.join(",")
            );
            let mut stmt = conn.prepare(&sql).map_err(BeadError::Sqlite)?;
            let ids: Vec<i64> = bead_rows.iter().map(|r| r.0).collect();
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        InputSpec {
                            input_name: row.get(1)?,
                            input_kind: row.get(2)?,
                            input_content_id: row.get(3)?,
                            input_freeze_time: row.get(4)?,
                        },
                    ))
                })
                .map_err(BeadError::Sqlite)?;
            for row in rows {
                let (bead_id, spec) = row.map_err(BeadError::Sqlite)?;
                inputs_by_bead.entry(bead_id).or_default().push(spec);
            }
        }

        Ok(bead_rows
            .into_iter()
            .map(|(bead_id, name, content_id, kind, freeze_name, freeze_time)| BeadRecord {
                box_name: self.box_name.clone(),
                name,
                kind,
                content_id,
                freeze_name,
                freeze_time,
                inputs: inputs_by_bead.remove(&bead_id).unwrap_or_default(),
            })
            .collect())
    }

    /// In-memory equivalent of `query` for degraded mode: walk the box
    /// directory, open each archive, and filter with the same condition
    /// semantics `ConditionCompiler` gives the SQL path.
    fn query_degraded(&self, conditions: &[Condition], with_inputs: bool) -> Vec<BeadRecord> {
        self.enumerate_archives()
            .into_iter()
            .filter_map(|(path, metadata)| {
                let name = derive_name(&path, &metadata).ok()?;
                if !record_matches(conditions, &name, &metadata.kind, &metadata.content_id, &metadata.freeze_time) {
                    return None;
                }
                Some(BeadRecord {
                    box_name: self.box_name.clone(),
                    name,
                    kind: metadata.kind,
                    content_id: metadata.content_id,
                    freeze_name: metadata.freeze_name,
                    freeze_time: metadata.freeze_time,
                    inputs: if with_inputs { metadata.inputs } else { Vec::new() },
                })
            })
            .collect()
    }

    /// Walk `box_dir` non-recursively, opening every candidate file as an
    /// archive and skipping (with a warning) anything `ArchiveReader`
    /// rejects. Shared by `query`/`locate`'s degraded-mode fallback.
    fn enumerate_archives(&self) -> Vec<(PathBuf, ArchiveMetadata)> {
        let entries = match fs::read_dir(&self.box_dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %self.box_dir.display(), error = %e, "cannot read box directory during filesystem enumeration");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if is_sidecar_or_own_file(file_name) {
                continue;
            }
            match ArchiveReader::open(&path) {
                Ok(metadata) => out.push((path, metadata)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unindexable archive during filesystem enumeration");
                }
            }
        }
        out
    }

    /// Resolve `(name, content_id)` to a box-absolute file path.
    pub fn locate(&self, name: &str, content_id: &str) -> Result<PathBuf> {
        let conn = match &self.backend {
            Backend::Sqlite(m) => m.lock().expect("index mutex poisoned"),
            Backend::Degraded => return self.locate_degraded(name, content_id),
        };
        let mut stmt = conn
            .prepare("SELECT file_path FROM beads WHERE name = ?1 AND content_id = ?2")
            .map_err(BeadError::Sqlite)?;
        let mut rows = stmt
            .query(rusqlite::params![name, content_id])
            .map_err(BeadError::Sqlite)?;

        let mut matches = Vec::new();
        while let Some(row) = rows.next().map_err(BeadError::Sqlite)? {
            matches.push(row.get::<_, String>(0).map_err(BeadError::Sqlite)?);
        }

        match matches.len() {
            0 => Err(BeadError::NotFound {
                box_name: self.box_name.clone(),
                name: name.to_string(),
                content_id: content_id.to_string(),
            }),
            1 => Ok(self.box_dir.join(&matches[0])),
            count => Err(BeadError::Ambiguous {
                box_name: self.box_name.clone(),
                name: name.to_string(),
                content_id: content_id.to_string(),
                count,
            }),
        }
    }

    /// In-memory equivalent of `locate` for degraded mode.
    fn locate_degraded(&self, name: &str, content_id: &str) -> Result<PathBuf> {
        let matches: Vec<PathBuf> = self
            .enumerate_archives()
            .into_iter()
            .filter_map(|(path, metadata)| {
                let derived = derive_name(&path, &metadata).ok()?;
                (derived == name && metadata.content_id == content_id).then_some(path)
            })
            .collect();

        match matches.len() {
            0 => Err(BeadError::NotFound {
                box_name: self.box_name.clone(),
                name: name.to_string(),
                content_id: content_id.to_string(),
            }),
            1 => Ok(matches.into_iter().next().expect("len checked above")),
            count => Err(BeadError::Ambiguous {
                box_name: self.box_name.clone(),
                name: name.to_string(),
                content_id: content_id.to_string(),
                count,
            }),
        }
    }
}

/// Walk `box_dir` (non-recursive) and ingest every candidate file, logging
/// and skipping anything `ArchiveReader` or the insert itself rejects.
/// Returns `Err` only for a directory read failure or a genuine SQL error
/// unrelated to any one file (e.g. transaction setup); per-file failures
/// never propagate.
fn ingest_directory(tx: &rusqlite::Transaction<'_>, box_dir: &Path) -> rusqlite::Result<()> {
    let entries = match fs::read_dir(box_dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %box_dir.display(), error = %e, "cannot read box directory during rebuild");
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_sidecar_or_own_file(file_name) {
            continue;
        }
        if let Err(e) = ingest_one(tx, &path) {
            tracing::warn!(path = %path.display(), error = %e, "skipping unindexable archive during rebuild");
        }
    }
    Ok(())
}

/// Ingest one file inside an already-open transaction. A failure here —
/// unreadable archive, missing metadata, or a `UNIQUE(name, content_id)`
/// collision with an already-ingested row — is always scoped to this file;
/// the caller logs and moves on rather than aborting the whole rebuild/sync.
fn ingest_one(tx: &rusqlite::Transaction<'_>, path: &Path) -> Result<()> {
    let metadata = ArchiveReader::open(path)?;
    let name = derive_name(path, &metadata).map_err(|reason| BeadError::ArchiveInvalid {
        path: path.to_path_buf(),
        reason,
    })?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BeadError::ArchiveInvalid {
            path: path.to_path_buf(),
            reason: "non-utf8 file name".to_string(),
        })?;

    // A savepoint scoped to this one file: the beads row and its input rows
    // commit or roll back together, so a failure partway through (e.g. a
    // `UNIQUE(bead_id, input_name)` collision on a malformed input list)
    // never leaves an inputs-less beads row behind for the caller to skip.
    // Raw SAVEPOINT/RELEASE/ROLLBACK TO rather than `Transaction::savepoint`
    // — the latter needs `&mut Transaction`, and this function shares one
    // transaction across every file in the directory walk.
    tx.execute_batch("SAVEPOINT ingest_one")
        .map_err(|e| BeadError::ArchiveInvalid {
            path: path.to_path_buf(),
            reason: format!("cannot open savepoint: {e}"),
        })?;

    let result: Result<()> = (|| {
        tx.execute(
            "INSERT INTO beads (name, content_id, kind, freeze_name, freeze_time_str, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                name,
                metadata.content_id,
                metadata.kind,
                metadata.freeze_name,
                metadata.freeze_time,
                file_name,
            ],
        )
        .map_err(|e| BeadError::ArchiveInvalid {
            path: path.to_path_buf(),
            reason: format!("insert failed, likely a duplicate (name, content_id): {e}"),
        })?;

        let bead_id = tx.last_insert_rowid();
        for input in &metadata.inputs {
            tx.execute(
                "INSERT INTO inputs (bead_id, input_name, input_kind, input_content_id, input_freeze_time_str)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    bead_id,
                    input.input_name,
                    input.input_kind,
                    input.input_content_id,
                    input.input_freeze_time,
                ],
            )
            .map_err(|e| BeadError::ArchiveInvalid {
                path: path.to_path_buf(),
                reason: format!("input insert failed: {e}"),
            })?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => tx.execute_batch("RELEASE ingest_one").map_err(|e| BeadError::ArchiveInvalid {
            path: path.to_path_buf(),
            reason: format!("cannot release savepoint: {e}"),
        }),
        Err(err) => {
            let _ = tx.execute_batch("ROLLBACK TO ingest_one; RELEASE ingest_one;");
            Err(err)
        }
    }
}
