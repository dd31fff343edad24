//! The literal index schema, kept as one `const` so `rebuild` always
//! recreates exactly this shape and the DDL lives in one place.

/// Bumped whenever `SCHEMA_SQL` changes shape; compared against
/// `PRAGMA user_version` on `open`.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE beads (
    bead_id           INTEGER PRIMARY KEY,
    name              TEXT NOT NULL,
    content_id        TEXT NOT NULL,
    kind              TEXT NOT NULL,
    freeze_name       TEXT NOT NULL,
    freeze_time_str   TEXT NOT NULL,
    file_path         TEXT NOT NULL,
    UNIQUE(file_path),
    UNIQUE(name, content_id)
);
CREATE INDEX idx_beads_name        ON beads(name);
CREATE INDEX idx_beads_content_id  ON beads(content_id);
CREATE INDEX idx_beads_kind        ON beads(kind);
CREATE INDEX idx_beads_freeze_time ON beads(freeze_time_str);

CREATE TABLE inputs (
    input_id              INTEGER PRIMARY KEY,
    bead_id               INTEGER NOT NULL,
    input_name            TEXT NOT NULL,
    input_kind            TEXT NOT NULL,
    input_content_id      TEXT NOT NULL,
    input_freeze_time_str TEXT NOT NULL,
    FOREIGN KEY (bead_id) REFERENCES beads(bead_id) ON DELETE CASCADE,
    UNIQUE(bead_id, input_name)
);
CREATE INDEX idx_inputs_bead_id    ON inputs(bead_id);
CREATE INDEX idx_inputs_content_id ON inputs(input_content_id);
CREATE INDEX idx_inputs_kind       ON inputs(input_kind);
CREATE INDEX idx_inputs_name       ON inputs(input_name);
"#;
