//! Pure data types returned by queries: [`BeadRecord`] and [`InputSpec`].
//!
//! Constructed in three places: hydrated from an index row, built from
//! [`crate::archive::ArchiveMetadata`] during ingest, or built directly by
//! tests. Never mutated after construction.

use serde::{Deserialize, Serialize};

/// Identity of one input binding, captured at the moment the owning bead was
/// frozen. `input_name` is the name by which the owning bead refers to this
/// input; the rest pins down which version of that input was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub input_name: String,
    pub input_kind: String,
    pub input_content_id: String,
    pub input_freeze_time: String,
}

/// Lightweight metadata tuple identifying an archive without opening it.
///
/// `freeze_name` is carried for display only — it must never be used to
/// resolve or look up an archive; `name` (derived from the filename) is the
/// only name `BoxIndex::locate` understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeadRecord {
    pub box_name: String,
    pub name: String,
    pub kind: String,
    pub content_id: String,
    pub freeze_name: String,
    pub freeze_time: String,
    pub inputs: Vec<InputSpec>,
}

impl BeadRecord {
    /// Structural equality for resolution purposes, per spec: identity is
    /// `(box_name, name, content_id)`, not full field equality.
    pub fn matches_identity(&self, other: &BeadRecord) -> bool {
        self.box_name == other.box_name
            && self.name == other.name
            && self.content_id == other.content_id
    }
}

/// `freeze_time` is a fixed-width UTC ISO-8601 string; lexicographic order on
/// it is chronological order, so records compare and sort directly on it.
impl PartialOrd for BeadRecord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for BeadRecord {}

impl Ord for BeadRecord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.freeze_time
            .cmp(&other.freeze_time)
            .then_with(|| self.content_id.cmp(&other.content_id))
    }
}
