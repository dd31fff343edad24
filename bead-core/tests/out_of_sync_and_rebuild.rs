mod common;

use bead_core::Box as BeadBox;
use common::{overwrite_archive, write_archive, TestMeta};

#[test]
fn resolve_detects_out_of_sync_when_file_is_replaced_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        "x_20200101T000000.000000Z.zip",
        &TestMeta::new("k1", "cX", "20200101T000000.000000Z"),
    );

    let b = BeadBox::open("mybox", dir.path()).unwrap();
    let record = b.get_beads(&[]).unwrap().into_iter().next().unwrap();
    assert_eq!(record.content_id, "cX");

    // Someone replaces the bytes at the same path without going through
    // this crate at all. The index still has the old row.
    overwrite_archive(&path, &TestMeta::new("k1", "cY", "20200101T000000.000000Z"));

    let err = b.resolve(&record).unwrap_err();
    assert!(matches!(err, bead_core::BeadError::IndexOutOfSync { .. }));
}

#[test]
fn truncated_index_file_is_rebuilt_transparently_on_open() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(
        dir.path(),
        "a_20200101T000000.000000Z.zip",
        &TestMeta::new("k1", "c1", "20200101T000000.000000Z"),
    );
    write_archive(
        dir.path(),
        "b_20200101T000000.000000Z.zip",
        &TestMeta::new("k1", "c2", "20200101T000000.000000Z"),
    );

    let b = BeadBox::open("mybox", dir.path()).unwrap();
    assert_eq!(b.get_beads(&[]).unwrap().len(), 2);
    drop(b);

    std::fs::write(dir.path().join(".index.sqlite"), b"not a real sqlite file").unwrap();

    let b2 = BeadBox::open("mybox", dir.path()).unwrap();
    let records = b2.get_beads(&[]).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn schema_version_mismatch_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(
        dir.path(),
        "a_20200101T000000.000000Z.zip",
        &TestMeta::new("k1", "c1", "20200101T000000.000000Z"),
    );

    {
        let conn = rusqlite::Connection::open(dir.path().join(".index.sqlite")).unwrap();
        conn.pragma_update(None, "user_version", 99i64).unwrap();
    }

    let b = BeadBox::open("mybox", dir.path()).unwrap();
    assert_eq!(b.get_beads(&[]).unwrap().len(), 1);
}
