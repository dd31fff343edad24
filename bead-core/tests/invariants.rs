mod common;

use bead_core::Box as BeadBox;
use common::{write_archive, TestMeta};

#[test]
fn rebuild_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(
        dir.path(),
        "alpha_20200101T000000.000000Z.zip",
        &TestMeta::new("k1", "c1", "20200101T000000.000000Z"),
    );
    write_archive(
        dir.path(),
        "beta_20200202T000000.000000Z.zip",
        &TestMeta::new("k1", "c2", "20200202T000000.000000Z"),
    );

    let b = BeadBox::open("mybox", dir.path()).unwrap();
    let mut first: Vec<_> = b
        .get_beads(&[])
        .unwrap()
        .into_iter()
        .map(|r| (r.name, r.content_id))
        .collect();
    first.sort();

    // Re-ingesting via a fresh open after deleting the index should produce
    // an identical row set, not accumulate duplicates or drop anything.
    drop(b);
    std::fs::remove_file(dir.path().join(".index.sqlite")).unwrap();
    let b2 = BeadBox::open("mybox", dir.path()).unwrap();
    let mut second: Vec<_> = b2
        .get_beads(&[])
        .unwrap()
        .into_iter()
        .map(|r| (r.name, r.content_id))
        .collect();
    second.sort();

    assert_eq!(first, second);
}

#[test]
fn store_then_remove_returns_to_the_pre_store_result_set() {
    let dir = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    write_archive(
        dir.path(),
        "alpha_20200101T000000.000000Z.zip",
        &TestMeta::new("k1", "c1", "20200101T000000.000000Z"),
    );
    let b = BeadBox::open("mybox", dir.path()).unwrap();
    let before = b.get_beads(&[]).unwrap().len();
    assert_eq!(before, 1);

    let incoming = write_archive(
        staging.path(),
        "incoming.zip",
        &TestMeta::new("k1", "c2", "20200303T000000.000000Z"),
    );
    let record = b.store(&incoming).unwrap();
    assert_eq!(b.get_beads(&[]).unwrap().len(), 2);

    let stored_path = dir.path().join(format!("{}_{}.zip", record.name, record.freeze_time));
    std::fs::remove_file(&stored_path).unwrap();

    // The filesystem and index agree again once the stale row is dropped via
    // a fresh open's rebuild path (no standalone `Box::remove` on the public
    // surface — `store`'s counterpart is a plain filesystem delete followed
    // by re-sync).
    drop(b);
    std::fs::remove_file(dir.path().join(".index.sqlite")).unwrap();
    let b2 = BeadBox::open("mybox", dir.path()).unwrap();
    assert_eq!(b2.get_beads(&[]).unwrap().len(), before);
}

#[test]
fn removing_a_consumer_cascades_its_own_input_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(
        dir.path(),
        "p_20200101T000000.000000Z.zip",
        &TestMeta::new("k1", "pcontent", "20200101T000000.000000Z"),
    );
    write_archive(
        dir.path(),
        "c_20200202T000000.000000Z.zip",
        &TestMeta {
            inputs: vec![("in", "k1", "pcontent", "20200101T000000.000000Z")],
            ..TestMeta::new("k2", "ccontent", "20200202T000000.000000Z")
        },
    );

    let b = BeadBox::open("mybox", dir.path()).unwrap();
    assert_eq!(b.get_beads(&[]).unwrap().len(), 2);
    drop(b);

    let conn = rusqlite::Connection::open(dir.path().join(".index.sqlite")).unwrap();
    conn.pragma_update(None, "foreign_keys", true).unwrap();
    let inputs_before: i64 = conn.query_row("SELECT COUNT(*) FROM inputs", [], |r| r.get(0)).unwrap();
    assert_eq!(inputs_before, 1);
    conn.execute(
        "DELETE FROM beads WHERE content_id = ?1",
        rusqlite::params!["ccontent"],
    )
    .unwrap();

    let inputs_after: i64 = conn.query_row("SELECT COUNT(*) FROM inputs", [], |r| r.get(0)).unwrap();
    assert_eq!(inputs_after, 0, "ON DELETE CASCADE should drop the consumer's own input row");

    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM inputs WHERE bead_id NOT IN (SELECT bead_id FROM beads)",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
}
