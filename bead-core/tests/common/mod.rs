use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Minimal archive metadata used to build a test zip. `inputs` mirrors
/// `meta/bead.json`'s `inputs` array.
pub struct TestMeta<'a> {
    pub kind: &'a str,
    pub content_id: &'a str,
    pub freeze_name: &'a str,
    pub freeze_time: &'a str,
    pub name_hint: Option<&'a str>,
    pub inputs: Vec<(&'a str, &'a str, &'a str, &'a str)>,
}

impl<'a> TestMeta<'a> {
    pub fn new(kind: &'a str, content_id: &'a str, freeze_time: &'a str) -> Self {
        Self {
            kind,
            content_id,
            freeze_name: content_id,
            freeze_time,
            name_hint: None,
            inputs: Vec::new(),
        }
    }
}

/// Write a minimal valid BEAD archive zip at `dir/file_name`, containing
/// `meta/bead.json` plus one trivial `data/` entry. Returns the full path.
pub fn write_archive(dir: &Path, file_name: &str, meta: &TestMeta) -> PathBuf {
    let path = dir.join(file_name);
    let file = File::create(&path).expect("create archive file");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    let inputs_json: Vec<_> = meta
        .inputs
        .iter()
        .map(|(name, kind, content_id, freeze_time)| {
            json!({
                "input_name": name,
                "input_kind": kind,
                "input_content_id": content_id,
                "input_freeze_time": freeze_time,
            })
        })
        .collect();

    let body = json!({
        "kind": meta.kind,
        "content_id": meta.content_id,
        "freeze_name": meta.freeze_name,
        "freeze_time": meta.freeze_time,
        "name_hint": meta.name_hint,
        "inputs": inputs_json,
    });

    zip.start_file("meta/bead.json", options).expect("start meta entry");
    zip.write_all(serde_json::to_string_pretty(&body).unwrap().as_bytes())
        .expect("write meta entry");

    zip.start_file("data/output.txt", options).expect("start data entry");
    zip.write_all(b"result\n").expect("write data entry");

    zip.start_file("code/run.py", options).expect("start code entry");
    zip.write_all(b"print('hello')\n").expect("write code entry");

    zip.finish().expect("finish archive zip");
    path
}

/// Overwrite an existing archive file's contents with a different one,
/// leaving the path unchanged — used to simulate out-of-sync corruption.
pub fn overwrite_archive(path: &Path, meta: &TestMeta) {
    let file = File::create(path).expect("recreate archive file");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    let body = json!({
        "kind": meta.kind,
        "content_id": meta.content_id,
        "freeze_name": meta.freeze_name,
        "freeze_time": meta.freeze_time,
        "name_hint": meta.name_hint,
        "inputs": Vec::<serde_json::Value>::new(),
    });

    zip.start_file("meta/bead.json", options).expect("start meta entry");
    zip.write_all(serde_json::to_string_pretty(&body).unwrap().as_bytes())
        .expect("write meta entry");
    zip.finish().expect("finish archive zip");
}
