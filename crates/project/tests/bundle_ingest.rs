use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};

use tempfile::tempdir;
use vaultview_core::{BundleEntry, MatchStrategy, RecordKind};
use vaultview_project::{
    ingest, ingest_archive, BundleSource, IngestOptions, ResolvedAsset, ViewerStore,
};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.add_directory("vault/", options).expect("dir entry");
    for (path, bytes) in files {
        writer.start_file(*path, options).expect("start file");
        writer.write_all(bytes).expect("write file");
    }
    writer.finish().expect("finish archive").into_inner()
}

#[test]
fn archive_ingest_classifies_and_skips_directories() {
    let bytes = archive(&[
        ("vault/Welcome.md", "# Welcome\n![[Pasted image.png]]".as_bytes()),
        ("vault/Pasted image.png", &[0x89, b'P', b'N', b'G'][..]),
        ("vault/.obsidian/app.json", "{}".as_bytes()),
    ]);
    let bundle = ingest_archive("vault.zip", &bytes, &IngestOptions::default()).expect("ingest");

    assert_eq!(bundle.index.len(), 3);
    assert_eq!(
        bundle.index.get("vault/Welcome.md").unwrap().kind(),
        RecordKind::Text
    );
    assert_eq!(
        bundle.index.get("vault/Pasted image.png").unwrap().kind(),
        RecordKind::Binary
    );
    assert_eq!(
        bundle.index.get("vault/.obsidian/app.json").unwrap().kind(),
        RecordKind::Unclassified
    );
    assert!(bundle.diagnostics.is_empty());
}

#[test]
fn index_keys_match_tree_leaves_except_dropped_conflicts() {
    let entries = vec![
        BundleEntry::new("a/b.md", "b"),
        BundleEntry::new("a/c/d.png", "d"),
        BundleEntry::new("a/c", "clash"),
        BundleEntry::new("e.md", "e"),
        BundleEntry::new("a/b.md/f.md", "clash"),
    ];
    let bundle = ingest(entries, &IngestOptions::default()).expect("ingest");

    let keys: BTreeSet<&str> = bundle.index.paths().collect();
    let leaves: BTreeSet<&str> = bundle
        .tree
        .files()
        .into_iter()
        .map(|record| record.path())
        .collect();
    let dropped: BTreeSet<&str> = bundle
        .diagnostics
        .iter()
        .filter(|anomaly| anomaly.code() == "tree-conflict")
        .map(|anomaly| anomaly.path())
        .collect();

    assert_eq!(dropped, BTreeSet::from(["a/c", "a/b.md/f.md"]));
    let expected: BTreeSet<&str> = keys.difference(&dropped).copied().collect();
    assert_eq!(leaves, expected);
}

#[test]
fn folder_and_archive_sources_agree() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("vault");
    fs::create_dir_all(root.join("notes")).expect("mkdir");
    fs::write(root.join("notes").join("a.md"), "see ![](../img.png)").expect("write");
    fs::write(root.join("img.png"), [1u8, 2, 3]).expect("write");

    let mut from_folder = ViewerStore::default();
    from_folder
        .load(BundleSource::Folder(root))
        .expect("folder load");

    let mut from_archive = ViewerStore::default();
    from_archive
        .load(BundleSource::Archive {
            name: "Vault.ZIP".into(),
            bytes: archive(&[
                ("vault/notes/a.md", "see ![](../img.png)".as_bytes()),
                ("vault/img.png", &[1, 2, 3][..]),
            ]),
        })
        .expect("archive load");

    for store in [&mut from_folder, &mut from_archive] {
        store.select("vault/notes/a.md").expect("select");
        match store.resolve_asset("vault/notes/a.md", "../img.png") {
            ResolvedAsset::Record {
                record,
                strategy,
                url,
            } => {
                assert_eq!(record.path(), "vault/img.png");
                assert_eq!(strategy, MatchStrategy::Relative);
                assert!(url.is_some());
            }
            other => panic!("unexpected resolution {other:?}"),
        }
    }
}

#[test]
fn empty_folder_is_rejected_and_state_kept() {
    let dir = tempdir().expect("tempdir");
    let mut store = ViewerStore::default();
    let err = store
        .load(BundleSource::Folder(dir.path().to_path_buf()))
        .unwrap_err();
    assert_eq!(err.user_message(), "The selected bundle contains no files.");
    assert!(store.state().bundle.is_none());
    assert!(store.state().error.is_some());
}
