//! Turning raw bundle entries into an index and tree.
//! 將原始套件項目轉為索引與檔案樹。

use std::path::Path;

use thiserror::Error;
use vaultview_core::{
    classify, decode_archive, is_archive_name, read_folder, Anomaly, BundleEntry, Diagnostics,
    FlatIndex, SourceError,
};

use crate::tree::{build_tree, TreeNode, DEFAULT_MAX_PATH_COMPONENTS};

/// 匯入參數。 / Knobs for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub max_path_components: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_path_components: DEFAULT_MAX_PATH_COMPONENTS,
        }
    }
}

/// Failures that abort a whole ingestion. Nothing is published when one occurs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("bundle contains no files")]
    EmptyBundle,
}

impl IngestError {
    /// 顯示給使用者的簡短訊息。 / Short message shown where the failed load was requested.
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestError::Source(SourceError::NotAnArchive { .. }) => "Please upload a .zip file.",
            IngestError::Source(err) if err.is_archive_decode() => {
                "Error processing ZIP file. Make sure it is a valid zip."
            }
            IngestError::Source(_) => {
                "Could not read folder contents. Ensure you're selecting a readable folder."
            }
            IngestError::EmptyBundle => "The selected bundle contains no files.",
        }
    }
}

/// A fully ingested bundle: lookup index, display tree and ingestion anomalies.
/// 完成匯入的套件。
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub index: FlatIndex,
    pub tree: TreeNode,
    pub diagnostics: Diagnostics,
}

impl LoadedBundle {
    /// Number of index records that made it into the tree.
    pub fn placed_count(&self) -> usize {
        self.tree.files().len()
    }
}

/// Classifies every entry, indexes it and builds the tree.
///
/// Duplicate paths keep the last entry and are reported. Per-entry decode failures
/// degrade that entry only; an empty entry list fails the whole run.
pub fn ingest(
    entries: Vec<BundleEntry>,
    options: &IngestOptions,
) -> Result<LoadedBundle, IngestError> {
    if entries.is_empty() {
        return Err(IngestError::EmptyBundle);
    }

    let mut diagnostics = Diagnostics::new();
    let mut index = FlatIndex::new();
    for BundleEntry { path, bytes } in entries {
        let (record, anomaly) = classify(path, bytes);
        diagnostics.extend(anomaly);
        if let Some(replaced) = index.insert(record) {
            diagnostics.push(Anomaly::DuplicatePath {
                path: replaced.path().to_string(),
            });
        }
    }

    let build = build_tree(index.iter(), options.max_path_components);
    diagnostics.extend(build.anomalies);

    tracing::info!(
        records = index.len(),
        anomalies = diagnostics.len(),
        "bundle ingested"
    );
    Ok(LoadedBundle {
        index,
        tree: build.root,
        diagnostics,
    })
}

/// 匯入 `.zip` 壓縮檔。 / Ingests an uploaded archive named `name`.
pub fn ingest_archive(
    name: &str,
    bytes: &[u8],
    options: &IngestOptions,
) -> Result<LoadedBundle, IngestError> {
    if !is_archive_name(name) {
        return Err(SourceError::NotAnArchive {
            name: name.to_string(),
        }
        .into());
    }
    let entries = decode_archive(bytes)?;
    ingest(entries, options)
}

/// 匯入磁碟上的資料夾。 / Ingests every file below `root`.
pub fn ingest_folder(root: &Path, options: &IngestOptions) -> Result<LoadedBundle, IngestError> {
    let entries = read_folder(root)?;
    ingest(entries, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultview_core::RecordKind;

    fn entries(items: &[(&str, &str)]) -> Vec<BundleEntry> {
        items
            .iter()
            .map(|(path, text)| BundleEntry::new(*path, text.as_bytes()))
            .collect()
    }

    #[test]
    fn empty_bundle_is_fatal() {
        let err = ingest(Vec::new(), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::EmptyBundle));
    }

    #[test]
    fn duplicates_keep_last_and_are_reported() {
        let bundle = ingest(
            entries(&[("a.md", "first"), ("b.md", "b"), ("a.md", "second")]),
            &IngestOptions::default(),
        )
        .unwrap();
        assert_eq!(bundle.index.len(), 2);
        assert_eq!(
            bundle.index.get("a.md").unwrap().text_content(),
            Some("second")
        );
        assert_eq!(bundle.diagnostics.count("duplicate-path"), 1);
        assert_eq!(bundle.placed_count(), 2);
    }

    #[test]
    fn undecodable_markdown_degrades_only_that_entry() {
        let bundle = ingest(
            vec![
                BundleEntry::new("bad.md", vec![0xff, 0xfe, 0x00]),
                BundleEntry::new("good.md", "ok".as_bytes()),
            ],
            &IngestOptions::default(),
        )
        .unwrap();
        assert_eq!(
            bundle.index.get("bad.md").unwrap().kind(),
            RecordKind::Unclassified
        );
        assert_eq!(bundle.index.get("good.md").unwrap().kind(), RecordKind::Text);
        assert_eq!(bundle.diagnostics.count("text-decode-failure"), 1);
    }

    #[test]
    fn tree_conflicts_are_recorded_but_indexed() {
        let bundle = ingest(
            entries(&[("notes", ""), ("notes/a.md", "a")]),
            &IngestOptions::default(),
        )
        .unwrap();
        assert!(bundle.index.contains("notes/a.md"));
        assert!(bundle.tree.find("notes/a.md").is_none());
        assert_eq!(bundle.diagnostics.count("tree-conflict"), 1);
    }

    #[test]
    fn nameless_entries_are_indexed_and_reported() {
        let bundle = ingest(
            entries(&[("", "x"), ("a//b.md", "b"), ("dir/", "d")]),
            &IngestOptions::default(),
        )
        .unwrap();
        assert_eq!(bundle.index.len(), 3);
        assert_eq!(bundle.placed_count(), 2);
        assert_eq!(bundle.diagnostics.count("empty-path"), 1);
        let dropped: Vec<&str> = bundle.diagnostics.iter().map(|a| a.path()).collect();
        assert_eq!(dropped, vec![""]);
    }

    #[test]
    fn component_limit_comes_from_options() {
        let options = IngestOptions {
            max_path_components: 2,
        };
        let bundle = ingest(entries(&[("a/b/c.md", "c"), ("a/d.md", "d")]), &options).unwrap();
        assert_eq!(bundle.placed_count(), 1);
        assert_eq!(bundle.diagnostics.count("path-too-deep"), 1);
    }

    #[test]
    fn non_zip_names_are_rejected_before_decoding() {
        let err = ingest_archive("vault.tar", b"", &IngestOptions::default()).unwrap_err();
        assert_eq!(err.user_message(), "Please upload a .zip file.");
    }

    #[test]
    fn corrupt_archive_reports_decode_message() {
        let err = ingest_archive("vault.zip", b"nope", &IngestOptions::default()).unwrap_err();
        assert_eq!(
            err.user_message(),
            "Error processing ZIP file. Make sure it is a valid zip."
        );
    }
}
