//! Non-fatal conditions observed while ingesting or browsing a bundle.
//! 載入或瀏覽套件時遇到的非致命狀況。

use std::fmt;

use thiserror::Error;

/// 路徑片段已被宣告的型態。 / What a path component was first claimed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    File,
    Folder,
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimKind::File => f.write_str("file"),
            ClaimKind::Folder => f.write_str("folder"),
        }
    }
}

/// 選取無法開啟的原因。 / Why a selection could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnviewableReason {
    Missing,
    Unclassified,
}

impl fmt::Display for UnviewableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnviewableReason::Missing => f.write_str("not in the bundle"),
            UnviewableReason::Unclassified => f.write_str("not a viewable file type"),
        }
    }
}

/// 單一非致命異常。 / A single non-fatal anomaly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Anomaly {
    #[error("{path}: `{component}` is already a {existing}; entry left out of the tree")]
    TreeConflict {
        path: String,
        component: String,
        existing: ClaimKind,
    },
    #[error("{path}: {components} path components exceed the limit of {limit}")]
    PathTooDeep {
        path: String,
        components: usize,
        limit: usize,
    },
    #[error("`{path}`: entry has no name; left out of the tree")]
    EmptyPath { path: String },
    #[error("{path}: duplicate entry replaced the earlier one")]
    DuplicatePath { path: String },
    #[error("{path}: contents are not valid UTF-8 text")]
    TextDecodeFailure { path: String },
    #[error("{path} cannot be opened: {reason}")]
    UnviewableSelection {
        path: String,
        reason: UnviewableReason,
    },
    #[error("{referencing}: reference `{reference}` did not match any bundle entry")]
    AssetUnresolved {
        referencing: String,
        reference: String,
    },
}

impl Anomaly {
    /// 相關路徑（若有）。 / Path of the bundle entry the anomaly concerns.
    pub fn path(&self) -> &str {
        match self {
            Anomaly::TreeConflict { path, .. }
            | Anomaly::PathTooDeep { path, .. }
            | Anomaly::EmptyPath { path }
            | Anomaly::DuplicatePath { path }
            | Anomaly::TextDecodeFailure { path }
            | Anomaly::UnviewableSelection { path, .. } => path,
            Anomaly::AssetUnresolved { referencing, .. } => referencing,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Anomaly::TreeConflict { .. } => "tree-conflict",
            Anomaly::PathTooDeep { .. } => "path-too-deep",
            Anomaly::EmptyPath { .. } => "empty-path",
            Anomaly::DuplicatePath { .. } => "duplicate-path",
            Anomaly::TextDecodeFailure { .. } => "text-decode-failure",
            Anomaly::UnviewableSelection { .. } => "unviewable-selection",
            Anomaly::AssetUnresolved { .. } => "asset-unresolved",
        }
    }
}

/// 依序累積的異常清單。 / Ordered list of recorded anomalies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Anomaly>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記錄異常並寫入日誌。 / Records an anomaly and emits it as a log event.
    pub fn push(&mut self, anomaly: Anomaly) {
        match &anomaly {
            Anomaly::AssetUnresolved { .. } | Anomaly::UnviewableSelection { .. } => {
                tracing::debug!(code = anomaly.code(), "{anomaly}")
            }
            _ => tracing::warn!(code = anomaly.code(), "{anomaly}"),
        }
        self.entries.push(anomaly);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anomaly> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 依代碼計數。 / Counts anomalies sharing the given code.
    pub fn contains(&self, anomaly: &Anomaly) -> bool {
        self.entries.contains(anomaly)
    }

    pub fn count(&self, code: &str) -> usize {
        self.entries
            .iter()
            .filter(|anomaly| anomaly.code() == code)
            .count()
    }

    pub fn as_slice(&self) -> &[Anomaly] {
        &self.entries
    }
}

impl Extend<Anomaly> for Diagnostics {
    fn extend<T: IntoIterator<Item = Anomaly>>(&mut self, iter: T) {
        for anomaly in iter {
            self.push(anomaly);
        }
    }
}
