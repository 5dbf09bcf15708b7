//! Viewer store: the single update boundary for bundle, tree and session.
//! 檢視器狀態庫：套件、檔案樹與工作階段的唯一更新入口。
//!
//! Every change publishes a fresh [`ViewerState`] behind an `Arc`; readers holding an
//! older snapshot keep seeing it unchanged.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use vaultview_core::{
    resolve_asset_with, rewrite_embeds, Anomaly, AssetHandles, AssetResolver, AssetUrl,
    BundleEntry, Diagnostics, FileRecord, FlatIndex, MatchStrategy, RecordContent, Resolution,
    ResolverOptions,
};

use crate::ingest::{
    ingest, ingest_archive, ingest_folder, IngestError, IngestOptions, LoadedBundle,
};
use crate::session::{Session, SessionAction, SessionRejection};

/// 檢視器所在的階段。 / Which screen the viewer is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Upload,
    Viewer,
}

/// One published snapshot of the viewer.
#[derive(Debug, Clone, Default)]
pub struct ViewerState {
    pub stage: Stage,
    pub bundle: Option<Arc<LoadedBundle>>,
    pub session: Session,
    /// Ingestion anomalies followed by those recorded while browsing.
    pub diagnostics: Diagnostics,
    /// Message for the last failed load or selection.
    pub error: Option<String>,
}

impl ViewerState {
    pub fn index(&self) -> Option<&FlatIndex> {
        self.bundle.as_deref().map(|bundle| &bundle.index)
    }
}

/// 套件來源。 / Where a bundle is loaded from.
#[derive(Debug, Clone)]
pub enum BundleSource {
    Archive { name: String, bytes: Vec<u8> },
    Folder(PathBuf),
    Entries(Vec<BundleEntry>),
}

/// 對狀態庫送出的動作。 / Actions accepted by [`ViewerStore::dispatch`].
#[derive(Debug, Clone)]
pub enum ViewerAction {
    Load(BundleSource),
    Session(SessionAction),
    ReturnToUpload,
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Rejected(#[from] SessionRejection),
}

/// 文件的顯示內容。 / What the document pane shows for an open path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentView {
    /// Markdown source with wiki embeds already rewritten.
    Markdown { path: String, text: String },
    Binary { path: String, placeholder: String },
}

impl DocumentView {
    pub fn path(&self) -> &str {
        match self {
            DocumentView::Markdown { path, .. } | DocumentView::Binary { path, .. } => path,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            DocumentView::Markdown { text, .. } => text,
            DocumentView::Binary { placeholder, .. } => placeholder,
        }
    }
}

/// 透過狀態庫解析資產的結果。 / A resolution as seen by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAsset {
    External(String),
    Record {
        record: Arc<FileRecord>,
        strategy: MatchStrategy,
        /// Displayable address, present for binary assets of open documents.
        url: Option<AssetUrl>,
    },
    Unresolved { fallback: String },
}

impl ResolvedAsset {
    pub fn display_value(&self) -> &str {
        match self {
            ResolvedAsset::External(uri) => uri,
            ResolvedAsset::Record { url: Some(url), .. } => url.as_str(),
            ResolvedAsset::Record { record, .. } => record.path(),
            ResolvedAsset::Unresolved { fallback } => fallback,
        }
    }
}

/// Owns the current snapshot and the asset handles tied to it.
#[derive(Debug, Default)]
pub struct ViewerStore {
    state: Arc<ViewerState>,
    handles: AssetHandles,
    ingest_options: IngestOptions,
    resolver_options: ResolverOptions,
}

impl ViewerStore {
    pub fn new(ingest_options: IngestOptions, resolver_options: ResolverOptions) -> Self {
        Self {
            ingest_options,
            resolver_options,
            ..Self::default()
        }
    }

    /// 目前的狀態快照。 / The current snapshot.
    pub fn state(&self) -> Arc<ViewerState> {
        Arc::clone(&self.state)
    }

    pub fn session(&self) -> &Session {
        &self.state.session
    }

    pub fn live_assets(&self) -> usize {
        self.handles.live_count()
    }

    pub fn dispatch(&mut self, action: ViewerAction) -> Result<(), ViewerError> {
        match action {
            ViewerAction::Load(source) => self.load(source)?,
            ViewerAction::Session(action) => {
                self.apply(action)?;
            }
            ViewerAction::ReturnToUpload => self.return_to_upload(),
        }
        Ok(())
    }

    /// Ingests `source` and, on success, replaces bundle, tree and session in one step.
    /// On failure the previous snapshot stays and only the error message changes.
    pub fn load(&mut self, source: BundleSource) -> Result<(), IngestError> {
        let loaded = match source {
            BundleSource::Archive { name, bytes } => {
                ingest_archive(&name, &bytes, &self.ingest_options)
            }
            BundleSource::Folder(root) => ingest_folder(&root, &self.ingest_options),
            BundleSource::Entries(entries) => ingest(entries, &self.ingest_options),
        };

        match loaded {
            Ok(bundle) => {
                let released = self.handles.release_all();
                tracing::debug!(released, "previous bundle discarded");
                self.state = Arc::new(ViewerState {
                    stage: Stage::Viewer,
                    diagnostics: bundle.diagnostics.clone(),
                    bundle: Some(Arc::new(bundle)),
                    session: Session::new(),
                    error: None,
                });
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "bundle load failed");
                let mut next = ViewerState::clone(&self.state);
                next.error = Some(err.user_message().to_string());
                self.state = Arc::new(next);
                Err(err)
            }
        }
    }

    /// Drops bundle, tree, session, handles and any error message.
    pub fn return_to_upload(&mut self) {
        self.handles.release_all();
        self.state = Arc::new(ViewerState::default());
    }

    /// Applies a session action against the loaded index.
    pub fn apply(&mut self, action: SessionAction) -> Result<&Session, SessionRejection> {
        let empty = FlatIndex::new();
        let index = self.state.index().unwrap_or(&empty);
        let transition = self.state.session.apply(action, index);

        for path in &transition.released {
            self.handles.release_owner(path);
        }

        if let Some(rejection) = transition.rejection {
            if let SessionRejection::Unviewable { path, reason } = &rejection {
                let mut next = ViewerState::clone(&self.state);
                next.diagnostics.push(Anomaly::UnviewableSelection {
                    path: path.clone(),
                    reason: *reason,
                });
                next.error = Some(rejection.to_string());
                self.state = Arc::new(next);
            }
            return Err(rejection);
        }

        let mut next = ViewerState::clone(&self.state);
        next.session = transition.session;
        next.error = None;
        self.state = Arc::new(next);
        Ok(&self.state.session)
    }

    pub fn select(&mut self, path: &str) -> Result<&Session, SessionRejection> {
        self.apply(SessionAction::Select(path.to_string()))
    }

    pub fn close(&mut self, path: &str) -> Result<&Session, SessionRejection> {
        self.apply(SessionAction::Close(path.to_string()))
    }

    pub fn activate(&mut self, path: &str) -> Result<&Session, SessionRejection> {
        self.apply(SessionAction::Activate(path.to_string()))
    }

    pub fn reorder(&mut self, order: Vec<String>) -> Result<&Session, SessionRejection> {
        self.apply(SessionAction::Reorder(order))
    }

    pub fn reset(&mut self) -> Result<&Session, SessionRejection> {
        self.apply(SessionAction::Reset)
    }

    /// 取得文件的顯示內容。 / What to show for `path`, if it is viewable.
    pub fn document(&self, path: &str) -> Option<DocumentView> {
        let record = self.state.index()?.get(path)?;
        match record.content() {
            RecordContent::Text(text) => Some(DocumentView::Markdown {
                path: path.to_string(),
                text: rewrite_embeds(text).into_owned(),
            }),
            RecordContent::Binary(_) => Some(DocumentView::Binary {
                path: path.to_string(),
                placeholder: format!(
                    "Binary file: {}. Preview not available for this type directly in markdown view.",
                    record.name()
                ),
            }),
            RecordContent::Unclassified => None,
        }
    }

    /// The resolve callback for rendering the document at `referencing`.
    pub fn resolver<'a>(&'a self, referencing: &'a str) -> Option<AssetResolver<'a>> {
        let index = self.state.index()?;
        Some(AssetResolver::new(index, referencing, &self.resolver_options))
    }

    /// Resolves `uri` inside `referencing`, materializing binary targets for open
    /// documents and recording unresolved references.
    pub fn resolve_asset(&mut self, referencing: &str, uri: &str) -> ResolvedAsset {
        let bundle = self.state.bundle.clone();
        let empty = FlatIndex::new();
        let index = bundle.as_deref().map_or(&empty, |bundle| &bundle.index);

        match resolve_asset_with(uri, referencing, index, &self.resolver_options) {
            Resolution::Passthrough(uri) => ResolvedAsset::External(uri),
            Resolution::Resolved { record, strategy } => {
                let url = if self.state.session.is_open(referencing) {
                    self.handles.materialize(referencing, &record)
                } else {
                    None
                };
                ResolvedAsset::Record {
                    record,
                    strategy,
                    url,
                }
            }
            Resolution::Unresolved { fallback } => {
                let anomaly = Anomaly::AssetUnresolved {
                    referencing: referencing.to_string(),
                    reference: uri.to_string(),
                };
                // Renders resolve the same references again; record each pair once.
                if bundle.is_some() && !self.state.diagnostics.contains(&anomaly) {
                    let mut next = ViewerState::clone(&self.state);
                    next.diagnostics.push(anomaly);
                    self.state = Arc::new(next);
                }
                ResolvedAsset::Unresolved { fallback }
            }
        }
    }
}
