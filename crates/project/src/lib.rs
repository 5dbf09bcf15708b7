//! Bundle ingestion, folder tree, tab session and the viewer store for VaultView.
//! VaultView 的套件匯入、資料夾樹、分頁工作階段與檢視器狀態庫。

pub mod ingest;
pub mod session;
pub mod store;
pub mod tree;

pub use ingest::{ingest, ingest_archive, ingest_folder, IngestError, IngestOptions, LoadedBundle};
pub use session::{Session, SessionAction, SessionRejection, Transition};
pub use store::{
    BundleSource, DocumentView, ResolvedAsset, Stage, ViewerAction, ViewerError, ViewerState,
    ViewerStore,
};
pub use tree::{
    build_tree, PresentationOptions, TreeBuild, TreeEntry, TreeNode, DEFAULT_MAX_PATH_COMPONENTS,
};
