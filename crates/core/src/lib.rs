//! Bundle records, lookup and reference resolution for VaultView.
//! VaultView 的套件記錄、索引與參照解析核心模組。

pub mod assets;
pub mod diagnostics;
pub mod embed;
pub mod index;
pub mod record;
pub mod resolver;
pub mod source;

pub use assets::{AssetHandles, AssetUrl};
pub use diagnostics::{Anomaly, ClaimKind, Diagnostics, UnviewableReason};
pub use embed::{extract_references, rewrite_embeds, Reference, ReferenceKind};
pub use index::FlatIndex;
pub use record::{classify, BinaryHandle, FileRecord, ImageFormat, RecordContent, RecordKind};
pub use resolver::{
    relative_target, resolve_asset, resolve_asset_with, AssetResolver, MatchStrategy,
    Resolution, ResolverOptions, DEFAULT_PASSTHROUGH_SCHEMES,
};
pub use source::{decode_archive, is_archive_name, read_folder, BundleEntry, SourceError};
