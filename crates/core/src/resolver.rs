//! Resolution of in-document references against the loaded bundle.
//! 依載入的套件解析文件中的參照。

use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::index::FlatIndex;
use crate::record::FileRecord;

/// Schemes returned unchanged without a bundle lookup.
pub const DEFAULT_PASSTHROUGH_SCHEMES: &[&str] = &["http", "https", "data", "blob"];

/// 解析器設定。 / Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    passthrough_schemes: Vec<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::new(DEFAULT_PASSTHROUGH_SCHEMES.iter().copied())
    }
}

impl ResolverOptions {
    /// Accepts scheme names with or without a trailing `:`/`://`, in any case.
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let passthrough_schemes = schemes
            .into_iter()
            .map(|scheme| {
                scheme
                    .as_ref()
                    .trim()
                    .trim_end_matches("//")
                    .trim_end_matches(':')
                    .to_ascii_lowercase()
            })
            .filter(|scheme| !scheme.is_empty())
            .collect();
        Self {
            passthrough_schemes,
        }
    }

    pub fn passthrough_schemes(&self) -> &[String] {
        &self.passthrough_schemes
    }

    /// 參照是否屬於直接放行的網址。 / Whether `uri` is a network address or materialized handle.
    pub fn is_passthrough(&self, uri: &str) -> bool {
        if uri.starts_with("//") {
            return !self.passthrough_schemes.is_empty();
        }
        match scheme_of(uri) {
            Some(scheme) => self
                .passthrough_schemes
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(scheme)),
            None => false,
        }
    }
}

fn scheme_of(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
        .then_some(scheme)
}

/// 成功比對所使用的策略。 / Strategy that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStrategy {
    ExactKey,
    Relative,
    Basename,
    Suffix,
}

impl MatchStrategy {
    pub fn name(self) -> &'static str {
        match self {
            MatchStrategy::ExactKey => "exact",
            MatchStrategy::Relative => "relative",
            MatchStrategy::Basename => "basename",
            MatchStrategy::Suffix => "suffix",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 單次解析的結果。 / Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Allow-listed address, returned as written.
    Passthrough(String),
    Resolved {
        record: Arc<FileRecord>,
        strategy: MatchStrategy,
    },
    /// Nothing matched; `fallback` is the decoded reference for display.
    Unresolved { fallback: String },
}

impl Resolution {
    pub fn record(&self) -> Option<&Arc<FileRecord>> {
        match self {
            Resolution::Resolved { record, .. } => Some(record),
            Resolution::Passthrough(_) | Resolution::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    /// Text a renderer shows when it cannot display the target itself.
    pub fn display_value(&self) -> &str {
        match self {
            Resolution::Passthrough(uri) => uri,
            Resolution::Resolved { record, .. } => record.path(),
            Resolution::Unresolved { fallback } => fallback,
        }
    }
}

/// 綁定目前文件與索引的解析器，即渲染器使用的回呼。 / Resolver bound to the current
/// document and index; this is the callback handed to a renderer.
#[derive(Debug, Clone, Copy)]
pub struct AssetResolver<'a> {
    index: &'a FlatIndex,
    referencing_path: &'a str,
    options: &'a ResolverOptions,
}

impl<'a> AssetResolver<'a> {
    pub fn new(
        index: &'a FlatIndex,
        referencing_path: &'a str,
        options: &'a ResolverOptions,
    ) -> Self {
        Self {
            index,
            referencing_path,
            options,
        }
    }

    pub fn referencing_path(&self) -> &'a str {
        self.referencing_path
    }

    pub fn resolve(&self, uri: &str) -> Resolution {
        resolve_asset_with(uri, self.referencing_path, self.index, self.options)
    }
}

/// Resolves `uri` with the default scheme allow-list.
pub fn resolve_asset(uri: &str, referencing_path: &str, index: &FlatIndex) -> Resolution {
    resolve_asset_with(uri, referencing_path, index, &ResolverOptions::default())
}

/// Resolves `uri` as it appears inside the record at `referencing_path`.
///
/// Strategies run in a fixed order and the first hit wins: exact key, path relative
/// to the referencing record's folder, file name (only for references without a
/// `/`), then path suffix. Basename and suffix ties go to the earliest record in
/// ingestion order.
pub fn resolve_asset_with(
    uri: &str,
    referencing_path: &str,
    index: &FlatIndex,
    options: &ResolverOptions,
) -> Resolution {
    if options.is_passthrough(uri) {
        return Resolution::Passthrough(uri.to_string());
    }

    let decoded = percent_decode_str(uri).decode_utf8_lossy().into_owned();
    match find_match(&decoded, referencing_path, index) {
        Some((record, strategy)) => {
            tracing::trace!(
                uri,
                referencing = referencing_path,
                resolved = record.path(),
                %strategy,
                "asset resolved"
            );
            Resolution::Resolved {
                record: Arc::clone(record),
                strategy,
            }
        }
        None => {
            tracing::debug!(uri, referencing = referencing_path, "asset unresolved");
            Resolution::Unresolved { fallback: decoded }
        }
    }
}

fn find_match<'i>(
    reference: &str,
    referencing_path: &str,
    index: &'i FlatIndex,
) -> Option<(&'i Arc<FileRecord>, MatchStrategy)> {
    if reference.is_empty() {
        return None;
    }
    if let Some(record) = index.get(reference) {
        return Some((record, MatchStrategy::ExactKey));
    }
    if let Some(record) = relative_target(referencing_path, reference)
        .and_then(|candidate| index.get(&candidate))
    {
        return Some((record, MatchStrategy::Relative));
    }
    if !reference.contains('/') {
        if let Some(record) = index.find_by_name(reference) {
            return Some((record, MatchStrategy::Basename));
        }
    }
    let suffix = reference.trim_start_matches("./").trim_start_matches('/');
    index
        .find_by_suffix(suffix)
        .map(|record| (record, MatchStrategy::Suffix))
}

/// Applies `reference` to the folder containing `referencing_path`.
///
/// `..` above the bundle root stays at the root. A leading `/` anchors the
/// reference at the bundle root instead of the referencing folder.
pub fn relative_target(referencing_path: &str, reference: &str) -> Option<String> {
    let mut stack: Vec<&str> = match referencing_path.rsplit_once('/') {
        Some((folder, _)) => folder.split('/').filter(|part| !part.is_empty()).collect(),
        None => Vec::new(),
    };
    let reference = match reference.strip_prefix('/') {
        Some(rooted) => {
            stack.clear();
            rooted
        }
        None => reference,
    };
    for component in reference.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    if stack.is_empty() {
        None
    } else {
        Some(stack.join("/"))
    }
}
