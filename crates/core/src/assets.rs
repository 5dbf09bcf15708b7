use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::record::FileRecord;

/// 可直接顯示的資產網址（`data:` URI）。 / Displayable address for a materialized asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetUrl(String);

impl AssetUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AssetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct LiveAsset {
    url: AssetUrl,
    holders: usize,
}

/// Tracks materialized binary assets and the documents that hold them.
/// 追蹤已實體化的二進位資產及持有它們的文件。
///
/// A document materializing the same asset twice holds it once. An asset's payload
/// is dropped when its last holder releases it.
#[derive(Debug, Default)]
pub struct AssetHandles {
    owners: HashMap<String, HashMap<String, AssetUrl>>,
    live: HashMap<String, LiveAsset>,
}

impl AssetHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes `record` on behalf of the document at `owner`.
    /// Returns `None` for records without a binary payload.
    pub fn materialize(&mut self, owner: &str, record: &FileRecord) -> Option<AssetUrl> {
        let handle = record.binary_handle()?;
        if let Some(url) = self
            .owners
            .get(owner)
            .and_then(|held| held.get(record.path()))
        {
            return Some(url.clone());
        }

        let live = self
            .live
            .entry(record.path().to_string())
            .or_insert_with(|| LiveAsset {
                url: AssetUrl(format!(
                    "data:{};base64,{}",
                    handle.format().media_type(),
                    BASE64.encode(handle.bytes())
                )),
                holders: 0,
            });
        live.holders += 1;
        let url = live.url.clone();
        self.owners
            .entry(owner.to_string())
            .or_default()
            .insert(record.path().to_string(), url.clone());
        tracing::trace!(owner, asset = record.path(), "asset materialized");
        Some(url)
    }

    /// Releases every asset held by `owner`, returning how many were held.
    pub fn release_owner(&mut self, owner: &str) -> usize {
        let Some(held) = self.owners.remove(owner) else {
            return 0;
        };
        for asset in held.keys() {
            if let Some(live) = self.live.get_mut(asset) {
                live.holders = live.holders.saturating_sub(1);
                if live.holders == 0 {
                    self.live.remove(asset);
                }
            }
        }
        tracing::trace!(owner, released = held.len(), "asset handles released");
        held.len()
    }

    /// Releases everything, returning the number of distinct payloads dropped.
    pub fn release_all(&mut self) -> usize {
        let dropped = self.live.len();
        self.owners.clear();
        self.live.clear();
        dropped
    }

    /// 目前存活的資產數量。 / Number of distinct payloads currently materialized.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn held_by(&self, owner: &str) -> usize {
        self.owners.get(owner).map_or(0, HashMap::len)
    }
}
