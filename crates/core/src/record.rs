use std::fmt;
use std::sync::Arc;

use encoding_rs::UTF_8;

use crate::diagnostics::Anomaly;

/// 記錄的分類結果。 / Classification assigned to a bundle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Text,
    Binary,
    Unclassified,
}

impl RecordKind {
    /// 是否可在分頁中開啟。 / Whether a record of this kind may be opened in a tab.
    pub fn is_openable(self) -> bool {
        match self {
            RecordKind::Text | RecordKind::Binary => true,
            RecordKind::Unclassified => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Text => "text",
            RecordKind::Binary => "binary",
            RecordKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 保留為二進位資產的圖片格式。 / Image formats retained as binary assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    /// 依副檔名（不分大小寫）判斷格式。 / Maps a file extension, case-insensitively, to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
        }
    }
}

/// 不透明的二進位內容參照，內容不會被解碼。 / Opaque handle around an undecoded binary payload.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryHandle {
    format: ImageFormat,
    bytes: Arc<[u8]>,
}

impl BinaryHandle {
    pub fn new(format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for BinaryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryHandle")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// 記錄內容；文字與二進位互斥。 / Record payload; text and binary are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordContent {
    Text(Arc<str>),
    Binary(BinaryHandle),
    Unclassified,
}

/// 套件中單一項目的不可變型別化記錄。 / Immutable, typed record for one bundle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    name: String,
    path: String,
    content: RecordContent,
}

impl FileRecord {
    pub fn text(path: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self::with_content(path.into(), RecordContent::Text(text.into()))
    }

    pub fn binary(path: impl Into<String>, handle: BinaryHandle) -> Self {
        Self::with_content(path.into(), RecordContent::Binary(handle))
    }

    pub fn unclassified(path: impl Into<String>) -> Self {
        Self::with_content(path.into(), RecordContent::Unclassified)
    }

    fn with_content(path: String, content: RecordContent) -> Self {
        Self {
            name: file_name(&path).to_string(),
            path,
            content,
        }
    }

    /// 路徑最後一段。 / Final `/`-separated component of the path.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &RecordContent {
        &self.content
    }

    pub fn kind(&self) -> RecordKind {
        match self.content {
            RecordContent::Text(_) => RecordKind::Text,
            RecordContent::Binary(_) => RecordKind::Binary,
            RecordContent::Unclassified => RecordKind::Unclassified,
        }
    }

    pub fn is_openable(&self) -> bool {
        self.kind().is_openable()
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            RecordContent::Text(text) => Some(text),
            RecordContent::Binary(_) | RecordContent::Unclassified => None,
        }
    }

    pub fn binary_handle(&self) -> Option<&BinaryHandle> {
        match &self.content {
            RecordContent::Binary(handle) => Some(handle),
            RecordContent::Text(_) | RecordContent::Unclassified => None,
        }
    }
}

/// 依副檔名分類單一項目。 / Classifies one entry purely by its extension.
///
/// `.md` becomes text, `.png`/`.jpg`/`.jpeg`/`.gif` become binary assets and
/// everything else is kept for tree display only. Content is never sniffed, so a
/// mislabelled file is classified by its name alone. A markdown entry whose bytes
/// are not valid UTF-8 is downgraded to [`RecordKind::Unclassified`] and reported.
pub fn classify(path: impl Into<String>, bytes: Vec<u8>) -> (FileRecord, Option<Anomaly>) {
    let path = path.into();
    let extension = extension_of(file_name(&path));

    if extension.eq_ignore_ascii_case("md") {
        return match decode_text(&bytes) {
            Some(text) => (FileRecord::text(path, text), None),
            None => {
                let anomaly = Anomaly::TextDecodeFailure { path: path.clone() };
                (FileRecord::unclassified(path), Some(anomaly))
            }
        };
    }

    match ImageFormat::from_extension(extension) {
        Some(format) => (FileRecord::binary(path, BinaryHandle::new(format, bytes)), None),
        None => (FileRecord::unclassified(path), None),
    }
}

fn decode_text(bytes: &[u8]) -> Option<String> {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    UTF_8
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn extension_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_is_text_regardless_of_case() {
        let (record, anomaly) = classify("notes/Daily.MD", b"# hello".to_vec());
        assert!(anomaly.is_none());
        assert_eq!(record.kind(), RecordKind::Text);
        assert_eq!(record.name(), "Daily.MD");
        assert_eq!(record.text_content(), Some("# hello"));
        assert!(record.binary_handle().is_none());
    }

    #[test]
    fn utf8_bom_is_stripped_from_text() {
        let (record, _) = classify("a.md", b"\xEF\xBB\xBFbody".to_vec());
        assert_eq!(record.text_content(), Some("body"));
    }

    #[test]
    fn invalid_utf8_markdown_degrades_to_unclassified() {
        let (record, anomaly) = classify("broken.md", vec![0xC3, 0x28]);
        assert_eq!(record.kind(), RecordKind::Unclassified);
        assert_eq!(
            anomaly,
            Some(Anomaly::TextDecodeFailure {
                path: "broken.md".into()
            })
        );
    }

    #[test]
    fn images_keep_their_payload() {
        let (record, anomaly) = classify("assets/photo.JPEG", vec![1, 2, 3]);
        assert!(anomaly.is_none());
        assert_eq!(record.kind(), RecordKind::Binary);
        let handle = record.binary_handle().unwrap();
        assert_eq!(handle.format(), ImageFormat::Jpeg);
        assert_eq!(handle.bytes(), &[1, 2, 3]);
        assert_eq!(handle.format().media_type(), "image/jpeg");
    }

    #[test]
    fn classification_ignores_content() {
        // PNG magic bytes under a text extension stay unclassified.
        let (record, _) = classify("image.txt", b"\x89PNG\r\n".to_vec());
        assert_eq!(record.kind(), RecordKind::Unclassified);
        assert!(!record.is_openable());

        let (record, _) = classify("no_extension", Vec::new());
        assert_eq!(record.kind(), RecordKind::Unclassified);
    }
}
