use std::borrow::Cow;

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::{Captures, Regex};

static WIKI_EMBED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[\[(.*?)\]\]").expect("wiki embed pattern"));

static MARKDOWN_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*(?:<([^>]*)>|([^)\s]+))(?:\s+"[^"]*")?\s*\)"#)
        .expect("markdown target pattern")
});

// Characters that would end a markdown link destination, plus `%` so decoding is lossless.
const EMBED_TARGET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'(')
    .add(b')')
    .add(b'<')
    .add(b'>');

/// 將 `![[target]]` 改寫為標準 markdown 圖片。 / Rewrites wiki embeds into markdown images.
///
/// `![[Pasted image.png|300]]` becomes `![](Pasted%20image.png)`: the size/alias part
/// after `|` is dropped and the target is percent-encoded so the resolver's decode
/// step gives back the original name.
pub fn rewrite_embeds(text: &str) -> Cow<'_, str> {
    WIKI_EMBED.replace_all(text, |caps: &Captures<'_>| {
        let inner = &caps[1];
        let target = inner.split('|').next().unwrap_or(inner).trim();
        format!("![]({})", utf8_percent_encode(target, EMBED_TARGET))
    })
}

/// 參照種類。 / Whether a reference embeds its target or links to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Image,
    Link,
}

/// 文件中找到的單一參照。 / One reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub label: String,
    pub target: String,
    /// Byte offset of the reference in the scanned text.
    pub offset: usize,
}

/// Lists markdown image and link destinations in document order.
pub fn extract_references(text: &str) -> Vec<Reference> {
    MARKDOWN_TARGET
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps.get(3).or_else(|| caps.get(4))?.as_str().trim();
            if target.is_empty() {
                return None;
            }
            let kind = if caps[1].is_empty() {
                ReferenceKind::Link
            } else {
                ReferenceKind::Image
            };
            Some(Reference {
                kind,
                label: caps[2].to_string(),
                target: target.to_string(),
                offset: whole.start(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiki_embed_becomes_markdown_image() {
        let text = "before ![[diagram.png]] after";
        assert_eq!(rewrite_embeds(text), "before ![](diagram.png) after");
    }

    #[test]
    fn embed_alias_is_dropped_and_spaces_encoded() {
        let text = "![[Pasted image 2024.png|300]]";
        assert_eq!(rewrite_embeds(text), "![](Pasted%20image%202024.png)");
    }

    #[test]
    fn text_without_embeds_is_borrowed() {
        assert!(matches!(rewrite_embeds("plain [[link]]"), Cow::Borrowed(_)));
    }

    #[test]
    fn extracts_images_and_links_in_order() {
        let text = "![cat](img/cat.png \"Cat\") see [other](../other.md) and ![](<my pic.png>)";
        let refs = extract_references(text);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].kind, ReferenceKind::Image);
        assert_eq!(refs[0].label, "cat");
        assert_eq!(refs[0].target, "img/cat.png");
        assert_eq!(refs[0].offset, 0);
        assert_eq!(refs[1].kind, ReferenceKind::Link);
        assert_eq!(refs[1].target, "../other.md");
        assert_eq!(refs[2].target, "my pic.png");
    }

    #[test]
    fn rewritten_embeds_are_extracted() {
        let rewritten = rewrite_embeds("![[a b.png]]");
        let refs = extract_references(&rewritten);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, "a%20b.png");
    }
}
