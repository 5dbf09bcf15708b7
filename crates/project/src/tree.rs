use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use vaultview_core::{Anomaly, ClaimKind, FileRecord};

/// Default upper bound on `/`-separated components in one path.
pub const DEFAULT_MAX_PATH_COMPONENTS: usize = 256;

/// Folder/file hierarchy derived from the bundle's flat paths.
/// 由套件扁平路徑建立的資料夾／檔案階層。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Folder {
        children: BTreeMap<String, TreeNode>,
    },
    File {
        record: Arc<FileRecord>,
    },
}

impl TreeNode {
    pub fn empty_folder() -> Self {
        TreeNode::Folder {
            children: BTreeMap::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeNode::Folder { .. })
    }

    pub fn record(&self) -> Option<&Arc<FileRecord>> {
        match self {
            TreeNode::File { record } => Some(record),
            TreeNode::Folder { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, TreeNode>> {
        match self {
            TreeNode::Folder { children } => Some(children),
            TreeNode::File { .. } => None,
        }
    }

    fn claim(&self) -> ClaimKind {
        match self {
            TreeNode::Folder { .. } => ClaimKind::Folder,
            TreeNode::File { .. } => ClaimKind::File,
        }
    }

    /// Follows the `/`-separated components of `path` from this node.
    /// 依路徑片段逐層尋找節點。
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        let mut node = self;
        for component in split_components(path) {
            node = node.children()?.get(component)?;
        }
        Some(node)
    }

    /// Every file record below this node, depth-first in name order.
    pub fn files(&self) -> Vec<&Arc<FileRecord>> {
        let mut files = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                TreeNode::File { record } => files.push(record),
                TreeNode::Folder { children } => stack.extend(children.values().rev()),
            }
        }
        files
    }

    /// Children in display order: folders first, then case-insensitive by name.
    /// Hidden names are left out unless `options.show_hidden` is set.
    pub fn sorted_children<'a>(
        &'a self,
        options: &PresentationOptions,
    ) -> Vec<(&'a str, &'a TreeNode)> {
        let Some(children) = self.children() else {
            return Vec::new();
        };
        let mut entries: Vec<(&str, &TreeNode)> = children
            .iter()
            .filter(|(name, _)| !options.is_hidden(name))
            .map(|(name, node)| (name.as_str(), node))
            .collect();
        entries.sort_by(|(a_name, a_node), (b_name, b_node)| {
            display_order(a_name, a_node, b_name, b_node, options)
        });
        entries
    }

    /// Flattens the subtree in display order, pre-order, without recursion.
    /// 以顯示順序展開子樹（不使用遞迴）。
    pub fn walk(&self, options: &PresentationOptions) -> Vec<TreeEntry<'_>> {
        let mut entries = Vec::new();
        let mut stack: Vec<(String, usize, &str, &TreeNode)> = Vec::new();
        push_children(&mut stack, self, "", 0, options);
        while let Some((path, depth, name, node)) = stack.pop() {
            push_children(&mut stack, node, &path, depth + 1, options);
            entries.push(TreeEntry {
                name,
                path,
                depth,
                node,
            });
        }
        entries
    }
}

fn push_children<'a>(
    stack: &mut Vec<(String, usize, &'a str, &'a TreeNode)>,
    node: &'a TreeNode,
    parent: &str,
    depth: usize,
    options: &PresentationOptions,
) {
    for (name, child) in node.sorted_children(options).into_iter().rev() {
        let path = if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}/{name}")
        };
        stack.push((path, depth, name, child));
    }
}

fn display_order(
    a_name: &str,
    a_node: &TreeNode,
    b_name: &str,
    b_node: &TreeNode,
    options: &PresentationOptions,
) -> Ordering {
    let by_kind = if options.folders_first {
        b_node.is_folder().cmp(&a_node.is_folder())
    } else {
        Ordering::Equal
    };
    by_kind
        .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
        .then_with(|| a_name.cmp(b_name))
}

/// One row of a flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    pub name: &'a str,
    /// Path from the root, built from tree components.
    pub path: String,
    pub depth: usize,
    pub node: &'a TreeNode,
}

/// 顯示階段的排序與隱藏規則。 / Display-time ordering and filtering rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationOptions {
    pub folders_first: bool,
    /// Names starting with this marker are hidden. Empty disables hiding.
    pub hidden_prefix: String,
    pub show_hidden: bool,
}

impl Default for PresentationOptions {
    fn default() -> Self {
        Self {
            folders_first: true,
            hidden_prefix: ".".to_string(),
            show_hidden: false,
        }
    }
}

impl PresentationOptions {
    pub fn is_hidden(&self, name: &str) -> bool {
        !self.show_hidden
            && !self.hidden_prefix.is_empty()
            && name.starts_with(&self.hidden_prefix)
    }
}

/// Result of building a tree: the root folder plus dropped placements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBuild {
    pub root: TreeNode,
    pub anomalies: Vec<Anomaly>,
}

/// Builds the folder/file tree from records in ingestion order.
/// 依匯入順序的記錄建立資料夾／檔案樹。
///
/// The first record to claim a name decides whether it is a file or a folder; a
/// later record needing the other shape is left out and reported. Paths with more
/// than `max_components` components are rejected before any node is created.
pub fn build_tree<'a, I>(records: I, max_components: usize) -> TreeBuild
where
    I: IntoIterator<Item = &'a Arc<FileRecord>>,
{
    let mut children = BTreeMap::new();
    let mut anomalies = Vec::new();

    for record in records {
        let components = split_components(record.path());
        if components.is_empty() {
            anomalies.push(Anomaly::EmptyPath {
                path: record.path().to_string(),
            });
            continue;
        }
        if components.len() > max_components {
            anomalies.push(Anomaly::PathTooDeep {
                path: record.path().to_string(),
                components: components.len(),
                limit: max_components,
            });
            continue;
        }
        if let Err(anomaly) = place(&mut children, &components, record) {
            anomalies.push(anomaly);
        }
    }

    TreeBuild {
        root: TreeNode::Folder { children },
        anomalies,
    }
}

fn place(
    root: &mut BTreeMap<String, TreeNode>,
    components: &[&str],
    record: &Arc<FileRecord>,
) -> Result<(), Anomaly> {
    let Some((leaf, folders)) = components.split_last() else {
        return Ok(());
    };

    let mut level = root;
    for folder in folders {
        let node = level
            .entry((*folder).to_string())
            .or_insert_with(TreeNode::empty_folder);
        level = match node {
            TreeNode::Folder { children } => children,
            TreeNode::File { .. } => return Err(conflict(record, folder, ClaimKind::File)),
        };
    }

    match level.entry((*leaf).to_string()) {
        Entry::Vacant(slot) => {
            slot.insert(TreeNode::File {
                record: Arc::clone(record),
            });
            Ok(())
        }
        Entry::Occupied(existing) => Err(conflict(record, leaf, existing.get().claim())),
    }
}

fn conflict(record: &FileRecord, component: &str, existing: ClaimKind) -> Anomaly {
    Anomaly::TreeConflict {
        path: record.path().to_string(),
        component: component.to_string(),
        existing,
    }
}

fn split_components(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(paths: &[&str]) -> Vec<Arc<FileRecord>> {
        paths
            .iter()
            .map(|path| Arc::new(FileRecord::text(*path, "")))
            .collect()
    }

    #[test]
    fn folders_are_shared_between_siblings() {
        let records = records(&["vault/a.md", "vault/notes/b.md", "vault/notes/c.md"]);
        let build = build_tree(&records, DEFAULT_MAX_PATH_COMPONENTS);
        assert!(build.anomalies.is_empty());

        let notes = build.root.find("vault/notes").unwrap();
        assert_eq!(notes.children().unwrap().len(), 2);
        let file = build.root.find("vault/notes/c.md").unwrap();
        assert_eq!(file.record().unwrap().path(), "vault/notes/c.md");
        assert!(build.root.find("vault/missing").is_none());
    }

    #[test]
    fn file_then_folder_claim_keeps_the_file() {
        let records = records(&["docs", "docs/readme.md"]);
        let build = build_tree(&records, DEFAULT_MAX_PATH_COMPONENTS);

        assert!(!build.root.find("docs").unwrap().is_folder());
        assert_eq!(
            build.anomalies,
            vec![Anomaly::TreeConflict {
                path: "docs/readme.md".into(),
                component: "docs".into(),
                existing: ClaimKind::File,
            }]
        );
    }

    #[test]
    fn folder_then_file_claim_keeps_the_folder() {
        let records = records(&["docs/readme.md", "docs"]);
        let build = build_tree(&records, DEFAULT_MAX_PATH_COMPONENTS);

        assert!(build.root.find("docs").unwrap().is_folder());
        assert_eq!(build.anomalies.len(), 1);
        assert!(matches!(
            &build.anomalies[0],
            Anomaly::TreeConflict {
                existing: ClaimKind::Folder,
                ..
            }
        ));
    }

    #[test]
    fn overly_deep_paths_are_rejected() {
        let deep = vec!["d"; 10].join("/");
        let records = records(&[deep.as_str(), "ok.md"]);
        let build = build_tree(&records, 5);
        assert_eq!(build.root.files().len(), 1);
        assert!(matches!(
            build.anomalies[0],
            Anomaly::PathTooDeep {
                components: 10,
                limit: 5,
                ..
            }
        ));
    }

    #[test]
    fn permutations_build_equal_trees() {
        let forward = records(&["a/x.md", "a/b/y.md", "c.md", "a/b/z.png"]);
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(
            build_tree(&forward, 16).root,
            build_tree(&backward, 16).root
        );
    }

    #[test]
    fn walk_orders_folders_first_and_hides_dot_names() {
        let records = records(&["b.md", "A.md", "zeta/n.md", ".obsidian/app.json", "Alpha/m.md"]);
        let build = build_tree(&records, 16);
        let rows: Vec<(String, usize)> = build
            .root
            .walk(&PresentationOptions::default())
            .into_iter()
            .map(|entry| (entry.path, entry.depth))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Alpha".to_string(), 0),
                ("Alpha/m.md".to_string(), 1),
                ("zeta".to_string(), 0),
                ("zeta/n.md".to_string(), 1),
                ("A.md".to_string(), 0),
                ("b.md".to_string(), 0),
            ]
        );

        let all = PresentationOptions {
            show_hidden: true,
            ..PresentationOptions::default()
        };
        assert_eq!(build.root.walk(&all).len(), 8);
    }

    #[test]
    fn files_lists_every_leaf() {
        let records = records(&["x/1.md", "x/y/2.md", "3.md"]);
        let build = build_tree(&records, 16);
        let mut paths: Vec<_> = build.root.files().into_iter().map(|r| r.path()).collect();
        paths.sort();
        assert_eq!(paths, vec!["3.md", "x/1.md", "x/y/2.md"]);
    }
}
