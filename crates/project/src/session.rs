use serde::{Deserialize, Serialize};
use thiserror::Error;
use vaultview_core::{FlatIndex, UnviewableReason};

/// Open documents and the active tab.
/// 已開啟的文件與目前啟用的分頁。
///
/// Snapshots are values: every transition builds a new `Session` and leaves the
/// previous one untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    open_documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active: Option<String>,
}

/// 可套用在工作階段上的操作。 / Events driving the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Select(String),
    Close(String),
    Activate(String),
    Reorder(Vec<String>),
    Reset,
}

/// 被拒絕的操作。 / Why an action left the session unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionRejection {
    #[error("{path} cannot be opened: {reason}")]
    Unviewable {
        path: String,
        reason: UnviewableReason,
    },
    #[error("{path} is not open")]
    NotOpen { path: String },
    #[error("new tab order is not a permutation of the open documents")]
    InvalidOrder,
}

/// Result of applying one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    /// Documents that left the session; their asset handles must be released.
    pub released: Vec<String>,
    pub rejection: Option<SessionRejection>,
}

impl Transition {
    fn accepted(session: Session, released: Vec<String>) -> Self {
        Self {
            session,
            released,
            rejection: None,
        }
    }

    fn rejected(session: &Session, rejection: SessionRejection) -> Self {
        Self {
            session: session.clone(),
            released: Vec::new(),
            rejection: Some(rejection),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依開啟順序排列的文件路徑。 / Open document paths in tab order.
    pub fn open_documents(&self) -> &[String] {
        &self.open_documents
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.open_documents.iter().any(|open| open == path)
    }

    pub fn is_empty(&self) -> bool {
        self.open_documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.open_documents.len()
    }

    /// Applies `action`, consulting `index` for openability.
    pub fn apply(&self, action: SessionAction, index: &FlatIndex) -> Transition {
        match action {
            SessionAction::Select(path) => self.select(index, &path),
            SessionAction::Close(path) => self.close(&path),
            SessionAction::Activate(path) => self.activate(&path),
            SessionAction::Reorder(order) => self.reorder(&order),
            SessionAction::Reset => self.reset(),
        }
    }

    /// Opens `path` at the end of the tab order if needed and makes it active.
    /// Missing and unclassified records are rejected without any change.
    pub fn select(&self, index: &FlatIndex, path: &str) -> Transition {
        let reason = match index.get(path) {
            None => Some(UnviewableReason::Missing),
            Some(record) if !record.is_openable() => Some(UnviewableReason::Unclassified),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Transition::rejected(
                self,
                SessionRejection::Unviewable {
                    path: path.to_string(),
                    reason,
                },
            );
        }

        let mut next = self.clone();
        if !next.is_open(path) {
            next.open_documents.push(path.to_string());
        }
        next.active = Some(path.to_string());
        Transition::accepted(next, Vec::new())
    }

    /// Closes `path`. Closing the active tab activates the last remaining one.
    pub fn close(&self, path: &str) -> Transition {
        if !self.is_open(path) {
            return Transition::rejected(
                self,
                SessionRejection::NotOpen {
                    path: path.to_string(),
                },
            );
        }

        let mut next = self.clone();
        next.open_documents.retain(|open| open != path);
        if next.active.as_deref() == Some(path) {
            next.active = next.open_documents.last().cloned();
        }
        Transition::accepted(next, vec![path.to_string()])
    }

    /// 切換啟用分頁而不改變順序。 / Switches the active tab without touching the order.
    pub fn activate(&self, path: &str) -> Transition {
        if !self.is_open(path) {
            return Transition::rejected(
                self,
                SessionRejection::NotOpen {
                    path: path.to_string(),
                },
            );
        }
        let mut next = self.clone();
        next.active = Some(path.to_string());
        Transition::accepted(next, Vec::new())
    }

    /// Replaces the tab order with `order`, which must hold exactly the open paths.
    pub fn reorder(&self, order: &[String]) -> Transition {
        let mut current: Vec<&str> = self.open_documents.iter().map(String::as_str).collect();
        let mut proposed: Vec<&str> = order.iter().map(String::as_str).collect();
        current.sort_unstable();
        proposed.sort_unstable();
        if current != proposed {
            return Transition::rejected(self, SessionRejection::InvalidOrder);
        }

        let mut next = self.clone();
        next.open_documents = order.to_vec();
        Transition::accepted(next, Vec::new())
    }

    pub fn reset(&self) -> Transition {
        Transition::accepted(Session::default(), self.open_documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultview_core::{BinaryHandle, FileRecord, ImageFormat};

    fn index() -> FlatIndex {
        let mut index = FlatIndex::new();
        index.insert(FileRecord::text("x.md", "# x"));
        index.insert(FileRecord::text("y.md", "# y"));
        index.insert(FileRecord::text("z.md", "# z"));
        index.insert(FileRecord::binary(
            "pic.png",
            BinaryHandle::new(ImageFormat::Png, vec![1]),
        ));
        index.insert(FileRecord::unclassified("data.csv"));
        index
    }

    fn open(paths: &[&str], index: &FlatIndex) -> Session {
        paths.iter().fold(Session::new(), |session, path| {
            session.select(index, path).session
        })
    }

    #[test]
    fn closing_inactive_tab_keeps_active() {
        let index = index();
        let session = open(&["x.md", "y.md"], &index);
        let transition = session.close("x.md");
        assert_eq!(transition.session.active(), Some("y.md"));
        assert_eq!(transition.released, vec!["x.md".to_string()]);
    }

    #[test]
    fn closing_active_tab_falls_back_to_last_remaining() {
        let index = index();
        let session = open(&["x.md", "y.md"], &index);
        let session = session.close("y.md").session;
        assert_eq!(session.active(), Some("x.md"));

        let session = open(&["x.md", "y.md", "z.md"], &index);
        let session = session.activate("x.md").session.close("x.md").session;
        assert_eq!(session.active(), Some("z.md"));
    }

    #[test]
    fn closing_only_tab_clears_active() {
        let index = index();
        let session = open(&["x.md"], &index).close("x.md").session;
        assert!(session.is_empty());
        assert_eq!(session.active(), None);
    }

    #[test]
    fn reselecting_open_document_only_activates_it() {
        let index = index();
        let session = open(&["x.md", "y.md", "x.md"], &index);
        assert_eq!(session.open_documents(), ["x.md", "y.md"]);
        assert_eq!(session.active(), Some("x.md"));
    }

    #[test]
    fn binary_records_are_openable() {
        let index = index();
        let session = open(&["pic.png"], &index);
        assert_eq!(session.active(), Some("pic.png"));
    }

    #[test]
    fn unviewable_selection_changes_nothing() {
        let index = index();
        let session = open(&["x.md"], &index);

        for (path, reason) in [
            ("data.csv", UnviewableReason::Unclassified),
            ("missing.md", UnviewableReason::Missing),
        ] {
            let transition = session.select(&index, path);
            assert_eq!(transition.session, session);
            assert_eq!(
                transition.rejection,
                Some(SessionRejection::Unviewable {
                    path: path.to_string(),
                    reason,
                })
            );
        }
    }

    #[test]
    fn activate_requires_membership() {
        let index = index();
        let session = open(&["x.md", "y.md"], &index);
        let transition = session.activate("z.md");
        assert_eq!(transition.session, session);
        assert!(matches!(
            transition.rejection,
            Some(SessionRejection::NotOpen { .. })
        ));

        let session = session.activate("x.md").session;
        assert_eq!(session.active(), Some("x.md"));
        assert_eq!(session.open_documents(), ["x.md", "y.md"]);
    }

    #[test]
    fn reorder_accepts_only_permutations() {
        let index = index();
        let session = open(&["x.md", "y.md", "z.md"], &index);

        let reordered = session.reorder(&["z.md".into(), "x.md".into(), "y.md".into()]);
        assert!(reordered.rejection.is_none());
        assert_eq!(reordered.session.open_documents(), ["z.md", "x.md", "y.md"]);
        assert_eq!(reordered.session.active(), Some("z.md"));

        for bad in [
            vec!["x.md".to_string(), "y.md".to_string()],
            vec!["x.md".into(), "y.md".into(), "y.md".into()],
            vec!["x.md".into(), "y.md".into(), "pic.png".into()],
        ] {
            let transition = session.reorder(&bad);
            assert_eq!(transition.rejection, Some(SessionRejection::InvalidOrder));
            assert_eq!(transition.session, session);
        }
    }

    #[test]
    fn reset_releases_everything() {
        let index = index();
        let session = open(&["x.md", "y.md"], &index);
        let transition = session.apply(SessionAction::Reset, &index);
        assert_eq!(transition.session, Session::new());
        assert_eq!(transition.released, vec!["x.md".to_string(), "y.md".to_string()]);
    }

    #[test]
    fn snapshot_serialises_open_documents() {
        let index = index();
        let session = open(&["x.md"], &index);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "open_documents": ["x.md"], "active": "x.md" })
        );
    }
}
