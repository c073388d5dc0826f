use crate::View;
use chrono::{DateTime, Utc};
use deck_core::DocPreview;
use std::collections::BTreeSet;

/// Every state mutation is expressed as one of these and applied by
/// [`crate::reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectSession {
        session_id: String,
    },
    /// Cursor left the session rows (computer or project header).
    ClearSessionSelection,
    SelectDocument {
        doc_id: String,
    },
    SetSessionPreview {
        session_id: String,
        focus: bool,
    },
    ClearSessionPreview,
    ToggleStickySession {
        session_id: String,
    },
    SetDocPreview {
        doc: DocPreview,
        focus: bool,
    },
    ClearDocPreview,
    ToggleStickyDoc {
        doc: DocPreview,
    },
    UserInput {
        session_id: String,
    },
    AgentOutput {
        session_id: String,
        at: DateTime<Utc>,
    },
    AgentStopped {
        session_id: String,
        at: DateTime<Utc>,
    },
    ExpireTransientHighlight {
        session_id: String,
    },
    ClearHighlight {
        session_id: String,
    },
    ToggleCollapsed {
        node_id: String,
    },
    ToggleExpanded {
        doc_id: String,
    },
    SetScroll {
        view: View,
        offset: usize,
    },
    SetView {
        view: View,
    },
    SetTreeFocus {
        focused: bool,
    },
    ToggleStatusBar,
    SyncCatalog {
        session_ids: BTreeSet<String>,
        doc_ids: BTreeSet<String>,
    },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::SelectSession { .. } => "select_session",
            Intent::ClearSessionSelection => "clear_session_selection",
            Intent::SelectDocument { .. } => "select_document",
            Intent::SetSessionPreview { .. } => "set_session_preview",
            Intent::ClearSessionPreview => "clear_session_preview",
            Intent::ToggleStickySession { .. } => "toggle_sticky_session",
            Intent::SetDocPreview { .. } => "set_doc_preview",
            Intent::ClearDocPreview => "clear_doc_preview",
            Intent::ToggleStickyDoc { .. } => "toggle_sticky_doc",
            Intent::UserInput { .. } => "user_input",
            Intent::AgentOutput { .. } => "agent_output",
            Intent::AgentStopped { .. } => "agent_stopped",
            Intent::ExpireTransientHighlight { .. } => "expire_transient_highlight",
            Intent::ClearHighlight { .. } => "clear_highlight",
            Intent::ToggleCollapsed { .. } => "toggle_collapsed",
            Intent::ToggleExpanded { .. } => "toggle_expanded",
            Intent::SetScroll { .. } => "set_scroll",
            Intent::SetView { .. } => "set_view",
            Intent::SetTreeFocus { .. } => "set_tree_focus",
            Intent::ToggleStatusBar => "toggle_status_bar",
            Intent::SyncCatalog { .. } => "sync_catalog",
        }
    }
}
