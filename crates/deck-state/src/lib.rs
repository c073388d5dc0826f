pub mod intent;
pub mod persist;
pub mod reducer;
pub mod timer;

pub use intent::Intent;
pub use reducer::reduce;

use chrono::{DateTime, Utc};
use deck_core::{DocPreview, PaneKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Upper bound on pinned panes, sessions and documents combined.
pub const MAX_STICKY_PANES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    InputPending,
    OutputPending,
    OutputTransient { since: DateTime<Utc> },
}

impl Highlight {
    pub fn is_output(&self) -> bool {
        matches!(
            self,
            Highlight::OutputPending | Highlight::OutputTransient { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Sessions,
    Preparation,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Sessions => "Sessions",
            View::Preparation => "Preparation",
        }
    }

    pub fn next(self) -> Self {
        match self {
            View::Sessions => View::Preparation,
            View::Preparation => View::Sessions,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionViewState {
    pub selected: Option<String>,
    pub scroll_offset: usize,
    /// Tree node ids whose children are hidden.
    pub collapsed: BTreeSet<String>,
    pub sticky: Vec<String>,
    pub preview: Option<String>,
    pub highlights: BTreeMap<String, Highlight>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepViewState {
    pub selected: Option<String>,
    pub scroll_offset: usize,
    pub expanded: BTreeSet<String>,
    pub sticky: Vec<DocPreview>,
    pub preview: Option<DocPreview>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewState {
    pub view: View,
    pub tree_focus: bool,
    pub status_bar_visible: bool,
}

impl Default for AppViewState {
    fn default() -> Self {
        Self {
            view: View::Sessions,
            tree_focus: true,
            status_bar_visible: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub sessions: SessionViewState,
    pub preparation: PrepViewState,
    pub app: AppViewState,
}

impl UiState {
    pub fn sticky_count(&self) -> usize {
        self.sessions.sticky.len() + self.preparation.sticky.len()
    }

    /// Whether one more pane can be pinned. Callers check this before
    /// offering the option; the reducer drops overflowing toggles.
    pub fn can_pin(&self) -> bool {
        self.sticky_count() < MAX_STICKY_PANES
    }

    pub fn is_sticky_session(&self, session_id: &str) -> bool {
        self.sessions.sticky.iter().any(|id| id == session_id)
    }

    pub fn is_sticky_doc(&self, doc_id: &str) -> bool {
        self.preparation
            .sticky
            .iter()
            .any(|doc| doc.doc_id == doc_id)
    }

    /// Selected, pinned or previewed.
    pub fn is_session_visible(&self, session_id: &str) -> bool {
        self.sessions.selected.as_deref() == Some(session_id)
            || self.sessions.preview.as_deref() == Some(session_id)
            || self.is_sticky_session(session_id)
    }

    pub fn highlight(&self, session_id: &str) -> Option<Highlight> {
        self.sessions.highlights.get(session_id).copied()
    }

    /// Pinned keys in pane order: sessions first, then documents.
    pub fn sticky_keys(&self) -> Vec<PaneKey> {
        self.sessions
            .sticky
            .iter()
            .map(|id| PaneKey::Session(id.clone()))
            .chain(
                self.preparation
                    .sticky
                    .iter()
                    .map(|doc| PaneKey::Document(doc.doc_id.clone())),
            )
            .collect()
    }

    pub fn preview_key(&self) -> Option<PaneKey> {
        if let Some(id) = &self.sessions.preview {
            return Some(PaneKey::Session(id.clone()));
        }
        self.preparation
            .preview
            .as_ref()
            .map(|doc| PaneKey::Document(doc.doc_id.clone()))
    }

    /// Document descriptor for a pinned or previewed document.
    pub fn doc(&self, doc_id: &str) -> Option<&DocPreview> {
        self.preparation
            .preview
            .iter()
            .chain(self.preparation.sticky.iter())
            .find(|doc| doc.doc_id == doc_id)
    }
}
