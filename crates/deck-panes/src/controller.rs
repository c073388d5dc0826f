//! Decides when the pane layout needs to change and what it should become.
//!
//! Intents are observed as they are dispatched; the actual comparison runs
//! once per loop iteration in [`LayoutController::apply_pending`], so a burst
//! of keystrokes within one tick yields at most one [`LayoutJob`].

use crate::orchestrator::{plan_layout, LayoutJob};
use crate::spec::{PaneSpec, SpecBuilder};
use deck_core::{Catalog, PaneKey};
use deck_state::{Intent, UiState, View};
use tracing::debug;

/// Everything about [`UiState`] that influences the pane tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutSnapshot {
    pub active_key: Option<PaneKey>,
    pub sticky_keys: Vec<PaneKey>,
    pub selected_key: Option<PaneKey>,
    pub has_tree_focus: bool,
    pub status_bar_visible: bool,
}

impl LayoutSnapshot {
    pub fn from_state(state: &UiState) -> Self {
        let selected_key = match state.app.view {
            View::Sessions => state.sessions.selected.clone().map(PaneKey::Session),
            View::Preparation => state.preparation.selected.clone().map(PaneKey::Document),
        };
        Self {
            active_key: state.preview_key(),
            sticky_keys: state.sticky_keys(),
            selected_key,
            has_tree_focus: state.app.tree_focus,
            status_bar_visible: state.app.status_bar_visible,
        }
    }

    /// Row under the tree cursor, while the tree holds keyboard focus.
    pub fn tree_focus_key(&self) -> Option<&PaneKey> {
        if self.has_tree_focus {
            self.selected_key.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDecision {
    pub job: LayoutJob,
    /// Pinned membership changed since the last applied layout.
    pub persist: bool,
}

#[derive(Debug, Default)]
pub struct LayoutController {
    builder: SpecBuilder,
    applied: Option<LayoutSnapshot>,
    last_job: Option<LayoutJob>,
    pending: bool,
    catalog_changed: bool,
    focus_requested: bool,
}

impl LayoutController {
    pub fn new(builder: SpecBuilder) -> Self {
        Self {
            builder,
            ..Self::default()
        }
    }

    /// Returns whether the intent can affect the layout.
    pub fn observe(&mut self, intent: &Intent) -> bool {
        let tracked = match intent {
            Intent::SetSessionPreview { focus, .. } | Intent::SetDocPreview { focus, .. } => {
                self.focus_requested |= *focus;
                true
            }
            Intent::SyncCatalog { .. } => {
                self.catalog_changed = true;
                true
            }
            Intent::ClearSessionPreview
            | Intent::ClearDocPreview
            | Intent::ToggleStickySession { .. }
            | Intent::ToggleStickyDoc { .. }
            | Intent::SelectSession { .. }
            | Intent::ClearSessionSelection
            | Intent::SelectDocument { .. }
            | Intent::SetTreeFocus { .. }
            | Intent::SetView { .. }
            | Intent::ToggleStatusBar => true,
            _ => false,
        };
        self.pending |= tracked;
        tracked
    }

    /// Forces the next [`Self::apply_pending`] to recompute, e.g. after state
    /// was restored from disk without going through intents.
    pub fn invalidate(&mut self) {
        self.pending = true;
        self.catalog_changed = true;
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    pub fn apply_pending(&mut self, state: &UiState, catalog: &Catalog) -> Option<LayoutDecision> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        let catalog_changed = std::mem::take(&mut self.catalog_changed);
        let focus_requested = std::mem::take(&mut self.focus_requested);

        let snapshot = LayoutSnapshot::from_state(state);
        let focus = if focus_requested {
            snapshot.active_key.clone()
        } else {
            None
        };
        if self.applied.as_ref() == Some(&snapshot) && !catalog_changed && focus.is_none() {
            return None;
        }

        let persist = self
            .applied
            .as_ref()
            .is_some_and(|applied| applied.sticky_keys != snapshot.sticky_keys);

        let job = self.build_job(&snapshot, state, catalog);
        let unchanged = self.last_job.as_ref() == Some(&job);
        self.applied = Some(snapshot);
        if unchanged && focus.is_none() && !persist {
            debug!(event = "layout_unchanged");
            return None;
        }
        self.last_job = Some(job.clone());
        Some(LayoutDecision {
            job: LayoutJob { focus, ..job },
            persist,
        })
    }

    fn build_job(
        &self,
        snapshot: &LayoutSnapshot,
        state: &UiState,
        catalog: &Catalog,
    ) -> LayoutJob {
        let sticky = snapshot
            .sticky_keys
            .iter()
            .filter_map(|key| self.spec_for(key, state, catalog, true))
            .collect();
        let active = snapshot
            .active_key
            .as_ref()
            .and_then(|key| self.spec_for(key, state, catalog, false));
        LayoutJob {
            plan: plan_layout(sticky, active),
            focus: None,
            tree_focus: snapshot.tree_focus_key().cloned(),
            status_bar_visible: snapshot.status_bar_visible,
        }
    }

    fn spec_for(
        &self,
        key: &PaneKey,
        state: &UiState,
        catalog: &Catalog,
        sticky: bool,
    ) -> Option<PaneSpec> {
        let spec = match key {
            PaneKey::Session(id) => catalog.session(id).map(|session| {
                self.builder
                    .session_spec(session, catalog.computer(&session.computer), sticky)
            }),
            PaneKey::Document(id) => state.doc(id).map(|doc| self.builder.doc_spec(doc, sticky)),
        };
        if spec.is_none() {
            debug!(event = "pane_target_unknown", key = %key);
        }
        spec
    }
}
