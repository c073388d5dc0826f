use crate::{Highlight, Intent, UiState, View};
use deck_core::tree::session_node_id;
use deck_core::DocPreview;
use std::collections::BTreeSet;
use tracing::debug;

/// Single write path into [`UiState`]. Total over [`Intent`]: payloads with
/// blank keys are absorbed as no-ops.
pub fn reduce(state: &mut UiState, intent: Intent) {
    match intent {
        Intent::SelectSession { session_id } => {
            if blank(&session_id) {
                return;
            }
            mark_seen(state, &session_id);
            state.sessions.selected = Some(session_id);
        }
        Intent::ClearSessionSelection => {
            state.sessions.selected = None;
        }
        Intent::SelectDocument { doc_id } => {
            if blank(&doc_id) {
                return;
            }
            state.preparation.selected = Some(doc_id);
        }
        Intent::SetSessionPreview { session_id, .. } => {
            if blank(&session_id) {
                return;
            }
            state.sessions.sticky.retain(|id| id != &session_id);
            state.preparation.preview = None;
            mark_seen(state, &session_id);
            state.sessions.preview = Some(session_id);
        }
        Intent::ClearSessionPreview => {
            state.sessions.preview = None;
        }
        Intent::ToggleStickySession { session_id } => {
            if blank(&session_id) {
                return;
            }
            if state.is_sticky_session(&session_id) {
                state.sessions.sticky.retain(|id| id != &session_id);
                return;
            }
            if !state.can_pin() {
                debug!(
                    event = "sticky_capacity_reached",
                    session_id = %session_id,
                    count = state.sticky_count()
                );
                return;
            }
            if state.sessions.preview.as_deref() == Some(session_id.as_str()) {
                state.sessions.preview = None;
            }
            mark_seen(state, &session_id);
            state.sessions.sticky.push(session_id);
        }
        Intent::SetDocPreview { doc, .. } => {
            if !valid_doc(&doc) {
                return;
            }
            state
                .preparation
                .sticky
                .retain(|pinned| pinned.doc_id != doc.doc_id);
            state.sessions.preview = None;
            state.preparation.preview = Some(doc);
        }
        Intent::ClearDocPreview => {
            state.preparation.preview = None;
        }
        Intent::ToggleStickyDoc { doc } => {
            if !valid_doc(&doc) {
                return;
            }
            if state.is_sticky_doc(&doc.doc_id) {
                state
                    .preparation
                    .sticky
                    .retain(|pinned| pinned.doc_id != doc.doc_id);
                return;
            }
            if !state.can_pin() {
                debug!(
                    event = "sticky_capacity_reached",
                    doc_id = %doc.doc_id,
                    count = state.sticky_count()
                );
                return;
            }
            if state
                .preparation
                .preview
                .as_ref()
                .is_some_and(|preview| preview.doc_id == doc.doc_id)
            {
                state.preparation.preview = None;
            }
            state.preparation.sticky.push(doc);
        }
        Intent::UserInput { session_id } => {
            if blank(&session_id) {
                return;
            }
            state
                .sessions
                .highlights
                .insert(session_id, Highlight::InputPending);
        }
        Intent::AgentOutput { session_id, at } => {
            if blank(&session_id) {
                return;
            }
            match state.sessions.highlights.get(&session_id) {
                Some(Highlight::InputPending) | Some(Highlight::OutputPending) => {}
                _ => {
                    state
                        .sessions
                        .highlights
                        .insert(session_id, Highlight::OutputTransient { since: at });
                }
            }
        }
        Intent::AgentStopped { session_id, at } => {
            if blank(&session_id) {
                return;
            }
            let next = if state.is_session_visible(&session_id) {
                Highlight::OutputTransient { since: at }
            } else {
                Highlight::OutputPending
            };
            state.sessions.highlights.insert(session_id, next);
        }
        Intent::ExpireTransientHighlight { session_id } => {
            if matches!(
                state.sessions.highlights.get(&session_id),
                Some(Highlight::OutputTransient { .. })
            ) {
                state.sessions.highlights.remove(&session_id);
            }
        }
        Intent::ClearHighlight { session_id } => {
            state.sessions.highlights.remove(&session_id);
        }
        Intent::ToggleCollapsed { node_id } => {
            if blank(&node_id) {
                return;
            }
            if !state.sessions.collapsed.remove(&node_id) {
                state.sessions.collapsed.insert(node_id);
            }
        }
        Intent::ToggleExpanded { doc_id } => {
            if blank(&doc_id) {
                return;
            }
            if !state.preparation.expanded.remove(&doc_id) {
                state.preparation.expanded.insert(doc_id);
            }
        }
        Intent::SetScroll { view, offset } => match view {
            View::Sessions => state.sessions.scroll_offset = offset,
            View::Preparation => state.preparation.scroll_offset = offset,
        },
        Intent::SetView { view } => {
            state.app.view = view;
        }
        Intent::SetTreeFocus { focused } => {
            state.app.tree_focus = focused;
        }
        Intent::ToggleStatusBar => {
            state.app.status_bar_visible = !state.app.status_bar_visible;
        }
        Intent::SyncCatalog {
            session_ids,
            doc_ids,
        } => sync_catalog(state, &session_ids, &doc_ids),
    }
}

fn sync_catalog(state: &mut UiState, session_ids: &BTreeSet<String>, doc_ids: &BTreeSet<String>) {
    let sessions = &mut state.sessions;
    sessions.sticky.retain(|id| session_ids.contains(id));
    if sessions
        .preview
        .as_ref()
        .is_some_and(|id| !session_ids.contains(id))
    {
        sessions.preview = None;
    }
    if sessions
        .selected
        .as_ref()
        .is_some_and(|id| !session_ids.contains(id))
    {
        sessions.selected = None;
    }
    sessions
        .highlights
        .retain(|id, _| session_ids.contains(id));
    let live_nodes: BTreeSet<String> = session_ids.iter().map(|id| session_node_id(id)).collect();
    sessions
        .collapsed
        .retain(|node| !node.starts_with("session:") || live_nodes.contains(node));

    let prep = &mut state.preparation;
    prep.sticky.retain(|doc| doc_ids.contains(&doc.doc_id));
    if prep
        .preview
        .as_ref()
        .is_some_and(|doc| !doc_ids.contains(&doc.doc_id))
    {
        prep.preview = None;
    }
}

fn mark_seen(state: &mut UiState, session_id: &str) {
    if state
        .sessions
        .highlights
        .get(session_id)
        .is_some_and(Highlight::is_output)
    {
        state.sessions.highlights.remove(session_id);
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn valid_doc(doc: &DocPreview) -> bool {
    !blank(&doc.doc_id) && !blank(&doc.command)
}
