use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use deck_core::tree::{
    build_dependency_tree, build_session_tree, flatten_session_tree, DependencyRow, SessionRow,
};
use deck_core::Catalog;
use deck_panes::{LayoutController, LayoutDecision, SpecBuilder};
use deck_state::persist::{PersistedState, StateStore};
use deck_state::timer::due_expiries;
use deck_state::{reduce, Intent, UiState, View, MAX_STICKY_PANES};
use tracing::{debug, info, warn};

pub struct App {
    pub state: UiState,
    pub catalog: Catalog,
    pub session_rows: Vec<SessionRow>,
    pub dependency_rows: Vec<DependencyRow>,
    pub session_cursor: usize,
    pub prep_cursor: usize,
    pub notice: Option<String>,
    controller: LayoutController,
    store: StateStore,
    viewport: usize,
    save_requested: bool,
    reload_requested: bool,
    quit: bool,
}

impl App {
    pub fn new(store: StateStore, builder: SpecBuilder) -> Self {
        Self {
            state: UiState::default(),
            catalog: Catalog::default(),
            session_rows: Vec::new(),
            dependency_rows: Vec::new(),
            session_cursor: 0,
            prep_cursor: 0,
            notice: None,
            controller: LayoutController::new(builder),
            store,
            viewport: 1,
            save_requested: false,
            reload_requested: false,
            quit: false,
        }
    }

    /// Merges the persisted namespaces into the fresh state.
    pub fn restore(&mut self) {
        match self.store.load() {
            Ok(persisted) => {
                persisted.merge_into(&mut self.state);
                info!(
                    event = "ui_state_restored",
                    path = %self.store.path().display(),
                    sticky = self.state.sticky_count()
                );
            }
            Err(err) => warn!(
                event = "ui_state_restore_failed",
                path = %self.store.path().display(),
                error = %err
            ),
        }
        self.rebuild_rows();
        self.controller.invalidate();
    }

    pub fn set_catalog(&mut self, catalog: Catalog) {
        let session_ids = catalog.session_ids();
        let doc_ids = catalog.doc_ids();
        self.catalog = catalog;
        self.dispatch(Intent::SyncCatalog {
            session_ids,
            doc_ids,
        });
    }

    pub fn dispatch(&mut self, intent: Intent) {
        let durable = matches!(
            intent,
            Intent::ToggleCollapsed { .. }
                | Intent::ToggleExpanded { .. }
                | Intent::SetView { .. }
                | Intent::ToggleStatusBar
        );
        let reshapes_rows = matches!(
            intent,
            Intent::ToggleCollapsed { .. } | Intent::SyncCatalog { .. }
        );
        self.controller.observe(&intent);
        debug!(event = "intent_dispatched", kind = intent.kind());
        reduce(&mut self.state, intent);
        if reshapes_rows {
            self.rebuild_rows();
        }
        if durable {
            self.save_requested = true;
        }
    }

    pub fn rebuild_rows(&mut self) {
        let forest = build_session_tree(
            &self.catalog.computers,
            &self.catalog.projects,
            &self.catalog.sessions,
        );
        self.session_rows = flatten_session_tree(&forest, &self.state.sessions.collapsed);
        self.dependency_rows = build_dependency_tree(&self.catalog.work_items);

        if let Some(selected) = self.state.sessions.selected.clone() {
            if let Some(pos) = self
                .session_rows
                .iter()
                .position(|row| row.session_id() == Some(selected.as_str()))
            {
                self.session_cursor = pos;
            }
        }
        if let Some(selected) = self.state.preparation.selected.clone() {
            if let Some(pos) = self
                .dependency_rows
                .iter()
                .position(|row| row.item.slug == selected)
            {
                self.prep_cursor = pos;
            }
        }
        self.session_cursor = self
            .session_cursor
            .min(self.session_rows.len().saturating_sub(1));
        self.prep_cursor = self
            .prep_cursor
            .min(self.dependency_rows.len().saturating_sub(1));
    }

    pub fn set_viewport(&mut self, rows: usize) {
        self.viewport = rows.max(1);
    }

    pub fn handle_focus(&mut self, focused: bool) {
        if self.state.app.tree_focus != focused {
            self.dispatch(Intent::SetTreeFocus { focused });
        }
    }

    pub fn on_activity(&mut self, intents: Vec<Intent>) {
        for intent in intents {
            self.dispatch(intent);
        }
    }

    pub fn on_tick(&mut self, now: DateTime<Utc>) {
        for intent in due_expiries(&self.state, now) {
            self.dispatch(intent);
        }
    }

    /// At most one layout decision per loop iteration.
    pub fn next_layout(&mut self) -> Option<LayoutDecision> {
        let decision = self.controller.apply_pending(&self.state, &self.catalog)?;
        if decision.persist {
            self.save_requested = true;
        }
        Some(decision)
    }

    pub fn flush_state(&mut self) {
        if !self.save_requested {
            return;
        }
        self.save_requested = false;
        if let Err(err) = self.store.save(&PersistedState::capture(&self.state)) {
            warn!(
                event = "ui_state_save_failed",
                path = %self.store.path().display(),
                error = %err
            );
        }
    }

    pub fn take_reload_request(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn selected_session_row(&self) -> Option<&SessionRow> {
        self.session_rows.get(self.session_cursor)
    }

    pub fn selected_dependency_row(&self) -> Option<&DependencyRow> {
        self.dependency_rows.get(self.prep_cursor)
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Esc => {
                if self.notice.take().is_none() {
                    self.quit = true;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Home | KeyCode::Char('g') => self.move_cursor(isize::MIN),
            KeyCode::End | KeyCode::Char('G') => self.move_cursor(isize::MAX),
            KeyCode::Enter => self.preview_selected(true),
            KeyCode::Char(' ') | KeyCode::Char('p') => self.preview_selected(false),
            KeyCode::Char('s') => self.toggle_sticky_selected(),
            KeyCode::Char('c') | KeyCode::Left | KeyCode::Right => self.toggle_fold_selected(),
            KeyCode::Char('x') => self.clear_preview(),
            KeyCode::Char('a') => {
                if let Some(session_id) = self.cursor_session_id() {
                    self.dispatch(Intent::ClearHighlight { session_id });
                }
            }
            KeyCode::Tab => {
                let view = self.state.app.view.next();
                self.dispatch(Intent::SetView { view });
            }
            KeyCode::Char('b') => self.dispatch(Intent::ToggleStatusBar),
            KeyCode::Char('r') => self.reload_requested = true,
            _ => {}
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let (len, cursor) = match self.state.app.view {
            View::Sessions => (self.session_rows.len(), self.session_cursor),
            View::Preparation => (self.dependency_rows.len(), self.prep_cursor),
        };
        if len == 0 {
            return;
        }
        let next = cursor.saturating_add_signed(delta).min(len - 1);
        match self.state.app.view {
            View::Sessions => {
                self.session_cursor = next;
                match self.cursor_session_id() {
                    Some(session_id) => self.dispatch(Intent::SelectSession { session_id }),
                    None if self.state.sessions.selected.is_some() => {
                        self.dispatch(Intent::ClearSessionSelection)
                    }
                    None => {}
                }
            }
            View::Preparation => {
                self.prep_cursor = next;
                if let Some(row) = self.dependency_rows.get(next) {
                    let doc_id = row.item.slug.clone();
                    self.dispatch(Intent::SelectDocument { doc_id });
                }
            }
        }
        self.ensure_visible(next);
    }

    fn ensure_visible(&mut self, cursor: usize) {
        let view = self.state.app.view;
        let offset = match view {
            View::Sessions => self.state.sessions.scroll_offset,
            View::Preparation => self.state.preparation.scroll_offset,
        };
        let next = if cursor < offset {
            cursor
        } else if cursor >= offset + self.viewport {
            cursor + 1 - self.viewport
        } else {
            offset
        };
        if next != offset {
            self.dispatch(Intent::SetScroll { view, offset: next });
        }
    }

    fn cursor_session_id(&self) -> Option<String> {
        self.selected_session_row()
            .and_then(SessionRow::session_id)
            .map(str::to_string)
    }

    fn preview_selected(&mut self, focus: bool) {
        match self.state.app.view {
            View::Sessions => {
                if let Some(session_id) = self.cursor_session_id() {
                    self.dispatch(Intent::SetSessionPreview { session_id, focus });
                }
            }
            View::Preparation => {
                let Some(item) = self.selected_dependency_row().map(|row| row.item.clone()) else {
                    return;
                };
                match item.doc_preview() {
                    Some(doc) => self.dispatch(Intent::SetDocPreview { doc, focus }),
                    None => {
                        self.notice = Some(format!("{} has no document to preview", item.slug));
                    }
                }
            }
        }
    }

    fn toggle_sticky_selected(&mut self) {
        match self.state.app.view {
            View::Sessions => {
                let Some(session_id) = self.cursor_session_id() else {
                    return;
                };
                if !self.state.is_sticky_session(&session_id) && !self.state.can_pin() {
                    self.notice = Some(capacity_notice());
                    return;
                }
                self.dispatch(Intent::ToggleStickySession { session_id });
            }
            View::Preparation => {
                let Some(doc) = self
                    .selected_dependency_row()
                    .and_then(|row| row.item.doc_preview())
                else {
                    return;
                };
                if !self.state.is_sticky_doc(&doc.doc_id) && !self.state.can_pin() {
                    self.notice = Some(capacity_notice());
                    return;
                }
                self.dispatch(Intent::ToggleStickyDoc { doc });
            }
        }
    }

    fn toggle_fold_selected(&mut self) {
        match self.state.app.view {
            View::Sessions => {
                let Some(row) = self.selected_session_row() else {
                    return;
                };
                if row.has_children {
                    let node_id = row.id.clone();
                    self.dispatch(Intent::ToggleCollapsed { node_id });
                }
            }
            View::Preparation => {
                if let Some(row) = self.selected_dependency_row() {
                    let doc_id = row.item.slug.clone();
                    self.dispatch(Intent::ToggleExpanded { doc_id });
                }
            }
        }
    }

    fn clear_preview(&mut self) {
        match self.state.app.view {
            View::Sessions => self.dispatch(Intent::ClearSessionPreview),
            View::Preparation => self.dispatch(Intent::ClearDocPreview),
        }
    }
}

fn capacity_notice() -> String {
    format!("pin limit reached ({MAX_STICKY_PANES} panes); unpin one first")
}
