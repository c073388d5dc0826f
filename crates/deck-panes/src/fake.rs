use crate::mux::{Multiplexer, SplitDirection, SplitRequest};
use crate::style::PaneStyle;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct FakeInner {
    dashboard: Option<String>,
    panes: Vec<String>,
    commands: Vec<(String, String)>,
    next_id: u32,
    log: Vec<String>,
}

/// In-memory multiplexer that records every call.
#[derive(Debug, Clone, Default)]
pub struct FakeMux {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeMux {
    pub fn with_dashboard(pane: &str) -> Self {
        let mux = Self::default();
        {
            let mut inner = mux.inner.lock().unwrap();
            inner.dashboard = Some(pane.to_string());
            inner.panes.push(pane.to_string());
            inner.next_id = 100;
        }
        mux
    }

    pub fn log(&self) -> Vec<String> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.inner.lock().unwrap().log.clear();
    }

    pub fn panes(&self) -> Vec<String> {
        self.inner.lock().unwrap().panes.clone()
    }

    pub fn command_of(&self, pane: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .commands
            .iter()
            .rev()
            .find(|(id, _)| id == pane)
            .map(|(_, command)| command.clone())
    }

    /// Simulates a pane dying outside the orchestrator's control.
    pub fn drop_pane(&self, pane: &str) {
        self.inner.lock().unwrap().panes.retain(|id| id != pane);
    }

    fn record(&self, line: String) {
        self.inner.lock().unwrap().log.push(line);
    }
}

impl Multiplexer for FakeMux {
    fn create_session(&self, name: &str, _command: Option<&str>) -> bool {
        self.record(format!("new-session {name}"));
        true
    }

    fn split_window(&self, request: &SplitRequest) -> Option<String> {
        let direction = match request.direction {
            SplitDirection::Horizontal => "h",
            SplitDirection::Vertical => "v",
        };
        self.record(format!(
            "split {} {direction} {}",
            request.target, request.size_pct
        ));
        let mut inner = self.inner.lock().unwrap();
        if !inner.panes.contains(&request.target) {
            return None;
        }
        inner.next_id += 1;
        let id = format!("%{}", inner.next_id);
        inner.panes.push(id.clone());
        inner.commands.push((id.clone(), request.command.clone()));
        Some(id)
    }

    fn kill_pane(&self, pane_id: &str) -> bool {
        self.record(format!("kill {pane_id}"));
        let mut inner = self.inner.lock().unwrap();
        let before = inner.panes.len();
        inner.panes.retain(|id| id != pane_id);
        before != inner.panes.len()
    }

    fn respawn_pane(&self, pane_id: &str, command: &str) -> bool {
        self.record(format!("respawn {pane_id}"));
        let mut inner = self.inner.lock().unwrap();
        if !inner.panes.iter().any(|id| id == pane_id) {
            return false;
        }
        inner
            .commands
            .push((pane_id.to_string(), command.to_string()));
        true
    }

    fn select_pane(&self, pane_id: &str) -> bool {
        self.record(format!("select {pane_id}"));
        self.inner.lock().unwrap().panes.iter().any(|id| id == pane_id)
    }

    fn set_pane_style(&self, pane_id: &str, style: &PaneStyle) -> bool {
        self.record(format!("style {pane_id} {}", style.window));
        true
    }

    fn set_status_bar(&self, target: &str, visible: bool) -> bool {
        self.record(format!("status {target} {visible}"));
        true
    }

    fn current_pane_id(&self) -> Option<String> {
        self.record("current".to_string());
        self.inner.lock().unwrap().dashboard.clone()
    }

    fn list_panes(&self) -> Vec<String> {
        self.record("list".to_string());
        self.panes()
    }

    fn pane_tty(&self, pane_id: &str) -> Option<String> {
        self.record(format!("tty {pane_id}"));
        let inner = self.inner.lock().unwrap();
        inner
            .panes
            .iter()
            .position(|id| id == pane_id)
            .map(|idx| format!("/dev/pts/{idx}"))
    }
}
