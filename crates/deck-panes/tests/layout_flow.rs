use deck_core::{Catalog, ComputerInfo, ComputerStatus, PaneKey, SessionInfo};
use deck_panes::orchestrator::PaneOrchestrator;
use deck_panes::style::PaneStyle;
use deck_panes::{
    ApplyOutcome, LayoutController, Multiplexer, SerialWriter, SpawnConfig, SpecBuilder,
    SplitRequest,
};
use deck_state::{reduce, Intent, UiState};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorded {
    panes: Vec<String>,
    next: u32,
    calls: Vec<String>,
    spawned: Vec<String>,
}

#[derive(Clone, Default)]
struct RecordingMux(Arc<Mutex<Recorded>>);

impl RecordingMux {
    fn new() -> Self {
        let mux = Self::default();
        mux.0.lock().unwrap().panes.push("%1".to_string());
        mux
    }

    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().calls.clone()
    }

    fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.0.lock().unwrap().calls)
    }

    fn spawned(&self) -> Vec<String> {
        self.0.lock().unwrap().spawned.clone()
    }

    fn call(&self, line: String) {
        self.0.lock().unwrap().calls.push(line);
    }
}

impl Multiplexer for RecordingMux {
    fn create_session(&self, name: &str, _command: Option<&str>) -> bool {
        self.call(format!("new-session {name}"));
        true
    }

    fn split_window(&self, request: &SplitRequest) -> Option<String> {
        self.call(format!("split-window {}", request.target));
        let mut inner = self.0.lock().unwrap();
        inner.next += 1;
        let pane = format!("%{}", inner.next + 1);
        inner.panes.push(pane.clone());
        inner.spawned.push(request.command.clone());
        Some(pane)
    }

    fn kill_pane(&self, pane_id: &str) -> bool {
        self.call(format!("kill-pane {pane_id}"));
        self.0.lock().unwrap().panes.retain(|pane| pane != pane_id);
        true
    }

    fn respawn_pane(&self, pane_id: &str, command: &str) -> bool {
        self.call(format!("respawn-pane {pane_id}"));
        self.0.lock().unwrap().spawned.push(command.to_string());
        true
    }

    fn select_pane(&self, pane_id: &str) -> bool {
        self.call(format!("select-pane {pane_id}"));
        true
    }

    fn set_pane_style(&self, pane_id: &str, _style: &PaneStyle) -> bool {
        self.call(format!("style {pane_id}"));
        true
    }

    fn set_status_bar(&self, target: &str, visible: bool) -> bool {
        self.call(format!("status {target} {visible}"));
        true
    }

    fn current_pane_id(&self) -> Option<String> {
        Some("%1".to_string())
    }

    fn list_panes(&self) -> Vec<String> {
        self.0.lock().unwrap().panes.clone()
    }

    fn pane_tty(&self, pane_id: &str) -> Option<String> {
        let inner = self.0.lock().unwrap();
        inner
            .panes
            .iter()
            .any(|pane| pane == pane_id)
            .then(|| format!("/dev/pts/{}", pane_id.trim_start_matches('%')))
    }
}

fn catalog() -> Catalog {
    let session = |id: &str, computer: &str| SessionInfo {
        session_id: id.to_string(),
        title: id.to_string(),
        computer: computer.to_string(),
        project_path: "/srv/app".to_string(),
        tmux_session_name: Some(format!("tc_{id}")),
        active_agent: Some("claude".to_string()),
        initiator_session_id: None,
        status: String::new(),
    };
    Catalog {
        computers: vec![ComputerInfo {
            name: "gpu".to_string(),
            user: Some("ops".to_string()),
            host: Some("gpu.lan".to_string()),
            tmux_binary: None,
            is_local: false,
            status: ComputerStatus::Online,
        }],
        sessions: vec![
            session("s1", "local"),
            session("s2", "gpu"),
            session("s3", "local"),
            session("s4", "local"),
            session("s5", "local"),
            session("s6", "local"),
        ],
        ..Catalog::default()
    }
}

struct Harness {
    state: UiState,
    controller: LayoutController,
    orchestrator: PaneOrchestrator<RecordingMux>,
    catalog: Catalog,
}

impl Harness {
    fn new(mux: RecordingMux) -> Self {
        Self {
            state: UiState::default(),
            controller: LayoutController::new(SpecBuilder::new(SpawnConfig::default())),
            orchestrator: PaneOrchestrator::new(mux),
            catalog: catalog(),
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        self.controller.observe(&intent);
        reduce(&mut self.state, intent);
    }

    fn tick(&mut self) -> Option<ApplyOutcome> {
        let decision = self.controller.apply_pending(&self.state, &self.catalog)?;
        Some(self.orchestrator.apply(&decision.job))
    }
}

fn preview(id: &str) -> Intent {
    Intent::SetSessionPreview {
        session_id: id.to_string(),
        focus: false,
    }
}

fn pin(id: &str) -> Intent {
    Intent::ToggleStickySession {
        session_id: id.to_string(),
    }
}

#[test]
fn repeated_identical_layouts_issue_no_commands() {
    let mux = RecordingMux::new();
    let mut harness = Harness::new(mux.clone());
    harness.dispatch(pin("s1"));
    harness.dispatch(preview("s2"));
    assert_eq!(harness.tick(), Some(ApplyOutcome::Rebuilt));
    assert!(mux.spawned().iter().any(|command| command.starts_with("ssh -t ops@gpu.lan")));
    mux.take_calls();

    harness.dispatch(preview("s2"));
    harness.dispatch(Intent::SetTreeFocus { focused: true });
    assert_eq!(harness.tick(), None);

    // Even a forced identical job is a no-op on the multiplexer.
    let job = deck_panes::LayoutJob {
        plan: deck_panes::plan_layout(
            vec![SpecBuilder::default().session_spec(&harness.catalog.sessions[0], None, true)],
            None,
        ),
        focus: None,
        tree_focus: None,
        status_bar_visible: true,
    };
    let mut fresh = PaneOrchestrator::new(RecordingMux::new());
    fresh.apply(&job);
    let fresh_mux = fresh.mux().clone();
    fresh_mux.take_calls();
    assert_eq!(fresh.apply(&job), ApplyOutcome::Unchanged);
    assert!(fresh_mux.calls().is_empty());
    assert!(mux.calls().is_empty());
}

#[test]
fn switching_preview_swaps_in_place() {
    let mux = RecordingMux::new();
    let mut harness = Harness::new(mux.clone());
    harness.dispatch(pin("s1"));
    harness.dispatch(preview("s3"));
    harness.tick();
    mux.take_calls();

    harness.dispatch(preview("s4"));
    assert_eq!(harness.tick(), Some(ApplyOutcome::Swapped));
    let calls = mux.take_calls();
    assert!(calls.iter().any(|call| call.starts_with("respawn-pane")));
    assert!(!calls.iter().any(|call| call.starts_with("split-window")));
    assert!(harness
        .orchestrator
        .state()
        .pane_for(&PaneKey::Session("s4".to_string()))
        .is_some());
}

#[test]
fn six_requested_panes_render_five() {
    let mux = RecordingMux::new();
    let mut harness = Harness::new(mux.clone());
    for id in ["s1", "s2", "s3", "s4", "s5"] {
        harness.dispatch(pin(id));
    }
    // capacity reached: the sixth pin is dropped, the preview is truncated
    harness.dispatch(pin("s6"));
    assert_eq!(harness.state.sticky_count(), 5);
    harness.dispatch(preview("s6"));
    assert_eq!(harness.tick(), Some(ApplyOutcome::Rebuilt));
    let splits = mux
        .calls()
        .iter()
        .filter(|call| call.starts_with("split-window"))
        .count();
    assert_eq!(splits, 5);
    assert!(harness
        .orchestrator
        .state()
        .pane_for(&PaneKey::Session("s6".to_string()))
        .is_none());
}

#[test]
fn writer_drives_the_orchestrator_off_thread() {
    let mux = RecordingMux::new();
    let mut harness = Harness::new(mux.clone());
    harness.dispatch(preview("s1"));
    let decision = harness
        .controller
        .apply_pending(&harness.state, &harness.catalog)
        .expect("decision");

    let writer = SerialWriter::spawn("pane-writer", PaneOrchestrator::new(mux.clone()))
        .expect("spawn writer");
    let job = decision.job.clone();
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    assert!(writer.submit(move |orchestrator: &mut PaneOrchestrator<RecordingMux>| {
        done_tx.send(orchestrator.apply(&job)).ok();
    }));
    let outcome = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("job applied");
    assert_eq!(outcome, ApplyOutcome::Rebuilt);
    let mut orchestrator = writer
        .shutdown(Duration::from_secs(5))
        .expect("orchestrator back");
    assert!(orchestrator
        .state()
        .pane_for(&PaneKey::Session("s1".to_string()))
        .is_some());
    orchestrator.teardown();
    assert_eq!(mux.list_panes(), vec!["%1".to_string()]);
}
