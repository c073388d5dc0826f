mod app;
mod config;
mod feed;
mod ui;

use crate::app::App;
use crate::config::{Args, DeckConfig};
use crate::feed::{load_catalog, setup_watcher, ActivityFeed};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use deck_panes::remote::shell_quote;
use deck_panes::{Multiplexer, PaneOrchestrator, SerialWriter, SpecBuilder, TmuxCli};
use deck_state::persist::StateStore;
use deck_state::timer::next_expiry;
use deck_state::UiState;
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{fs::OpenOptions, io, path::Path, process::Command, sync::Mutex, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const ACTIVITY_POLL_MS: u64 = 500;
const WRITER_SHUTDOWN_WAIT: Duration = Duration::from_secs(3);

type Orchestrator = PaneOrchestrator<TmuxCli>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = DeckConfig::resolve(Args::parse());
    init_logging(&config);

    if !config.inside_tmux {
        return bootstrap_host_session(&config);
    }
    run(config).await
}

fn init_logging(config: &DeckConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = &config.log_file {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            return;
        }
    }
    if config.log_stdout {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

/// Outside tmux: start a detached host session running the dashboard and
/// attach to it.
fn bootstrap_host_session(config: &DeckConfig) -> Result<()> {
    let exe = std::env::current_exe().context("resolving dashboard executable")?;
    let command = [
        shell_quote(&exe.to_string_lossy()),
        "--state-dir".to_string(),
        shell_quote(&config.state_dir.to_string_lossy()),
        "--catalog".to_string(),
        shell_quote(&config.catalog_path.to_string_lossy()),
        "--activity".to_string(),
        shell_quote(&config.activity_path.to_string_lossy()),
        "--tmux-bin".to_string(),
        shell_quote(&config.spawn.tmux_binary),
    ]
    .join(" ");
    let tmux = TmuxCli::new(config.spawn.tmux_binary.clone(), None);
    if tmux.create_session(&config.session_name, Some(&command)) {
        info!(event = "host_session_created", session = %config.session_name);
    } else {
        debug!(event = "host_session_exists", session = %config.session_name);
    }
    let status = Command::new(tmux.binary())
        .args(["attach-session", "-t", &config.session_name])
        .status()
        .with_context(|| format!("attaching to tmux session {}", config.session_name))?;
    if !status.success() {
        anyhow::bail!("tmux attach-session exited with {status}");
    }
    Ok(())
}

async fn run(config: DeckConfig) -> Result<()> {
    let store = StateStore::new(&config.state_dir);
    let mut app = App::new(store, SpecBuilder::new(config.spawn.clone()));
    app.restore();
    reload_catalog(&mut app, &config.catalog_path);

    let mut activity = ActivityFeed::open(config.activity_path.clone());
    let (watcher, watch_rx) = setup_watcher(&[&config.catalog_path, activity.path()]);

    let mux = TmuxCli::new(config.spawn.tmux_binary.clone(), config.own_pane.clone());
    let writer = SerialWriter::spawn("deck-pane-writer", PaneOrchestrator::new(mux))
        .context("spawning pane writer")?;
    info!(
        event = "deck_started",
        state_dir = %config.state_dir.display(),
        catalog = %config.catalog_path.display(),
        sessions = app.catalog.sessions.len()
    );

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &mut app, &mut activity, watch_rx, &writer, &config).await;
    restore_terminal(&mut terminal)?;
    drop(watcher);

    app.flush_state();
    match writer.shutdown(WRITER_SHUTDOWN_WAIT) {
        Some(mut orchestrator) => orchestrator.teardown(),
        None => warn!(event = "pane_writer_not_stopped"),
    }
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    activity: &mut ActivityFeed,
    mut watch_rx: Option<mpsc::Receiver<()>>,
    writer: &SerialWriter<Orchestrator>,
    config: &DeckConfig,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut catalog_ticker = tokio::time::interval(config.catalog_refresh);
    let mut activity_ticker = tokio::time::interval(Duration::from_millis(ACTIVITY_POLL_MS));

    loop {
        if app.take_reload_request() {
            reload_catalog(app, &config.catalog_path);
        }
        if let Some(decision) = app.next_layout() {
            let job = decision.job;
            let submitted = writer.submit(move |orchestrator: &mut Orchestrator| {
                let outcome = orchestrator.apply(&job);
                debug!(event = "layout_applied", outcome = ?outcome);
            });
            if !submitted {
                warn!(event = "pane_writer_gone");
            }
        }
        app.flush_state();

        let size = terminal.size()?;
        app.set_viewport(ui::body_rows(size.height));
        terminal.draw(|f| ui::render(f, app))?;
        if app.should_quit() {
            break;
        }

        let expiry = expiry_delay(&app.state);
        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        app.handle_key(key);
                    }
                }
                Some(Ok(Event::FocusGained)) => app.handle_focus(true),
                Some(Ok(Event::FocusLost)) => app.handle_focus(false),
                Some(Ok(_)) => {}
                Some(Err(err)) => warn!(event = "terminal_event_error", error = %err),
                None => break,
            },
            _ = catalog_ticker.tick() => {
                reload_catalog(app, &config.catalog_path);
            }
            _ = activity_ticker.tick() => {
                app.on_activity(activity.poll(Utc::now()));
            }
            Some(()) = next_change(&mut watch_rx) => {
                reload_catalog(app, &config.catalog_path);
                app.on_activity(activity.poll(Utc::now()));
            }
            _ = sleep_for(expiry) => {
                app.on_tick(Utc::now());
            }
        }
    }
    Ok(())
}

fn reload_catalog(app: &mut App, path: &Path) {
    match load_catalog(path) {
        Ok(catalog) => {
            if catalog != app.catalog {
                info!(
                    event = "catalog_loaded",
                    computers = catalog.computers.len(),
                    sessions = catalog.sessions.len(),
                    work_items = catalog.work_items.len()
                );
                app.set_catalog(catalog);
            }
        }
        Err(err) if path.exists() => {
            warn!(event = "catalog_load_failed", error = %format!("{err:#}"));
        }
        Err(err) => debug!(event = "catalog_missing", error = %format!("{err:#}")),
    }
}

fn expiry_delay(state: &UiState) -> Option<Duration> {
    let at = next_expiry(state)?;
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

async fn sleep_for(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

async fn next_change(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
