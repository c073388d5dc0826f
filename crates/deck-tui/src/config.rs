use clap::Parser;
use deck_panes::remote::{Appearance, AppearanceMode};
use deck_panes::SpawnConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SESSION_NAME: &str = "deck";
const DEFAULT_TERM: &str = "tmux-256color";
const CATALOG_REFRESH_SECS: u64 = 5;
const CATALOG_FILE_NAME: &str = "catalog.json";
const ACTIVITY_FILE_NAME: &str = "activity.ndjson";

#[derive(Parser, Debug, Clone)]
#[command(name = "deck")]
#[command(about = "Terminal dashboard for supervising agent sessions", long_about = None)]
pub struct Args {
    /// Directory holding ui-state.json and the default feeds.
    #[arg(long, env = "DECK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
    /// Catalog JSON with computers, projects, sessions and work items.
    #[arg(long, env = "DECK_CATALOG")]
    pub catalog: Option<PathBuf>,
    /// NDJSON activity feed.
    #[arg(long, env = "DECK_ACTIVITY")]
    pub activity: Option<PathBuf>,
    #[arg(long, env = "DECK_TMUX_BIN")]
    pub tmux_bin: Option<String>,
    #[arg(long, env = "DECK_APPEARANCE")]
    pub appearance: Option<String>,
    #[arg(long, env = "DECK_BG")]
    pub background: Option<String>,
    /// Host session created when started outside tmux.
    #[arg(long, default_value = DEFAULT_SESSION_NAME)]
    pub session_name: String,
    #[arg(long, default_value_t = CATALOG_REFRESH_SECS)]
    pub refresh_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DeckConfig {
    pub state_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub activity_path: PathBuf,
    pub session_name: String,
    pub spawn: SpawnConfig,
    pub own_pane: Option<String>,
    pub inside_tmux: bool,
    pub catalog_refresh: Duration,
    pub log_stdout: bool,
    pub log_file: Option<PathBuf>,
}

impl DeckConfig {
    pub fn resolve(args: Args) -> Self {
        let state_dir = resolve_state_dir(args.state_dir);
        let catalog_path = args
            .catalog
            .unwrap_or_else(|| state_dir.join(CATALOG_FILE_NAME));
        let activity_path = args
            .activity
            .unwrap_or_else(|| state_dir.join(ACTIVITY_FILE_NAME));
        let tmux_binary = args
            .tmux_bin
            .filter(|value| !value.trim().is_empty())
            .or_else(|| which_cmd("tmux"))
            .unwrap_or_else(|| "tmux".to_string());
        let spawn = SpawnConfig {
            tmux_binary,
            ssh_binary: which_cmd("ssh").unwrap_or_else(|| "ssh".to_string()),
            term: resolve_term(std::env::var("TERM").ok()),
            appearance: resolve_appearance(args.appearance.as_deref(), args.background),
        };
        let log_file = std::env::var("DECK_LOG_FILE")
            .ok()
            .and_then(|value| resolve_log_file(&value, &state_dir));
        Self {
            catalog_path,
            activity_path,
            session_name: args.session_name,
            spawn,
            own_pane: std::env::var("TMUX_PANE").ok(),
            inside_tmux: std::env::var("TMUX")
                .map(|value| !value.trim().is_empty())
                .unwrap_or(false),
            catalog_refresh: Duration::from_secs(args.refresh_secs.max(1)),
            log_stdout: std::env::var("DECK_LOG_STDOUT")
                .ok()
                .and_then(|value| parse_bool_flag(&value))
                .unwrap_or(false),
            log_file,
            state_dir,
        }
    }
}

fn resolve_state_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit.filter(|path| !path.as_os_str().is_empty()) {
        return path;
    }
    if let Some(dir) = dirs::state_dir() {
        return dir.join("deck");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".local/state/deck");
    }
    PathBuf::from(".deck")
}

fn resolve_term(value: Option<String>) -> String {
    value
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty() && term != "dumb")
        .unwrap_or_else(|| DEFAULT_TERM.to_string())
}

fn resolve_appearance(mode: Option<&str>, background: Option<String>) -> Appearance {
    Appearance {
        mode: mode.and_then(AppearanceMode::parse).unwrap_or_default(),
        background: background.filter(|value| !value.trim().is_empty()),
    }
}

/// A truthy value puts the log next to the state file; anything else is a path.
fn resolve_log_file(value: &str, state_dir: &Path) -> Option<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match parse_bool_flag(value) {
        Some(true) => Some(state_dir.join("deck.log")),
        Some(false) => None,
        None => Some(PathBuf::from(value)),
    }
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn which_cmd(name: &str) -> Option<String> {
    let path_var = std::env::var("PATH").ok()?;
    for part in path_var.split(':') {
        if part.is_empty() {
            continue;
        }
        let candidate = Path::new(part).join(name);
        if candidate.is_file() {
            return Some(candidate.to_string_lossy().to_string());
        }
    }
    None
}
