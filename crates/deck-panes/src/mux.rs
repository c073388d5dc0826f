//! Narrow command surface over the host multiplexer.
//!
//! Every call is synchronous and returns textual output. A missing binary,
//! a vanished pane or a non-zero exit all read as "no effect" (`None` or
//! `false`), never as an error.

use crate::style::PaneStyle;
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    /// Side by side (`split-window -h`).
    Horizontal,
    /// Stacked (`split-window -v`).
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRequest {
    pub target: String,
    pub direction: SplitDirection,
    /// Size of the new pane as a percentage of the target.
    pub size_pct: u16,
    pub command: String,
}

pub trait Multiplexer {
    fn create_session(&self, name: &str, command: Option<&str>) -> bool;
    /// Returns the id of the created pane.
    fn split_window(&self, request: &SplitRequest) -> Option<String>;
    fn kill_pane(&self, pane_id: &str) -> bool;
    /// Replace whatever runs in the pane without destroying it.
    fn respawn_pane(&self, pane_id: &str, command: &str) -> bool;
    fn select_pane(&self, pane_id: &str) -> bool;
    fn set_pane_style(&self, pane_id: &str, style: &PaneStyle) -> bool;
    fn set_status_bar(&self, target: &str, visible: bool) -> bool;
    fn current_pane_id(&self) -> Option<String>;
    fn list_panes(&self) -> Vec<String>;
    fn pane_tty(&self, pane_id: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct TmuxCli {
    binary: String,
    own_pane: Option<String>,
}

impl TmuxCli {
    /// `own_pane` is the dashboard's pane id as exported by the host
    /// (`TMUX_PANE`); without it the client's active pane is used.
    pub fn new(binary: impl Into<String>, own_pane: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            own_pane: own_pane.filter(|pane| !pane.trim().is_empty()),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn run(&self, args: &[&str]) -> Option<String> {
        let output = match Command::new(&self.binary).args(args).output() {
            Ok(output) => output,
            Err(err) => {
                debug!(event = "tmux_unavailable", binary = %self.binary, error = %err);
                return None;
            }
        };
        if !output.status.success() {
            debug!(
                event = "tmux_command_failed",
                command = args.first().copied().unwrap_or_default(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_ok(&self, args: &[&str]) -> bool {
        self.run(args).is_some()
    }
}

impl Multiplexer for TmuxCli {
    fn create_session(&self, name: &str, command: Option<&str>) -> bool {
        let mut args = vec!["new-session", "-d", "-s", name];
        if let Some(command) = command {
            args.push(command);
        }
        self.run_ok(&args)
    }

    fn split_window(&self, request: &SplitRequest) -> Option<String> {
        let direction = match request.direction {
            SplitDirection::Horizontal => "-h",
            SplitDirection::Vertical => "-v",
        };
        let size = format!("{}%", request.size_pct.clamp(1, 99));
        let output = self.run(&[
            "split-window",
            "-d",
            "-P",
            "-F",
            "#{pane_id}",
            "-t",
            &request.target,
            direction,
            "-l",
            &size,
            &request.command,
        ])?;
        first_line(&output)
    }

    fn kill_pane(&self, pane_id: &str) -> bool {
        self.run_ok(&["kill-pane", "-t", pane_id])
    }

    fn respawn_pane(&self, pane_id: &str, command: &str) -> bool {
        self.run_ok(&["respawn-pane", "-k", "-t", pane_id, command])
    }

    fn select_pane(&self, pane_id: &str) -> bool {
        self.run_ok(&["select-pane", "-t", pane_id])
    }

    fn set_pane_style(&self, pane_id: &str, style: &PaneStyle) -> bool {
        let window = self.run_ok(&[
            "set-option",
            "-p",
            "-t",
            pane_id,
            "window-style",
            &style.window,
        ]);
        let active = self.run_ok(&[
            "set-option",
            "-p",
            "-t",
            pane_id,
            "window-active-style",
            &style.active,
        ]);
        window && active
    }

    fn set_status_bar(&self, target: &str, visible: bool) -> bool {
        let value = if visible { "on" } else { "off" };
        self.run_ok(&["set-option", "-t", target, "status", value])
    }

    fn current_pane_id(&self) -> Option<String> {
        let output = match &self.own_pane {
            Some(pane) => self.run(&["display-message", "-p", "-t", pane, "#{pane_id}"])?,
            None => self.run(&["display-message", "-p", "#{pane_id}"])?,
        };
        first_line(&output)
    }

    fn list_panes(&self) -> Vec<String> {
        let output = match &self.own_pane {
            Some(pane) => self.run(&["list-panes", "-t", pane, "-F", "#{pane_id}"]),
            None => self.run(&["list-panes", "-F", "#{pane_id}"]),
        };
        output
            .map(|text| {
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn pane_tty(&self, pane_id: &str) -> Option<String> {
        let output = self.run(&["display-message", "-p", "-t", pane_id, "#{pane_tty}"])?;
        first_line(&output)
    }
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
