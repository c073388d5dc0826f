//! Spawn-command composition for attach panes, local and over SSH.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppearanceMode {
    #[default]
    Dark,
    Light,
}

impl AppearanceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AppearanceMode::Dark => "dark",
            AppearanceMode::Light => "light",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(AppearanceMode::Dark),
            "light" => Some(AppearanceMode::Light),
            _ => None,
        }
    }
}

impl fmt::Display for AppearanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local terminal appearance forwarded to remote attach sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Appearance {
    pub mode: AppearanceMode,
    pub background: Option<String>,
}

impl Appearance {
    fn env_assignments(&self) -> Vec<String> {
        let mut vars = vec![format!("DECK_APPEARANCE={}", self.mode)];
        if let Some(background) = self.background.as_deref() {
            if !background.trim().is_empty() {
                vars.push(format!("DECK_BG={}", shell_quote(background.trim())));
            }
        }
        vars
    }
}

pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./:@%+=,".contains(ch))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// `<tmux> set-option status off ; attach-session`, so the nested session
/// does not draw a second status bar.
fn attach_chain(tmux: &str, session: &str) -> String {
    let tmux = shell_quote(tmux);
    let session = shell_quote(session);
    format!("{tmux} set-option -t {session} status off \\; attach-session -t {session}")
}

pub fn local_attach_command(tmux: &str, term: &str, session: &str) -> String {
    format!(
        "env -u TMUX TERM={} {}",
        shell_quote(term),
        attach_chain(tmux, session)
    )
}

pub fn remote_attach_command(
    ssh: &str,
    target: &str,
    remote_tmux: &str,
    session: &str,
    term: &str,
    appearance: &Appearance,
) -> String {
    let mut remote = vec!["env".to_string()];
    remote.extend(appearance.env_assignments());
    remote.push(format!("TERM={}", shell_quote(term)));
    remote.push(attach_chain(remote_tmux, session));
    format!(
        "{} -t {} {}",
        shell_quote(ssh),
        shell_quote(target),
        shell_quote(&remote.join(" "))
    )
}

/// Keeps a pane alive with a notice for sessions that cannot be attached.
pub fn placeholder_command(message: &str) -> String {
    format!(
        "printf '%s\\n' {}; exec tail -f /dev/null",
        shell_quote(message)
    )
}
