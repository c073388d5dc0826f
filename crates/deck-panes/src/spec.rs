use crate::remote::{
    local_attach_command, placeholder_command, remote_attach_command, Appearance,
};
use deck_core::{ComputerInfo, DocPreview, PaneKey, SessionInfo};

/// What one content pane should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneSpec {
    pub key: PaneKey,
    pub sticky: bool,
    pub command: String,
    pub agent: Option<String>,
    pub headless: bool,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    pub tmux_binary: String,
    pub ssh_binary: String,
    pub term: String,
    pub appearance: Appearance,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            tmux_binary: "tmux".to_string(),
            ssh_binary: "ssh".to_string(),
            term: "tmux-256color".to_string(),
            appearance: Appearance::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpecBuilder {
    config: SpawnConfig,
}

impl SpecBuilder {
    pub fn new(config: SpawnConfig) -> Self {
        Self { config }
    }

    pub fn session_spec(
        &self,
        session: &SessionInfo,
        computer: Option<&ComputerInfo>,
        sticky: bool,
    ) -> PaneSpec {
        let title = if session.title.trim().is_empty() {
            session.session_id.clone()
        } else {
            session.title.clone()
        };
        let command = match session.tmux_session() {
            None => placeholder_command(&format!("{title}: no terminal session to attach")),
            Some(tmux_session) => match computer
                .and_then(|info| info.ssh_target().map(|target| (info, target)))
            {
                Some((info, target)) => remote_attach_command(
                    &self.config.ssh_binary,
                    &target,
                    info.tmux_binary.as_deref().unwrap_or("tmux"),
                    tmux_session,
                    &self.config.term,
                    &self.config.appearance,
                ),
                None => {
                    local_attach_command(&self.config.tmux_binary, &self.config.term, tmux_session)
                }
            },
        };
        PaneSpec {
            key: PaneKey::Session(session.session_id.clone()),
            sticky,
            command,
            agent: session.active_agent.clone(),
            headless: session.is_headless(),
            title,
        }
    }

    pub fn doc_spec(&self, doc: &DocPreview, sticky: bool) -> PaneSpec {
        PaneSpec {
            key: PaneKey::Document(doc.doc_id.clone()),
            sticky,
            command: doc.command.clone(),
            agent: None,
            headless: false,
            title: if doc.title.is_empty() {
                doc.doc_id.clone()
            } else {
                doc.title.clone()
            },
        }
    }
}
