pub mod tree;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComputerStatus {
    #[default]
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComputerInfo {
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub tmux_binary: Option<String>,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub status: ComputerStatus,
}

impl ComputerInfo {
    /// Placeholder for a computer that sessions reference but the catalog
    /// did not list.
    pub fn offline(name: &str) -> Self {
        Self {
            name: name.to_string(),
            user: None,
            host: None,
            tmux_binary: None,
            is_local: false,
            status: ComputerStatus::Offline,
        }
    }

    pub fn is_remote(&self) -> bool {
        !self.is_local && self.host.as_deref().is_some_and(|host| !host.trim().is_empty())
    }

    pub fn ssh_target(&self) -> Option<String> {
        if !self.is_remote() {
            return None;
        }
        let host = self.host.as_deref()?.trim();
        match self.user.as_deref().map(str::trim) {
            Some(user) if !user.is_empty() => Some(format!("{user}@{host}")),
            _ => Some(host.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectInfo {
    pub computer: String,
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProjectInfo {
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.name.as_deref() {
            if !name.trim().is_empty() {
                return name;
            }
        }
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|tail| !tail.is_empty())
            .unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub title: String,
    pub computer: String,
    pub project_path: String,
    #[serde(default)]
    pub tmux_session_name: Option<String>,
    #[serde(default)]
    pub active_agent: Option<String>,
    #[serde(default)]
    pub initiator_session_id: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl SessionInfo {
    /// Headless sessions have no multiplexer session to attach to.
    pub fn is_headless(&self) -> bool {
        self.tmux_session().is_none()
    }

    pub fn tmux_session(&self) -> Option<&str> {
        self.tmux_session_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkStatus {
    #[default]
    Pending,
    Ready,
    InProgress,
    Done,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Ready => "ready",
            WorkStatus::InProgress => "in-progress",
            WorkStatus::Done => "done",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "pending" => Ok(WorkStatus::Pending),
            "ready" => Ok(WorkStatus::Ready),
            "in-progress" | "in_progress" | "inprogress" => Ok(WorkStatus::InProgress),
            "done" | "complete" | "completed" => Ok(WorkStatus::Done),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

impl Serialize for WorkStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub slug: String,
    #[serde(default)]
    pub computer: String,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: WorkStatus,
    #[serde(default)]
    pub after: Vec<String>,
    #[serde(default)]
    pub preview_command: Option<String>,
}

impl WorkItem {
    /// The document this item previews in a pane, if it has one.
    pub fn doc_preview(&self) -> Option<DocPreview> {
        let command = self.preview_command.as_deref()?.trim();
        if command.is_empty() {
            return None;
        }
        Some(DocPreview {
            doc_id: self.slug.clone(),
            title: self.title.clone().unwrap_or_else(|| self.slug.clone()),
            command: command.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocPreview {
    pub doc_id: String,
    #[serde(default)]
    pub title: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PaneKey {
    Session(String),
    Document(String),
}

impl PaneKey {
    pub fn id(&self) -> &str {
        match self {
            PaneKey::Session(id) | PaneKey::Document(id) => id,
        }
    }
}

impl fmt::Display for PaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaneKey::Session(id) => write!(f, "session:{id}"),
            PaneKey::Document(id) => write!(f, "doc:{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    #[serde(default)]
    pub computers: Vec<ComputerInfo>,
    #[serde(default)]
    pub projects: Vec<ProjectInfo>,
    #[serde(default)]
    pub sessions: Vec<SessionInfo>,
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
}

impl Catalog {
    pub fn from_json(input: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionInfo> {
        self.sessions
            .iter()
            .find(|session| session.session_id == session_id)
    }

    pub fn computer(&self, name: &str) -> Option<&ComputerInfo> {
        self.computers.iter().find(|computer| computer.name == name)
    }

    pub fn session_ids(&self) -> BTreeSet<String> {
        self.sessions
            .iter()
            .map(|session| session.session_id.clone())
            .collect()
    }

    pub fn doc_ids(&self) -> BTreeSet<String> {
        self.work_items
            .iter()
            .filter(|item| item.doc_preview().is_some())
            .map(|item| item.slug.clone())
            .collect()
    }
}
