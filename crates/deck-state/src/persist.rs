//! Namespaced UI-state snapshot on disk.
//!
//! Layout: `{"sessions": {..}, "preparation": {..}, "status_bar": {..}, "app": {..}}`.
//! Writes go through a temp file and a rename while holding an advisory
//! lock on a sibling `.lock` file.

use crate::{UiState, View, MAX_STICKY_PANES};
use deck_core::tree::session_node_id;
use deck_core::DocPreview;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const STATE_FILE_NAME: &str = "ui-state.json";

const NAMESPACES: [&str; 4] = ["sessions", "preparation", "status_bar", "app"];
const LEGACY_KEYS: [&str; 5] = [
    "sticky_sessions",
    "collapsed_sessions",
    "expanded_todos",
    "sticky_docs",
    "selected_session",
];

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionsNamespace {
    #[serde(default)]
    pub sticky_sessions: Vec<String>,
    #[serde(default)]
    pub collapsed: Vec<String>,
    #[serde(default)]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationNamespace {
    #[serde(default)]
    pub sticky_docs: Vec<DocPreview>,
    #[serde(default)]
    pub expanded: Vec<String>,
    #[serde(default)]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBarNamespace {
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl Default for StatusBarNamespace {
    fn default() -> Self {
        Self { visible: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppNamespace {
    #[serde(default)]
    pub view: View,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub sessions: SessionsNamespace,
    #[serde(default)]
    pub preparation: PreparationNamespace,
    #[serde(default)]
    pub status_bar: StatusBarNamespace,
    #[serde(default)]
    pub app: AppNamespace,
    /// Namespaces written by other versions, kept so a save does not drop them.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PersistedState {
    pub fn capture(state: &UiState) -> Self {
        Self {
            sessions: SessionsNamespace {
                sticky_sessions: state.sessions.sticky.clone(),
                collapsed: state.sessions.collapsed.iter().cloned().collect(),
                selected: state.sessions.selected.clone(),
            },
            preparation: PreparationNamespace {
                sticky_docs: state.preparation.sticky.clone(),
                expanded: state.preparation.expanded.iter().cloned().collect(),
                selected: state.preparation.selected.clone(),
            },
            status_bar: StatusBarNamespace {
                visible: state.app.status_bar_visible,
            },
            app: AppNamespace {
                view: state.app.view,
            },
            extra: BTreeMap::new(),
        }
    }

    /// Fold the snapshot into live state. Pinned entries beyond the sticky
    /// capacity are dropped, sessions first.
    pub fn merge_into(&self, state: &mut UiState) {
        for id in &self.sessions.sticky_sessions {
            if id.trim().is_empty() || state.is_sticky_session(id) || !state.can_pin() {
                continue;
            }
            state.sessions.sticky.push(id.clone());
        }
        for doc in &self.preparation.sticky_docs {
            if doc.doc_id.trim().is_empty()
                || state.is_sticky_doc(&doc.doc_id)
                || !state.can_pin()
            {
                continue;
            }
            state.preparation.sticky.push(doc.clone());
        }
        state
            .sessions
            .collapsed
            .extend(self.sessions.collapsed.iter().cloned());
        state
            .preparation
            .expanded
            .extend(self.preparation.expanded.iter().cloned());
        if state.sessions.selected.is_none() {
            state.sessions.selected = self.sessions.selected.clone();
        }
        if state.preparation.selected.is_none() {
            state.preparation.selected = self.preparation.selected.clone();
        }
        state.app.view = self.app.view;
        state.app.status_bar_visible = self.status_bar.visible;
        debug_assert!(state.sticky_count() <= MAX_STICKY_PANES);
    }

    /// Decode a payload in either the namespaced or the legacy flat shape.
    pub fn from_value(value: Value) -> Result<Self, StateStoreError> {
        let Value::Object(map) = value else {
            return Err(StateStoreError::Serialization(
                "ui state root is not an object".to_string(),
            ));
        };
        if is_legacy(&map) {
            info!(event = "ui_state_legacy_migrated");
            return Ok(migrate_legacy(&map));
        }

        let mut state = PersistedState {
            sessions: namespace(&map, "sessions"),
            preparation: namespace(&map, "preparation"),
            status_bar: namespace(&map, "status_bar"),
            app: namespace(&map, "app"),
            extra: BTreeMap::new(),
        };
        for key in map.keys() {
            if !NAMESPACES.contains(&key.as_str()) {
                state
                    .extra
                    .insert(key.clone(), Value::Object(Map::new()));
            }
        }
        Ok(state)
    }
}

fn default_true() -> bool {
    true
}

fn namespace<T: DeserializeOwned + Default>(map: &Map<String, Value>, key: &str) -> T {
    let Some(value) = map.get(key) else {
        return T::default();
    };
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(event = "ui_state_namespace_invalid", namespace = key, error = %err);
            T::default()
        }
    }
}

fn is_legacy(map: &Map<String, Value>) -> bool {
    let has_namespace = NAMESPACES.iter().any(|key| map.contains_key(*key));
    let has_legacy = LEGACY_KEYS.iter().any(|key| map.contains_key(*key));
    !has_namespace && has_legacy
}

fn migrate_legacy(map: &Map<String, Value>) -> PersistedState {
    let sticky_sessions = string_list(map.get("sticky_sessions"), "session_id");
    let collapsed = string_list(map.get("collapsed_sessions"), "session_id")
        .iter()
        .map(|id| session_node_id(id))
        .collect();
    let expanded = string_list(map.get("expanded_todos"), "slug");
    let sticky_docs = map
        .get("sticky_docs")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<DocPreview>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    let selected = map
        .get("selected_session")
        .and_then(Value::as_str)
        .map(str::to_string);
    PersistedState {
        sessions: SessionsNamespace {
            sticky_sessions,
            collapsed,
            selected,
        },
        preparation: PreparationNamespace {
            sticky_docs,
            expanded,
            selected: None,
        },
        status_bar: StatusBarNamespace::default(),
        app: AppNamespace::default(),
        extra: BTreeMap::new(),
    }
}

/// Accepts `["a", "b"]` as well as `[{"<field>": "a"}, ...]`.
fn string_list(value: Option<&Value>, field: &str) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Object(fields) => fields.get(field).and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect()
}

struct StateFileLock {
    file: File,
}

impl StateFileLock {
    fn acquire(path: &Path, exclusive: bool) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(Self { file })
    }
}

impl Drop for StateFileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(STATE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    pub fn load(&self) -> Result<PersistedState, StateStoreError> {
        let _lock = StateFileLock::acquire(&self.lock_path(), false)?;
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedState::default());
            }
            Err(err) => return Err(err.into()),
        };
        if content.trim().is_empty() {
            return Ok(PersistedState::default());
        }
        let value: Value = serde_json::from_str(&content)
            .map_err(|err| StateStoreError::Serialization(err.to_string()))?;
        PersistedState::from_value(value)
    }

    pub fn save(&self, state: &PersistedState) -> Result<(), StateStoreError> {
        let payload = serde_json::to_string_pretty(state)
            .map_err(|err| StateStoreError::Serialization(err.to_string()))?;
        let _lock = StateFileLock::acquire(&self.lock_path(), true)?;
        let temp_path = sibling(&self.path, "tmp");
        std::fs::write(&temp_path, payload)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.{suffix}", name.to_string_lossy())),
        None => path.with_extension(suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reduce, Intent};
    use serde_json::json;

    fn doc(id: &str) -> DocPreview {
        DocPreview {
            doc_id: id.to_string(),
            title: id.to_string(),
            command: format!("less {id}.md"),
        }
    }

    #[test]
    fn save_then_load_restores_durable_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path());
        let mut state = UiState::default();
        reduce(
            &mut state,
            Intent::ToggleStickySession {
                session_id: "s1".to_string(),
            },
        );
        reduce(&mut state, Intent::ToggleStickyDoc { doc: doc("plan") });
        reduce(&mut state, Intent::ToggleStatusBar);
        reduce(
            &mut state,
            Intent::SetView {
                view: View::Preparation,
            },
        );
        store
            .save(&PersistedState::capture(&state))
            .expect("save");
        assert!(!sibling(store.path(), "tmp").exists());

        let mut restored = UiState::default();
        store.load().expect("load").merge_into(&mut restored);
        assert_eq!(restored.sessions.sticky, vec!["s1".to_string()]);
        assert_eq!(restored.preparation.sticky, vec![doc("plan")]);
        assert!(!restored.app.status_bar_visible);
        assert_eq!(restored.app.view, View::Preparation);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(&dir.path().join("nested"));
        assert_eq!(store.load().expect("load"), PersistedState::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path());
        std::fs::write(store.path(), "{not json").expect("write");
        assert!(matches!(
            store.load(),
            Err(StateStoreError::Serialization(_))
        ));
    }

    #[test]
    fn unknown_namespaces_are_kept_empty() {
        let parsed = PersistedState::from_value(json!({
            "sessions": {"sticky_sessions": ["a"]},
            "future_panel": {"width": 40}
        }))
        .expect("parse");
        assert_eq!(parsed.sessions.sticky_sessions, vec!["a".to_string()]);
        assert_eq!(parsed.extra.get("future_panel"), Some(&json!({})));
        let written = serde_json::to_value(&parsed).expect("encode");
        assert_eq!(written["future_panel"], json!({}));
    }

    #[test]
    fn invalid_namespace_falls_back_to_default() {
        let parsed = PersistedState::from_value(json!({
            "sessions": 5,
            "app": {"view": "preparation"}
        }))
        .expect("parse");
        assert_eq!(parsed.sessions, SessionsNamespace::default());
        assert_eq!(parsed.app.view, View::Preparation);
    }

    #[test]
    fn legacy_flat_payload_is_migrated() {
        let parsed = PersistedState::from_value(json!({
            "sticky_sessions": [{"session_id": "s1"}, "s2"],
            "collapsed_sessions": ["s3"],
            "expanded_todos": ["auth"],
            "sticky_docs": [{"doc_id": "auth", "title": "Auth", "command": "glow auth.md"}],
            "selected_session": "s2"
        }))
        .expect("parse");
        assert_eq!(
            parsed.sessions.sticky_sessions,
            vec!["s1".to_string(), "s2".to_string()]
        );
        assert_eq!(parsed.sessions.collapsed, vec![session_node_id("s3")]);
        assert_eq!(parsed.preparation.expanded, vec!["auth".to_string()]);
        assert_eq!(parsed.preparation.sticky_docs.len(), 1);
        assert_eq!(parsed.sessions.selected.as_deref(), Some("s2"));
    }

    #[test]
    fn merge_respects_capacity() {
        let persisted = PersistedState {
            sessions: SessionsNamespace {
                sticky_sessions: (1..=4).map(|n| format!("s{n}")).collect(),
                ..Default::default()
            },
            preparation: PreparationNamespace {
                sticky_docs: vec![doc("a"), doc("b")],
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = UiState::default();
        persisted.merge_into(&mut state);
        assert_eq!(state.sticky_count(), MAX_STICKY_PANES);
        assert_eq!(state.preparation.sticky, vec![doc("a")]);
    }
}
