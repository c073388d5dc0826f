//! Hierarchical display trees built from the flat catalog.
//!
//! Both builders share one parent-resolution pass: candidates are tried in
//! order and accepted only when walking the candidate's ancestor chain never
//! reaches the child. The resulting parent graph is always a forest, so every
//! input appears exactly once and malformed links degrade to root placement.

use crate::{ComputerInfo, ProjectInfo, SessionInfo, WorkItem};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Computer {
        info: ComputerInfo,
        backfilled: bool,
    },
    Project {
        info: ProjectInfo,
        backfilled: bool,
    },
    Session {
        info: SessionInfo,
        display_index: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: String,
    pub depth: usize,
    pub kind: NodeKind,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn session(&self) -> Option<&SessionInfo> {
        match &self.kind {
            NodeKind::Session { info, .. } => Some(info),
            _ => None,
        }
    }

    /// Depth-first search for a node by id.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// One visible row of the flattened session tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: String,
    pub depth: usize,
    pub is_last: bool,
    pub ancestors_continue: Vec<bool>,
    pub has_children: bool,
    pub kind: NodeKind,
}

impl SessionRow {
    pub fn session_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Session { info, .. } => Some(info.session_id.as_str()),
            _ => None,
        }
    }

    pub fn connector_prefix(&self) -> String {
        connector_prefix(self.depth, self.is_last, &self.ancestors_continue)
    }
}

/// One row of the work-item dependency forest, in preorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRow {
    pub item: WorkItem,
    pub parent: Option<String>,
    pub depth: usize,
    pub is_last: bool,
    /// Bit `k` is set when the ancestor at depth `k` has a following sibling.
    pub ancestors_continue: Vec<bool>,
}

impl DependencyRow {
    pub fn connector_prefix(&self) -> String {
        connector_prefix(self.depth, self.is_last, &self.ancestors_continue)
    }
}

pub fn session_node_id(session_id: &str) -> String {
    format!("session:{session_id}")
}

pub fn project_node_id(computer: &str, path: &str) -> String {
    format!("project:{computer}:{path}")
}

pub fn computer_node_id(name: &str) -> String {
    format!("computer:{name}")
}

pub fn build_session_tree(
    computers: &[ComputerInfo],
    projects: &[ProjectInfo],
    sessions: &[SessionInfo],
) -> Vec<TreeNode> {
    let mut computer_order: Vec<(ComputerInfo, bool)> = Vec::new();
    let mut seen_computers = HashSet::new();
    for computer in computers {
        if seen_computers.insert(computer.name.clone()) {
            computer_order.push((computer.clone(), false));
        }
    }

    let mut seen_sessions = HashSet::new();
    let sessions: Vec<&SessionInfo> = sessions
        .iter()
        .filter(|session| seen_sessions.insert(session.session_id.clone()))
        .collect();

    for session in &sessions {
        if seen_computers.insert(session.computer.clone()) {
            computer_order.push((ComputerInfo::offline(&session.computer), true));
        }
    }

    let mut project_order: Vec<(ProjectInfo, bool)> = Vec::new();
    let mut seen_projects = HashSet::new();
    for project in projects {
        if seen_projects.insert((project.computer.clone(), project.path.clone())) {
            project_order.push((project.clone(), false));
        }
    }
    for session in &sessions {
        let key = (session.computer.clone(), session.project_path.clone());
        if seen_projects.insert(key) {
            project_order.push((
                ProjectInfo {
                    computer: session.computer.clone(),
                    path: session.project_path.clone(),
                    name: None,
                },
                true,
            ));
        }
    }

    computer_order
        .into_iter()
        .map(|(computer, backfilled)| {
            let children = project_order
                .iter()
                .filter(|(project, _)| project.computer == computer.name)
                .map(|(project, project_backfilled)| {
                    let members: Vec<&SessionInfo> = sessions
                        .iter()
                        .copied()
                        .filter(|session| {
                            session.computer == project.computer
                                && session.project_path == project.path
                        })
                        .collect();
                    TreeNode {
                        id: project_node_id(&project.computer, &project.path),
                        depth: 1,
                        kind: NodeKind::Project {
                            info: project.clone(),
                            backfilled: *project_backfilled,
                        },
                        children: build_session_nodes(&members, 2),
                    }
                })
                .collect();
            TreeNode {
                id: computer_node_id(&computer.name),
                depth: 0,
                kind: NodeKind::Computer {
                    info: computer,
                    backfilled,
                },
                children,
            }
        })
        .collect()
}

fn build_session_nodes(sessions: &[&SessionInfo], base_depth: usize) -> Vec<TreeNode> {
    let index: HashMap<&str, usize> = sessions
        .iter()
        .enumerate()
        .map(|(idx, session)| (session.session_id.as_str(), idx))
        .collect();
    let candidates: Vec<Vec<usize>> = sessions
        .iter()
        .map(|session| {
            session
                .initiator_session_id
                .as_deref()
                .and_then(|initiator| index.get(initiator).copied())
                .into_iter()
                .collect()
        })
        .collect();
    let parents = resolve_parents(&candidates);
    let (roots, children) = child_lists(&parents);

    fn build(
        idx: usize,
        depth: usize,
        display_index: String,
        sessions: &[&SessionInfo],
        children: &[Vec<usize>],
    ) -> TreeNode {
        let session = sessions[idx];
        let nested = children[idx]
            .iter()
            .enumerate()
            .map(|(pos, &child)| {
                build(
                    child,
                    depth + 1,
                    format!("{display_index}.{}", pos + 1),
                    sessions,
                    children,
                )
            })
            .collect();
        TreeNode {
            id: session_node_id(&session.session_id),
            depth,
            kind: NodeKind::Session {
                info: session.clone(),
                display_index,
            },
            children: nested,
        }
    }

    roots
        .iter()
        .enumerate()
        .map(|(pos, &root)| build(root, base_depth, (pos + 1).to_string(), sessions, &children))
        .collect()
}

pub fn build_dependency_tree(items: &[WorkItem]) -> Vec<DependencyRow> {
    let mut visited = HashSet::new();
    let items: Vec<&WorkItem> = items
        .iter()
        .filter(|item| visited.insert(item.slug.as_str()))
        .collect();
    let index: HashMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| (item.slug.as_str(), idx))
        .collect();
    let candidates: Vec<Vec<usize>> = items
        .iter()
        .map(|item| {
            item.after
                .iter()
                .filter_map(|slug| index.get(slug.as_str()).copied())
                .collect()
        })
        .collect();
    let parents = resolve_parents(&candidates);
    let (roots, children) = child_lists(&parents);

    let mut rows = Vec::with_capacity(items.len());
    let mut trail = Vec::new();
    for (pos, &root) in roots.iter().enumerate() {
        push_dependency_rows(
            root,
            0,
            pos + 1 == roots.len(),
            &items,
            &parents,
            &children,
            &mut trail,
            &mut rows,
        );
    }
    rows
}

#[allow(clippy::too_many_arguments)]
fn push_dependency_rows(
    idx: usize,
    depth: usize,
    is_last: bool,
    items: &[&WorkItem],
    parents: &[Option<usize>],
    children: &[Vec<usize>],
    trail: &mut Vec<bool>,
    rows: &mut Vec<DependencyRow>,
) {
    rows.push(DependencyRow {
        item: items[idx].clone(),
        parent: parents[idx].map(|parent| items[parent].slug.clone()),
        depth,
        is_last,
        ancestors_continue: trail.clone(),
    });
    trail.push(!is_last);
    let kids = &children[idx];
    for (pos, &child) in kids.iter().enumerate() {
        push_dependency_rows(
            child,
            depth + 1,
            pos + 1 == kids.len(),
            items,
            parents,
            children,
            trail,
            rows,
        );
    }
    trail.pop();
}

/// Flatten the session forest into visible rows. Descendants of collapsed
/// node ids are skipped; connector bits are computed here, once per rebuild.
pub fn flatten_session_tree(forest: &[TreeNode], collapsed: &BTreeSet<String>) -> Vec<SessionRow> {
    let mut rows = Vec::new();
    let mut trail = Vec::new();
    for (pos, node) in forest.iter().enumerate() {
        flatten_node(node, pos + 1 == forest.len(), collapsed, &mut trail, &mut rows);
    }
    rows
}

fn flatten_node(
    node: &TreeNode,
    is_last: bool,
    collapsed: &BTreeSet<String>,
    trail: &mut Vec<bool>,
    rows: &mut Vec<SessionRow>,
) {
    rows.push(SessionRow {
        id: node.id.clone(),
        depth: node.depth,
        is_last,
        ancestors_continue: trail.clone(),
        has_children: !node.children.is_empty(),
        kind: node.kind.clone(),
    });
    if collapsed.contains(&node.id) {
        return;
    }
    trail.push(!is_last);
    for (pos, child) in node.children.iter().enumerate() {
        flatten_node(child, pos + 1 == node.children.len(), collapsed, trail, rows);
    }
    trail.pop();
}

fn connector_prefix(depth: usize, is_last: bool, ancestors_continue: &[bool]) -> String {
    if depth == 0 {
        return String::new();
    }
    let mut prefix = String::new();
    for continues in ancestors_continue.iter().skip(1) {
        prefix.push_str(if *continues { "│ " } else { "  " });
    }
    prefix.push_str(if is_last { "└ " } else { "├ " });
    prefix
}

fn resolve_parents(candidates: &[Vec<usize>]) -> Vec<Option<usize>> {
    let mut parents: Vec<Option<usize>> = vec![None; candidates.len()];
    for (idx, options) in candidates.iter().enumerate() {
        for &candidate in options {
            if candidate == idx {
                continue;
            }
            if !is_ancestor_or_self(&parents, candidate, idx) {
                parents[idx] = Some(candidate);
                break;
            }
        }
    }
    parents
}

/// Walks up from `start`; true when `target` sits on the chain. The walk is
/// bounded by the node count so malformed state cannot loop forever.
fn is_ancestor_or_self(parents: &[Option<usize>], start: usize, target: usize) -> bool {
    let mut cursor = Some(start);
    let mut steps = 0;
    while let Some(node) = cursor {
        if node == target {
            return true;
        }
        steps += 1;
        if steps > parents.len() {
            return true;
        }
        cursor = parents[node];
    }
    false
}

fn child_lists(parents: &[Option<usize>]) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut roots = Vec::new();
    let mut children = vec![Vec::new(); parents.len()];
    for (idx, parent) in parents.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(idx),
            None => roots.push(idx),
        }
    }
    (roots, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkStatus;

    fn item(slug: &str, after: &[&str]) -> WorkItem {
        WorkItem {
            slug: slug.to_string(),
            computer: "local".to_string(),
            project_path: "/repo".to_string(),
            title: None,
            status: WorkStatus::Pending,
            after: after.iter().map(|value| value.to_string()).collect(),
            preview_command: None,
        }
    }

    fn session(id: &str, computer: &str, project: &str, initiator: Option<&str>) -> SessionInfo {
        SessionInfo {
            session_id: id.to_string(),
            title: id.to_string(),
            computer: computer.to_string(),
            project_path: project.to_string(),
            tmux_session_name: Some(format!("tc_{id}")),
            active_agent: Some("claude".to_string()),
            initiator_session_id: initiator.map(str::to_string),
            status: "active".to_string(),
        }
    }

    fn slugs(rows: &[DependencyRow]) -> Vec<(&str, usize)> {
        rows.iter()
            .map(|row| (row.item.slug.as_str(), row.depth))
            .collect()
    }

    #[test]
    fn dependency_parent_is_first_known_after_entry() {
        let rows = build_dependency_tree(&[
            item("a", &[]),
            item("b", &["missing", "a"]),
            item("c", &["b", "a"]),
        ]);
        assert_eq!(slugs(&rows), vec![("a", 0), ("b", 1), ("c", 2)]);
        assert_eq!(rows[2].parent.as_deref(), Some("b"));
    }

    #[test]
    fn dependency_cycle_terminates_with_every_item_once() {
        let rows = build_dependency_tree(&[
            item("a", &["c"]),
            item("b", &["a"]),
            item("c", &["b"]),
        ]);
        let mut seen: Vec<&str> = rows.iter().map(|row| row.item.slug.as_str()).collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(rows.iter().filter(|row| row.parent.is_none()).count(), 1);
    }

    #[test]
    fn dependency_self_reference_becomes_root() {
        let rows = build_dependency_tree(&[item("a", &["a"]), item("b", &["b", "a"])]);
        assert_eq!(slugs(&rows), vec![("a", 0), ("b", 1)]);
    }

    #[test]
    fn dependency_cycle_falls_through_to_next_candidate() {
        let rows = build_dependency_tree(&[
            item("root", &[]),
            item("a", &["b", "root"]),
            item("b", &["a", "root"]),
        ]);
        let b = rows.iter().find(|row| row.item.slug == "b").expect("b");
        assert_eq!(b.parent.as_deref(), Some("root"));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn dependency_duplicates_are_deduplicated() {
        let rows = build_dependency_tree(&[item("a", &[]), item("a", &[]), item("b", &["a"])]);
        assert_eq!(slugs(&rows), vec![("a", 0), ("b", 1)]);
    }

    #[test]
    fn dependency_sibling_order_follows_input() {
        let rows = build_dependency_tree(&[
            item("base", &[]),
            item("z", &["base"]),
            item("m", &["base"]),
            item("a", &["base"]),
        ]);
        assert_eq!(
            slugs(&rows),
            vec![("base", 0), ("z", 1), ("m", 1), ("a", 1)]
        );
        assert!(!rows[1].is_last);
        assert!(rows[3].is_last);
    }

    #[test]
    fn dependency_continuation_bits_track_ancestor_siblings() {
        let rows = build_dependency_tree(&[
            item("a", &[]),
            item("a1", &["a"]),
            item("a1x", &["a1"]),
            item("a2", &["a"]),
            item("b", &[]),
        ]);
        let a1x = rows.iter().find(|row| row.item.slug == "a1x").expect("a1x");
        assert_eq!(a1x.ancestors_continue, vec![true, true]);
        assert_eq!(a1x.connector_prefix(), "│ └ ");
        let a2 = rows.iter().find(|row| row.item.slug == "a2").expect("a2");
        assert_eq!(a2.ancestors_continue, vec![true]);
        assert!(a2.is_last);
    }

    #[test]
    fn session_tree_nests_initiated_sessions() {
        let computers = vec![ComputerInfo {
            name: "mac".to_string(),
            user: None,
            host: None,
            tmux_binary: None,
            is_local: true,
            status: Default::default(),
        }];
        let sessions = vec![
            session("s1", "mac", "/p", None),
            session("s2", "mac", "/p", Some("s1")),
            session("s3", "mac", "/p", None),
        ];
        let forest = build_session_tree(&computers, &[], &sessions);
        assert_eq!(forest.len(), 1);
        let project = &forest[0].children[0];
        assert_eq!(project.children.len(), 2);
        let s1 = &project.children[0];
        let s2 = &s1.children[0];
        assert_eq!(s2.depth, s1.depth + 1);
        assert!(matches!(
            &s2.kind,
            NodeKind::Session { display_index, .. } if display_index == "1.1"
        ));
        assert!(matches!(
            &project.children[1].kind,
            NodeKind::Session { display_index, .. } if display_index == "2"
        ));
    }

    #[test]
    fn session_tree_backfills_unknown_computer() {
        let sessions = vec![session("s1", "ghost", "/p", Some("nobody"))];
        let forest = build_session_tree(&[], &[], &sessions);
        assert_eq!(forest.len(), 1);
        assert!(matches!(
            &forest[0].kind,
            NodeKind::Computer { backfilled: true, info } if info.status == crate::ComputerStatus::Offline
        ));
        let project = &forest[0].children[0];
        assert_eq!(project.children.len(), 1);
        assert!(project.children[0].children.is_empty());
    }

    #[test]
    fn session_tree_breaks_initiator_cycles() {
        let sessions = vec![
            session("a", "mac", "/p", Some("b")),
            session("b", "mac", "/p", Some("a")),
        ];
        let forest = build_session_tree(&[], &[], &sessions);
        let rows = flatten_session_tree(&forest, &BTreeSet::new());
        let ids: Vec<&str> = rows.iter().filter_map(|row| row.session_id()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a") && ids.contains(&"b"));
    }

    #[test]
    fn flatten_hides_collapsed_descendants() {
        let sessions = vec![
            session("s1", "mac", "/p", None),
            session("s2", "mac", "/p", Some("s1")),
        ];
        let forest = build_session_tree(&[], &[], &sessions);
        let all = flatten_session_tree(&forest, &BTreeSet::new());
        assert_eq!(all.len(), 4);
        let collapsed: BTreeSet<String> = [session_node_id("s1")].into_iter().collect();
        let rows = flatten_session_tree(&forest, &collapsed);
        assert_eq!(rows.len(), 3);
        assert!(rows[2].has_children);
    }
}
