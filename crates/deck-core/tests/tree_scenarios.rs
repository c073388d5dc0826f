use deck_core::tree::{build_dependency_tree, build_session_tree, flatten_session_tree, NodeKind};
use deck_core::Catalog;
use std::collections::BTreeSet;

const CATALOG: &str = r#"{
  "computers": [
    {"name": "workstation", "is_local": true},
    {"name": "gpu-box", "user": "ops", "host": "10.1.2.3"}
  ],
  "projects": [
    {"computer": "workstation", "path": "/src/deck"},
    {"computer": "gpu-box", "path": "/srv/train", "name": "training"}
  ],
  "sessions": [
    {"session_id": "s1", "computer": "workstation", "project_path": "/src/deck", "tmux_session_name": "tc_s1"},
    {"session_id": "s2", "computer": "workstation", "project_path": "/src/deck", "tmux_session_name": "tc_s2", "initiator_session_id": "s1"},
    {"session_id": "s3", "computer": "workstation", "project_path": "/src/deck"},
    {"session_id": "s4", "computer": "laptop", "project_path": "/tmp/scratch", "tmux_session_name": "tc_s4"}
  ],
  "work_items": [
    {"slug": "schema", "status": "done"},
    {"slug": "api", "after": ["schema"]},
    {"slug": "ui", "after": ["api", "schema"], "status": "ready"},
    {"slug": "loop-a", "after": ["loop-b"]},
    {"slug": "loop-b", "after": ["loop-a"]}
  ]
}"#;

fn display_index(kind: &NodeKind) -> Option<&str> {
    match kind {
        NodeKind::Session { display_index, .. } => Some(display_index.as_str()),
        _ => None,
    }
}

#[test]
fn delegated_session_nests_under_initiator() {
    let catalog = Catalog::from_json(CATALOG).expect("catalog");
    let forest = build_session_tree(&catalog.computers, &catalog.projects, &catalog.sessions);
    let rows = flatten_session_tree(&forest, &BTreeSet::new());

    let s1 = rows.iter().find(|row| row.session_id() == Some("s1")).expect("s1");
    let s2 = rows.iter().find(|row| row.session_id() == Some("s2")).expect("s2");
    let s3 = rows.iter().find(|row| row.session_id() == Some("s3")).expect("s3");
    assert_eq!(s2.depth, s1.depth + 1);
    assert_eq!(display_index(&s2.kind), Some("1.1"));
    assert_eq!(s3.depth, s1.depth);
    assert_eq!(display_index(&s3.kind), Some("2"));
}

#[test]
fn sessions_on_unlisted_computers_still_render() {
    let catalog = Catalog::from_json(CATALOG).expect("catalog");
    let forest = build_session_tree(&catalog.computers, &catalog.projects, &catalog.sessions);
    let names: Vec<&str> = forest
        .iter()
        .filter_map(|node| match &node.kind {
            NodeKind::Computer { info, .. } => Some(info.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["workstation", "gpu-box", "laptop"]);
    let laptop = &forest[2];
    assert!(laptop.find("session:s4").is_some());
    // gpu-box keeps its empty project
    assert_eq!(forest[1].children.len(), 1);
}

#[test]
fn work_items_form_cycle_safe_forest() {
    let catalog = Catalog::from_json(CATALOG).expect("catalog");
    let rows = build_dependency_tree(&catalog.work_items);
    let order: Vec<(&str, usize)> = rows
        .iter()
        .map(|row| (row.item.slug.as_str(), row.depth))
        .collect();
    assert_eq!(
        order,
        vec![
            ("schema", 0),
            ("api", 1),
            ("ui", 2),
            ("loop-b", 0),
            ("loop-a", 1),
        ]
    );
}
