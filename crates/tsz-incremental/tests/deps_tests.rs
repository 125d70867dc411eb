use super::*;

fn p(path: &str) -> PathBuf {
    PathBuf::from(path)
}

fn manager() -> DependencyManager {
    DependencyManager::new(PathCase::Sensitive)
}

#[test]
fn test_clear_dependencies_drops_stale_edges() {
    let mut deps = manager();
    deps.add_dependency(&p("/a.ts"), &p("/b.ts"));
    deps.add_type_reference(&p("/a.ts"), &p("/node.d.ts"));
    assert_eq!(deps.dependencies(&p("/a.ts")).len(), 2);

    deps.clear_dependencies(&p("/a.ts"));
    assert!(deps.dependencies(&p("/a.ts")).is_empty());
}

#[test]
fn test_clear_dependencies_drops_memoized_resolutions() {
    let mut deps = manager();
    deps.add_module_resolution(&p("/a.ts"), "./b", ResolvedModule::new("/b/index.ts"));
    deps.add_type_reference_resolution(&p("/a.ts"), "node", ResolvedTypeReference::new("/node.d.ts"));
    deps.add_module_resolution(&p("/c.ts"), "./b", ResolvedModule::new("/b/index.ts"));

    deps.clear_dependencies(&p("/a.ts"));
    assert!(deps.module_resolution(&p("/a.ts"), "./b").is_none());
    assert!(deps.type_reference_resolution(&p("/a.ts"), "node").is_none());
    assert!(deps.module_resolution(&p("/c.ts"), "./b").is_some());
}

#[test]
fn test_duplicate_edges_are_kept_but_chain_dedups() {
    let mut deps = manager();
    deps.add_dependency(&p("/a.ts"), &p("/b.ts"));
    deps.add_dependency(&p("/a.ts"), &p("/b.ts"));
    deps.add_dependency(&p("/b.ts"), &p("/c.ts"));
    assert_eq!(deps.dependencies(&p("/a.ts")).len(), 2);

    let mut sink: Vec<PathBuf> = Vec::new();
    deps.apply_chain(&p("/a.ts"), &mut sink);
    assert_eq!(sink, vec![p("/b.ts"), p("/c.ts")]);
}

#[test]
fn test_apply_chain_terminates_on_cycle() {
    let mut deps = manager();
    deps.add_dependency(&p("/a.ts"), &p("/b.ts"));
    deps.add_dependency(&p("/b.ts"), &p("/c.ts"));
    deps.add_dependency(&p("/c.ts"), &p("/a.ts"));

    let mut reachable = deps.transitive_dependencies(&p("/a.ts"));
    reachable.sort();
    assert_eq!(reachable, vec![p("/b.ts"), p("/c.ts")]);
}

#[test]
fn test_self_import_does_not_loop() {
    let mut deps = manager();
    deps.add_dependency(&p("/a.ts"), &p("/a.ts"));
    assert!(deps.transitive_dependencies(&p("/a.ts")).is_empty());

    let graph = deps.get_dependency_graph(&p("/a.ts"));
    assert_eq!(graph.nodes.len(), 2);
    assert!(!graph.node(1).expanded);
}

#[test]
fn test_dependency_graph_expands_each_file_once() {
    let mut deps = manager();
    deps.add_dependency(&p("/a.ts"), &p("/b.ts"));
    deps.add_dependency(&p("/a.ts"), &p("/c.ts"));
    deps.add_dependency(&p("/b.ts"), &p("/c.ts"));
    deps.add_dependency(&p("/c.ts"), &p("/a.ts"));
    deps.add_type_declaration(&p("/c.ts"), &p("/types.d.ts"));

    let graph = deps.get_dependency_graph(&p("/a.ts"));
    let root = graph.root();
    assert_eq!(root.children.len(), 2);

    let expanded: Vec<&PathBuf> = graph
        .nodes
        .iter()
        .filter(|n| n.expanded)
        .map(|n| &n.file)
        .collect();
    assert_eq!(
        expanded,
        vec![&p("/a.ts"), &p("/b.ts"), &p("/c.ts"), &p("/types.d.ts")]
    );

    let rendered = graph.render();
    assert!(rendered.starts_with("/a.ts\n  /b.ts\n    /c.ts (*)\n  /c.ts\n"));
    assert!(rendered.contains("    /a.ts (*)\n"));
}

#[test]
fn test_resolution_memo_roundtrip_and_removal() {
    let mut deps = manager();
    deps.add_module_resolution(&p("/a.ts"), "./b", ResolvedModule::new("/b.ts"));
    deps.add_type_reference_resolution(&p("/a.ts"), "node", ResolvedTypeReference::new("/node.d.ts"));

    assert_eq!(
        deps.module_resolution(&p("/a.ts"), "./b").unwrap().resolved_file_name,
        p("/b.ts")
    );
    assert!(deps.module_resolution(&p("/a.ts"), "./c").is_none());
    assert!(deps.type_reference_resolution(&p("/a.ts"), "node").is_some());

    deps.remove_file(&p("/b.ts"));
    assert!(deps.module_resolution(&p("/a.ts"), "./b").is_none());
    assert!(deps.type_reference_resolution(&p("/a.ts"), "node").is_some());
}

#[test]
fn test_known_type_declarations() {
    let mut deps = manager();
    assert!(deps.mark_type_declaration(&p("/types.d.ts")));
    assert!(!deps.mark_type_declaration(&p("/types.d.ts")));
    assert!(deps.is_known_type_declaration(&p("/types.d.ts")));

    assert!(deps.unmark_type_declaration(&p("/types.d.ts")));
    assert!(!deps.is_known_type_declaration(&p("/types.d.ts")));
    assert!(deps.mark_type_declaration(&p("/types.d.ts")));
}
