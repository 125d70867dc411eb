use super::*;

#[test]
fn test_children_resolve_to_the_root() {
    let root = BuildContext::root("main");
    let child = BuildContext::child(&root, "worker");
    let grandchild = BuildContext::child(&child, "nested");

    assert_eq!(grandchild.root_context().name(), "main");
    assert_eq!(child.parent().map(|parent| parent.name()), Some("main"));
    assert!(root.parent().is_none());
    assert!(std::ptr::eq(grandchild.root_context(), &*root));
}

#[test]
fn test_empty_context_has_no_instances() {
    let root = BuildContext::root("main");
    let child = BuildContext::child(&root, "worker");
    assert!(child.instance("default").is_none());
    assert!(child.all_instances().is_empty());
    assert!(root.remove_instance("default").is_none());
}
