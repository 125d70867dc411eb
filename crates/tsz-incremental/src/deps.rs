//! Per-file dependency edges and memoized resolutions.
//!
//! Edges are stored forward only (`file -> what it uses`). `add_*` appends
//! without a membership check; consumers walk with a visited set, so
//! duplicate edges cost nothing but a skipped iteration.
//!
//! Every walk here uses an explicit stack or queue plus a per-walk visited
//! set. Import cycles terminate and nothing recurses on the call stack.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use tsz_common::{PathCase, PathKey};

use crate::oracle::{ResolvedModule, ResolvedTypeReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// An ordinary module import.
    Source,
    /// An import or `/// <reference path>` that landed on a declaration file.
    TypeDeclaration,
    /// A `/// <reference types>` directive.
    TypeReferenceDirective,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub to: PathBuf,
    pub kind: DependencyKind,
}

/// Receives the files reachable from a module, e.g. the bundler's
/// file-dependency list.
pub trait DependencySink {
    fn add_dependency(&mut self, path: &Path);
}

impl DependencySink for Vec<PathBuf> {
    fn add_dependency(&mut self, path: &Path) {
        self.push(path.to_path_buf());
    }
}

/// A node of a [`DependencyGraph`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub file: PathBuf,
    /// `None` for the root.
    pub kind: Option<DependencyKind>,
    pub children: Vec<usize>,
    /// `false` when this file was already expanded elsewhere in the snapshot;
    /// such nodes have no children.
    pub expanded: bool,
}

/// Tree snapshot of a file's transitive dependencies, stored as an arena.
/// Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
}

impl DependencyGraph {
    pub fn root(&self) -> &GraphNode {
        &self.nodes[0]
    }

    pub fn node(&self, index: usize) -> &GraphNode {
        &self.nodes[index]
    }

    /// Indented text rendering, one file per line. Repeated files are marked
    /// with `(*)`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            for _ in 0..depth {
                out.push_str("  ");
            }
            let _ = write!(out, "{}", node.file.display());
            if !node.expanded {
                out.push_str(" (*)");
            }
            out.push('\n');
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

#[derive(Debug)]
pub struct DependencyManager {
    case: PathCase,
    edges: FxHashMap<PathKey, Vec<DependencyEdge>>,
    module_resolutions: FxHashMap<PathKey, FxHashMap<String, ResolvedModule>>,
    type_reference_resolutions: FxHashMap<PathKey, FxHashMap<String, ResolvedTypeReference>>,
    /// Declaration files already queued for analysis, project-wide.
    known_type_declarations: FxHashSet<PathKey>,
}

impl DependencyManager {
    pub fn new(case: PathCase) -> Self {
        Self {
            case,
            edges: FxHashMap::default(),
            module_resolutions: FxHashMap::default(),
            type_reference_resolutions: FxHashMap::default(),
            known_type_declarations: FxHashSet::default(),
        }
    }

    /// Drop every edge and memoized resolution recorded for `file`. Called
    /// before each re-analysis so removed imports do not linger and
    /// specifiers are resolved against the current disk.
    pub fn clear_dependencies(&mut self, file: &Path) {
        let key = self.case.key(file);
        if let Some(edges) = self.edges.get_mut(&key) {
            edges.clear();
        }
        self.module_resolutions.remove(&key);
        self.type_reference_resolutions.remove(&key);
    }

    pub fn add_dependency(&mut self, from: &Path, to: &Path) {
        self.push_edge(from, to, DependencyKind::Source);
    }

    pub fn add_type_declaration(&mut self, from: &Path, to: &Path) {
        self.push_edge(from, to, DependencyKind::TypeDeclaration);
    }

    pub fn add_type_reference(&mut self, from: &Path, to: &Path) {
        self.push_edge(from, to, DependencyKind::TypeReferenceDirective);
    }

    fn push_edge(&mut self, from: &Path, to: &Path, kind: DependencyKind) {
        self.edges
            .entry(self.case.key(from))
            .or_default()
            .push(DependencyEdge {
                to: to.to_path_buf(),
                kind,
            });
    }

    /// Direct edges of `file`, possibly with duplicates.
    pub fn dependencies(&self, file: &Path) -> &[DependencyEdge] {
        self.edges
            .get(&self.case.key(file))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_module_resolution(&mut self, from: &Path, specifier: &str, resolved: ResolvedModule) {
        self.module_resolutions
            .entry(self.case.key(from))
            .or_default()
            .insert(specifier.to_string(), resolved);
    }

    pub fn module_resolution(&self, from: &Path, specifier: &str) -> Option<&ResolvedModule> {
        self.module_resolutions
            .get(&self.case.key(from))?
            .get(specifier)
    }

    pub fn add_type_reference_resolution(
        &mut self,
        from: &Path,
        name: &str,
        resolved: ResolvedTypeReference,
    ) {
        self.type_reference_resolutions
            .entry(self.case.key(from))
            .or_default()
            .insert(name.to_string(), resolved);
    }

    pub fn type_reference_resolution(&self, from: &Path, name: &str) -> Option<&ResolvedTypeReference> {
        self.type_reference_resolutions
            .get(&self.case.key(from))?
            .get(name)
    }

    pub fn is_known_type_declaration(&self, path: &Path) -> bool {
        self.known_type_declarations.contains(&self.case.key(path))
    }

    /// Record a declaration file; returns `true` if it was not known yet.
    pub fn mark_type_declaration(&mut self, path: &Path) -> bool {
        self.known_type_declarations.insert(self.case.key(path))
    }

    /// Let `path` be queued again by the next analysis that reaches it.
    pub fn unmark_type_declaration(&mut self, path: &Path) -> bool {
        self.known_type_declarations.remove(&self.case.key(path))
    }

    /// Forget everything about `file`: its edges, its memoized resolutions,
    /// and any memoized resolution that pointed at it.
    pub fn remove_file(&mut self, file: &Path) {
        let key = self.case.key(file);
        self.edges.remove(&key);
        self.module_resolutions.remove(&key);
        self.type_reference_resolutions.remove(&key);
        self.known_type_declarations.remove(&key);

        let case = self.case;
        for resolutions in self.module_resolutions.values_mut() {
            resolutions.retain(|_, resolved| case.key(&resolved.resolved_file_name) != key);
        }
        for resolutions in self.type_reference_resolutions.values_mut() {
            resolutions.retain(|_, resolved| case.key(&resolved.resolved_file_name) != key);
        }
    }

    /// Build a tree snapshot of everything reachable from `file`.
    ///
    /// Each file is expanded at most once per call; later occurrences appear
    /// as leaves with `expanded == false`.
    pub fn get_dependency_graph(&self, file: &Path) -> DependencyGraph {
        let mut nodes = vec![GraphNode {
            file: file.to_path_buf(),
            kind: None,
            children: Vec::new(),
            expanded: true,
        }];
        let mut visited = FxHashSet::default();
        visited.insert(self.case.key(file));
        let mut queue = VecDeque::from([0usize]);

        while let Some(index) = queue.pop_front() {
            let parent = nodes[index].file.clone();
            for edge in self.dependencies(&parent) {
                let first_visit = visited.insert(self.case.key(&edge.to));
                let child = nodes.len();
                nodes.push(GraphNode {
                    file: edge.to.clone(),
                    kind: Some(edge.kind),
                    children: Vec::new(),
                    expanded: first_visit,
                });
                nodes[index].children.push(child);
                if first_visit {
                    queue.push_back(child);
                }
            }
        }

        DependencyGraph { nodes }
    }

    /// Feed every file reachable from `file` (excluding `file` itself) into
    /// `sink`, each exactly once.
    pub fn apply_chain(&self, file: &Path, sink: &mut dyn DependencySink) {
        let mut visited = FxHashSet::default();
        visited.insert(self.case.key(file));
        let mut stack = vec![file.to_path_buf()];

        while let Some(current) = stack.pop() {
            for edge in self.dependencies(&current) {
                if visited.insert(self.case.key(&edge.to)) {
                    sink.add_dependency(&edge.to);
                    stack.push(edge.to.clone());
                }
            }
        }
    }

    /// Files reachable from `file`, in discovery order.
    pub fn transitive_dependencies(&self, file: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        self.apply_chain(file, &mut files);
        files
    }
}

#[cfg(test)]
#[path = "../tests/deps_tests.rs"]
mod deps_tests;
