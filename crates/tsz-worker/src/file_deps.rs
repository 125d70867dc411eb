use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tsz_incremental::{CompilationState, DependencyKind, IncrementalError};

/// Files an emitted module depends on, split by how they were reached.
/// The loader registers both lists with the bundler so edits to any of them
/// rebuild the module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileDeps {
    /// Imported modules and declaration files, transitively.
    pub dependencies: Vec<PathBuf>,
    /// Targets of `/// <reference types>` directives, transitively.
    pub type_references: Vec<PathBuf>,
}

impl FileDeps {
    pub fn collect(state: &CompilationState, file: &Path) -> Self {
        let graph = state.deps().get_dependency_graph(file);
        let mut deps = FileDeps::default();
        for node in graph.nodes.iter().filter(|node| node.expanded) {
            match node.kind {
                None => {}
                Some(DependencyKind::TypeReferenceDirective) => {
                    deps.type_references.push(node.file.clone());
                }
                Some(DependencyKind::Source | DependencyKind::TypeDeclaration) => {
                    deps.dependencies.push(node.file.clone());
                }
            }
        }
        deps
    }

    /// Every file in both lists.
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.dependencies.iter().chain(&self.type_references)
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.type_references.is_empty()
    }
}

/// Store `text` as the current content of `file` and analyze everything it
/// reaches. Changed content drops the file's old edges first.
pub fn sync_file(state: &mut CompilationState, file: &Path, text: &str) -> Result<(), IncrementalError> {
    if state.update_file(file, text, true) {
        state.invalidate(file);
    }
    let outcome = state.check_dependencies(file)?;
    if outcome.changed {
        state.update_program();
    }
    Ok(())
}
