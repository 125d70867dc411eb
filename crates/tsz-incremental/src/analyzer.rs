//! Dependency discovery.
//!
//! [`FileAnalyzer::check_dependencies`] loads a file, asks the oracle for its
//! imports and references, resolves them and walks everything newly found.
//! The walk is a FIFO worklist; a file is marked [`Validity::Valid`] as soon
//! as it is popped so import cycles see it as done. A failed walk leaves
//! nothing it visited valid.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use tsz_common::{PathCase, PathKey, is_declaration_file, normalize_path};

use crate::deps::DependencyManager;
use crate::error::{IncrementalError, Result};
use crate::file_store::FileStore;
use crate::fs::FileSystem;
use crate::oracle::{CompilerOptions, CompilerOracle, ResolvedModule, ResolvedTypeReference};

/// Analysis state of a file. Files never analyzed have no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
}

/// What a `check_dependencies` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// New files were loaded into the store; the program must be refreshed.
    pub changed: bool,
    /// Files analyzed by this call, in visit order.
    pub analyzed: Vec<PathBuf>,
}

/// The collaborators an analysis reads from.
#[derive(Clone, Copy)]
pub struct AnalyzerEnv<'a> {
    pub oracle: &'a dyn CompilerOracle,
    pub fs: &'a dyn FileSystem,
    pub options: &'a CompilerOptions,
}

#[derive(Debug)]
pub struct FileAnalyzer {
    case: PathCase,
    validity: FxHashMap<PathKey, Validity>,
}

impl FileAnalyzer {
    pub fn new(case: PathCase) -> Self {
        Self {
            case,
            validity: FxHashMap::default(),
        }
    }

    pub fn state(&self, file: &Path) -> Option<Validity> {
        self.validity.get(&self.case.key(file)).copied()
    }

    pub fn is_valid(&self, file: &Path) -> bool {
        self.state(file) == Some(Validity::Valid)
    }

    /// Force the next `check_dependencies` to re-analyze `file`.
    pub fn invalidate(&mut self, file: &Path) {
        trace!(file = %file.display(), "invalidate");
        self.validity.insert(self.case.key(file), Validity::Invalid);
    }

    /// Drop any state for `file`.
    pub fn forget(&mut self, file: &Path) {
        self.validity.remove(&self.case.key(file));
    }

    /// Analyze `file` and everything it reaches that is not already valid.
    ///
    /// On error every file this call visited is marked invalid, and queued
    /// declaration files are released, so the next call redoes the walk.
    pub fn check_dependencies(
        &mut self,
        file: &Path,
        files: &mut FileStore,
        deps: &mut DependencyManager,
        env: AnalyzerEnv<'_>,
    ) -> Result<AnalysisOutcome> {
        let mut outcome = AnalysisOutcome::default();
        let mut queue = VecDeque::from([normalize_path(file)]);

        while let Some(current) = queue.pop_front() {
            let key = self.case.key(&current);
            if self.validity.get(&key) == Some(&Validity::Valid) {
                continue;
            }
            self.validity.insert(key.clone(), Validity::Valid);
            outcome.analyzed.push(current.clone());

            if let Err(err) = self.analyze_file(&current, files, deps, env, &mut queue, &mut outcome)
            {
                debug!(
                    file = %current.display(),
                    error = %err,
                    abandoned = outcome.analyzed.len() + queue.len(),
                    "analysis failed"
                );
                self.abandon_walk(&outcome.analyzed, queue, deps);
                return Err(err);
            }
        }

        debug!(
            file = %file.display(),
            analyzed = outcome.analyzed.len(),
            changed = outcome.changed,
            "dependencies checked"
        );
        Ok(outcome)
    }

    /// Undo a failed walk. Ancestors of the failing file have unfinished
    /// subtrees, so none of the visited files may stay valid.
    fn abandon_walk(
        &mut self,
        visited: &[PathBuf],
        queue: VecDeque<PathBuf>,
        deps: &mut DependencyManager,
    ) {
        for path in visited {
            self.validity.insert(self.case.key(path), Validity::Invalid);
        }
        for path in visited.iter().chain(queue.iter()) {
            if is_declaration_file(path) {
                deps.unmark_type_declaration(path);
            }
        }
    }

    fn analyze_file(
        &self,
        file: &Path,
        files: &mut FileStore,
        deps: &mut DependencyManager,
        env: AnalyzerEnv<'_>,
        queue: &mut VecDeque<PathBuf>,
        outcome: &mut AnalysisOutcome,
    ) -> Result<()> {
        deps.clear_dependencies(file);

        let text: Arc<str> = match files.get_file(file) {
            Some(source) => source.snapshot(),
            None => {
                let text = env
                    .fs
                    .read_to_string(file)
                    .map_err(|source| IncrementalError::FileRead {
                        path: file.to_path_buf(),
                        source,
                    })?;
                let text: Arc<str> = Arc::from(text);
                files.add_file(file, Arc::clone(&text));
                outcome.changed = true;
                text
            }
        };

        let pre = env.oracle.pre_process_file(&text);

        for specifier in &pre.imported_files {
            let Some(resolved) = resolve_module(deps, env, file, specifier)? else {
                trace!(file = %file.display(), specifier, "unresolved import dropped");
                continue;
            };
            let target = normalize_path(&resolved.resolved_file_name);
            self.link(file, target, deps, queue);
        }

        let base = file.parent().unwrap_or_else(|| Path::new(""));
        for reference in &pre.referenced_files {
            let target = normalize_path(&base.join(reference));
            if !files.has_file(&target) && !env.fs.exists(&target) {
                trace!(file = %file.display(), reference, "missing reference dropped");
                continue;
            }
            self.link(file, target, deps, queue);
        }

        for name in &pre.type_reference_directives {
            let Some(resolved) = resolve_type_reference(deps, env, file, name)? else {
                trace!(file = %file.display(), name, "unresolved type reference dropped");
                continue;
            };
            let target = normalize_path(&resolved.resolved_file_name);
            deps.add_type_reference(file, &target);
            if deps.mark_type_declaration(&target) {
                queue.push_back(target);
            }
        }

        Ok(())
    }

    /// Record the edge and decide whether the target needs a visit.
    fn link(
        &self,
        from: &Path,
        target: PathBuf,
        deps: &mut DependencyManager,
        queue: &mut VecDeque<PathBuf>,
    ) {
        if is_declaration_file(&target) {
            deps.add_type_declaration(from, &target);
            if deps.mark_type_declaration(&target) {
                queue.push_back(target);
            }
        } else {
            deps.add_dependency(from, &target);
            if !self.is_valid(&target) {
                queue.push_back(target);
            }
        }
    }
}

/// Memoized module resolution. Only found modules are remembered, so a file
/// created later is picked up by the next lookup.
pub(crate) fn resolve_module(
    deps: &mut DependencyManager,
    env: AnalyzerEnv<'_>,
    from: &Path,
    specifier: &str,
) -> Result<Option<ResolvedModule>> {
    if let Some(hit) = deps.module_resolution(from, specifier) {
        return Ok(Some(hit.clone()));
    }
    let resolved = env
        .oracle
        .resolve_module_name(specifier, from, env.options)
        .map_err(|source| IncrementalError::Resolution {
            file: from.to_path_buf(),
            specifier: specifier.to_string(),
            source,
        })?;
    if let Some(resolved) = &resolved {
        deps.add_module_resolution(from, specifier, resolved.clone());
    }
    Ok(resolved)
}

pub(crate) fn resolve_type_reference(
    deps: &mut DependencyManager,
    env: AnalyzerEnv<'_>,
    from: &Path,
    name: &str,
) -> Result<Option<ResolvedTypeReference>> {
    if let Some(hit) = deps.type_reference_resolution(from, name) {
        return Ok(Some(hit.clone()));
    }
    let resolved = env
        .oracle
        .resolve_type_reference_directive(name, from, env.options)
        .map_err(|source| IncrementalError::Resolution {
            file: from.to_path_buf(),
            specifier: name.to_string(),
            source,
        })?;
    if let Some(resolved) = &resolved {
        deps.add_type_reference_resolution(from, name, resolved.clone());
    }
    Ok(resolved)
}
