//! Compilation state: the file store, dependency manager and analyzer bound
//! to one oracle and one set of compiler options.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};
use tsz_common::{Diagnostic, PathCase, normalize_path};

use crate::analyzer::{self, AnalysisOutcome, AnalyzerEnv, FileAnalyzer};
use crate::deps::DependencyManager;
use crate::error::{IncrementalError, Result};
use crate::file_store::{FileStore, SourceFile};
use crate::fs::{FileSystem, OsFileSystem};
use crate::oracle::{
    CompilerOptions, CompilerOracle, EmitOutput, Program, ProgramHost, ResolvedModule,
    ResolvedTypeReference,
};

/// JavaScript produced for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledOutput {
    pub text: String,
    pub source_map: Option<String>,
    /// Produced by the single-file transpiler rather than a full emit.
    pub fast: bool,
    /// Diagnostics reported by the transpiler; always empty for full emits.
    pub diagnostics: Vec<Diagnostic>,
}

struct CachedProgram {
    project_version: u64,
    generation: u64,
    program: Arc<dyn Program>,
}

pub struct CompilationState {
    oracle: Arc<dyn CompilerOracle>,
    fs: Arc<dyn FileSystem>,
    options: CompilerOptions,
    files: FileStore,
    deps: DependencyManager,
    analyzer: FileAnalyzer,
    program: Option<CachedProgram>,
}

impl CompilationState {
    pub fn new(oracle: Arc<dyn CompilerOracle>, options: CompilerOptions, case: PathCase) -> Self {
        Self {
            oracle,
            fs: Arc::new(OsFileSystem),
            options,
            files: FileStore::new(case),
            deps: DependencyManager::new(case),
            analyzer: FileAnalyzer::new(case),
            program: None,
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn oracle(&self) -> &Arc<dyn CompilerOracle> {
        &self.oracle
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn deps(&self) -> &DependencyManager {
        &self.deps
    }

    pub fn analyzer(&self) -> &FileAnalyzer {
        &self.analyzer
    }

    pub fn add_file(&mut self, path: &Path, text: impl Into<Arc<str>>) {
        self.files.add_file(path, text);
    }

    /// See [`FileStore::update_file`]. A `true` result means the caller must
    /// refresh the program before the next emit or diagnostics read.
    pub fn update_file(&mut self, path: &Path, text: &str, checked: bool) -> bool {
        self.files.update_file(path, text, checked)
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.has_file(path)
    }

    pub fn get_file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get_file(path)
    }

    pub fn remove_file(&mut self, path: &Path) -> bool {
        self.deps.remove_file(path);
        self.analyzer.forget(path);
        self.files.remove_file(path).is_some()
    }

    /// Re-key a file, keeping its version history. The renamed file is
    /// re-analyzed on the next `check_dependencies`.
    pub fn rename_file(&mut self, from: &Path, to: &Path) -> bool {
        if !self.files.rename_file(from, to) {
            return false;
        }
        self.deps.remove_file(from);
        self.analyzer.forget(from);
        self.analyzer.invalidate(to);
        true
    }

    pub fn check_dependencies(&mut self, path: &Path) -> Result<AnalysisOutcome> {
        let env = AnalyzerEnv {
            oracle: &*self.oracle,
            fs: &*self.fs,
            options: &self.options,
        };
        self.analyzer
            .check_dependencies(path, &mut self.files, &mut self.deps, env)
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.analyzer.invalidate(path);
    }

    pub fn is_valid(&self, path: &Path) -> bool {
        self.analyzer.is_valid(path)
    }

    /// Drop the cached program; the next read rebuilds it.
    pub fn update_program(&mut self) {
        if self.program.take().is_some() {
            trace!("program cache dropped");
        }
    }

    /// The program for the current file versions, built at most once per
    /// `(project_version, generation)`.
    pub fn program(&mut self) -> Result<Arc<dyn Program>> {
        let project_version = self.files.project_version();
        let generation = self.files.generation();
        if let Some(cached) = &self.program
            && cached.project_version == project_version
            && cached.generation == generation
        {
            return Ok(Arc::clone(&cached.program));
        }

        debug!(
            project_version,
            generation,
            files = self.files.len(),
            "building program"
        );
        let program = self.oracle.build_program(&*self)?;
        self.program = Some(CachedProgram {
            project_version,
            generation,
            program: Arc::clone(&program),
        });
        Ok(program)
    }

    /// Raw emit result for `path`. A program that does not know the file is
    /// rebuilt once before giving up.
    pub fn emit_output(&mut self, path: &Path) -> Result<EmitOutput> {
        let path = normalize_path(path);
        let mut program = self.program()?;
        if !program.contains_file(&path) {
            debug!(file = %path.display(), "file missing from program, refreshing");
            self.update_program();
            program = self.program()?;
            if !program.contains_file(&path) {
                return Err(IncrementalError::EmitMissingOutput { path });
            }
        }
        Ok(program.emit(&path)?)
    }

    /// Full emit. Fails with `EmitSkipped` or `EmitMissingOutput` when no
    /// JavaScript comes back.
    pub fn emit(&mut self, path: &Path) -> Result<CompiledOutput> {
        let output = self.emit_output(path)?;
        if output.emit_skipped {
            return Err(IncrementalError::EmitSkipped {
                path: normalize_path(path),
            });
        }
        let Some(js) = output.javascript() else {
            return Err(IncrementalError::EmitMissingOutput {
                path: normalize_path(path),
            });
        };
        Ok(CompiledOutput {
            text: js.text.clone(),
            source_map: output.source_map().map(|map| map.text.clone()),
            fast: false,
            diagnostics: Vec::new(),
        })
    }

    /// Single-file transpile of the stored text, without type information.
    pub fn transpile(&self, path: &Path) -> Result<CompiledOutput> {
        let Some(file) = self.files.get_file(path) else {
            return Err(IncrementalError::EmitMissingOutput {
                path: normalize_path(path),
            });
        };
        let output = self
            .oracle
            .transpile_module(file.text(), file.path(), &self.options)?;
        Ok(CompiledOutput {
            text: output.output_text,
            source_map: output.source_map_text,
            fast: true,
            diagnostics: output.diagnostics,
        })
    }

    /// Emit `path` the way the loader and the worker both do: transpile when
    /// `transpile_only`, otherwise full emit with a transpile fallback when the
    /// full emit produced nothing. An empty fallback for a non-empty file
    /// reports the original emit error.
    pub fn emit_with_fallback(&mut self, path: &Path, transpile_only: bool) -> Result<CompiledOutput> {
        if transpile_only {
            return self.transpile(path);
        }
        match self.emit(path) {
            Ok(output) => Ok(output),
            Err(err) if err.is_missing_output() => {
                debug!(file = %path.display(), error = %err, "falling back to transpile");
                let fast = self.transpile(path)?;
                let source_empty = self
                    .files
                    .get_file(path)
                    .is_none_or(|file| file.text().trim().is_empty());
                if fast.text.is_empty() && !source_empty {
                    return Err(err);
                }
                Ok(fast)
            }
            Err(err) => Err(err),
        }
    }

    /// Memoized module resolution from `from`.
    pub fn resolve_module(&mut self, from: &Path, specifier: &str) -> Result<Option<ResolvedModule>> {
        let env = AnalyzerEnv {
            oracle: &*self.oracle,
            fs: &*self.fs,
            options: &self.options,
        };
        analyzer::resolve_module(&mut self.deps, env, from, specifier)
    }

    pub fn resolve_type_reference(
        &mut self,
        from: &Path,
        name: &str,
    ) -> Result<Option<ResolvedTypeReference>> {
        let env = AnalyzerEnv {
            oracle: &*self.oracle,
            fs: &*self.fs,
            options: &self.options,
        };
        analyzer::resolve_type_reference(&mut self.deps, env, from, name)
    }

    /// Files reachable from `path`, excluding `path`.
    pub fn file_dependencies(&self, path: &Path) -> Vec<PathBuf> {
        self.deps.transitive_dependencies(&normalize_path(path))
    }

    /// The read-only view handed to the oracle.
    pub fn host(&self) -> &dyn ProgramHost {
        self
    }

    /// Read `path` from the file system into the store without analyzing it.
    pub fn read_file(&mut self, path: &Path) -> Result<bool> {
        let text = self
            .fs
            .read_to_string(path)
            .map_err(|source| IncrementalError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(self.files.update_file(path, &text, true))
    }
}

impl ProgramHost for CompilationState {
    fn project_version(&self) -> u64 {
        self.files.project_version()
    }

    fn script_file_names(&self) -> Vec<PathBuf> {
        self.files.paths()
    }

    fn script_version(&self, file: &Path) -> Option<u64> {
        self.files.get_file(file).map(SourceFile::version)
    }

    fn script_snapshot(&self, file: &Path) -> Option<Arc<str>> {
        self.files.get_file(file).map(SourceFile::snapshot)
    }

    fn compiler_options(&self) -> &CompilerOptions {
        &self.options
    }
}
