//! One named loader session: a compilation state, an optional forked
//! checker and the per-instance cache and diagnostics settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use tsz_common::normalize_path;
use tsz_incremental::{CompilationState, CompiledOutput, FileSystem, IncrementalError};
use tsz_worker::{
    CheckerClient, DiagnosticFilter, DiagnosticsDebouncer, FileDeps, FormattedDiagnostic,
    PendingReply, program_diagnostics, sync_file,
};

use crate::cache::OutputCache;
use crate::config::LoaderConfig;
use crate::error::Result;

/// A compiled module and the files it was compiled from.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub output: CompiledOutput,
    pub deps: FileDeps,
}

pub struct Instance {
    name: String,
    config: LoaderConfig,
    context: PathBuf,
    cache_identifier: String,
    fs: Arc<dyn FileSystem>,
    state: Mutex<CompilationState>,
    checker: Option<CheckerClient>,
    cache: Option<Box<dyn OutputCache>>,
    filter: DiagnosticFilter,
    debouncer: DiagnosticsDebouncer,
}

impl Instance {
    pub(crate) fn new(
        name: String,
        config: LoaderConfig,
        context: PathBuf,
        state: CompilationState,
        fs: Arc<dyn FileSystem>,
        checker: Option<CheckerClient>,
        cache: Option<Box<dyn OutputCache>>,
    ) -> Result<Self> {
        let filter = DiagnosticFilter::new(
            state.options().skip_lib_check(),
            &config.report_files,
            &config.ignore_diagnostics,
            context.clone(),
        )?;
        let info = state.oracle().info();
        let cache_identifier = format!(
            "{}@{}|{}|{}",
            info.name,
            info.version,
            env!("CARGO_PKG_VERSION"),
            serde_json::to_string(state.options()).unwrap_or_default(),
        );
        Ok(Self {
            name,
            debouncer: DiagnosticsDebouncer::new(config.debounce()),
            config,
            context,
            cache_identifier,
            fs,
            state: Mutex::new(state),
            checker,
            cache,
            filter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    /// Compiler, loader version and compiler options; part of every cache key.
    pub fn cache_identifier(&self) -> &str {
        &self.cache_identifier
    }

    pub fn cache(&self) -> Option<&dyn OutputCache> {
        self.cache.as_deref()
    }

    pub fn checker(&self) -> Option<&CheckerClient> {
        self.checker.as_ref()
    }

    pub fn is_forked(&self) -> bool {
        self.checker.is_some()
    }

    pub fn debouncer(&self) -> &DiagnosticsDebouncer {
        &self.debouncer
    }

    /// Run `f` with exclusive access to the local compilation state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut CompilationState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Compile `file` with `text` as its current content, locally or in the
    /// checker worker.
    pub fn compile(&self, file: &Path, text: &str) -> Result<CompiledModule> {
        if let Some(checker) = &self.checker {
            let response = checker.emit_file(file, text).wait()?;
            let output = response.compiled().ok_or_else(|| IncrementalError::EmitMissingOutput {
                path: file.to_path_buf(),
            })?;
            return Ok(CompiledModule {
                output,
                deps: response.deps,
            });
        }

        let mut state = self.state.lock();
        sync_file(&mut state, file, text)?;
        let output = state.emit_with_fallback(file, self.config.transpile_only)?;
        let deps = FileDeps::collect(&state, file);
        trace!(file = %file.display(), fast = output.fast, deps = deps.dependencies.len(), "compiled");
        Ok(CompiledModule { output, deps })
    }

    /// Make `file` and everything it imports known without emitting it, as
    /// on a cache hit. Returns what the module depends on.
    pub fn register(&self, file: &Path, text: &str) -> Result<FileDeps> {
        if let Some(checker) = &self.checker {
            return Ok(checker.register_file(file, text).wait()?);
        }
        let mut state = self.state.lock();
        sync_file(&mut state, file, text)?;
        Ok(FileDeps::collect(&state, file))
    }

    /// Every file the compilation currently knows about.
    pub fn known_files(&self) -> Result<Vec<PathBuf>> {
        match &self.checker {
            Some(checker) => Ok(checker.files().wait()?),
            None => Ok(self.state.lock().files().paths()),
        }
    }

    /// Apply changes reported by the host's watcher.
    pub fn files_changed(&self, changed: &[PathBuf]) {
        {
            let mut state = self.state.lock();
            let mut refreshed = false;
            for path in changed.iter().map(|path| normalize_path(path)) {
                state.invalidate(&path);
                if !state.has_file(&path) {
                    continue;
                }
                match state.read_file(&path) {
                    Ok(true) => {
                        refreshed = true;
                        if let Err(err) = state.check_dependencies(&path) {
                            warn!(file = %path.display(), error = %err, "re-analysis of changed file failed");
                        }
                    }
                    Ok(false) => trace!(file = %path.display(), "changed file has identical content"),
                    Err(err) => {
                        debug!(file = %path.display(), error = %err, "changed file unreadable, removing");
                        refreshed |= state.remove_file(&path);
                    }
                }
            }
            if refreshed {
                state.update_program();
            }
        }

        if let Some(checker) = &self.checker {
            let replies: Vec<PendingReply<()>> = changed
                .iter()
                .map(|path| match self.fs.read_to_string(path) {
                    Ok(text) => checker.update_file(path, &text, true),
                    Err(_) => checker.remove_file(path),
                })
                .collect();
            for reply in replies {
                if let Err(err) = reply.wait() {
                    warn!(instance = %self.name, error = %err, "checker did not accept file change");
                }
            }
        }

        self.debouncer.notify(Instant::now());
    }

    /// Diagnostics of the whole compilation, from the checker when forked.
    pub fn diagnostics(&self) -> Result<Vec<FormattedDiagnostic>> {
        match &self.checker {
            Some(checker) => Ok(checker.diagnostics().wait()?),
            None => {
                let mut state = self.state.lock();
                Ok(program_diagnostics(&mut state, &self.filter, &self.context)?)
            }
        }
    }

    /// Run diagnostics once the debounce window has passed. `None` when
    /// nothing changed since the last run.
    pub fn debounced_diagnostics(&self) -> Result<Option<Vec<FormattedDiagnostic>>> {
        if let Some(deadline) = self.debouncer.deadline() {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
        if !self.debouncer.try_start(Instant::now()) {
            return Ok(None);
        }
        let result = self.diagnostics();
        if self.debouncer.finish() {
            debug!(instance = %self.name, "changes arrived during diagnostics, follow-up run owed");
        }
        result.map(Some)
    }

    /// Kill and respawn the checker, replaying its initialization.
    pub fn reset_checker(&self) -> Result<()> {
        if let Some(checker) = &self.checker {
            checker.reset()?;
        }
        Ok(())
    }
}
