//! A compiler oracle driven entirely by test scripts.
//!
//! Import discovery is a line scanner that understands the import forms the
//! tests use. Resolution looks files up in the shared [`CountingFileSystem`].
//! Emit echoes the stored text back, so "the emitted body is intact" checks
//! are plain substring checks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tsz_common::{Diagnostic, is_declaration_file, normalize_path};
use tsz_incremental::{
    CompilerInfo, CompilerOptions, CompilerOracle, EmitOutput, OracleError, OutputFile,
    PreProcessedFile, Program, ProgramHost, ResolvedModule, ResolvedTypeReference, TranspileOutput,
};

use crate::fs::CountingFileSystem;

/// Produces diagnostics for `(file, text)`.
pub type DiagnosticRule = Arc<dyn Fn(&Path, &str) -> Vec<Diagnostic> + Send + Sync>;

#[derive(Clone, Default)]
struct Script {
    modules: FxHashMap<String, PathBuf>,
    type_references: FxHashMap<String, PathBuf>,
    failing_specifiers: FxHashSet<String>,
    skip_emit: FxHashSet<PathBuf>,
    omit_output: FxHashSet<PathBuf>,
    excluded: FxHashSet<PathBuf>,
    empty_transpile: bool,
    syntactic: Vec<DiagnosticRule>,
    semantic: Vec<DiagnosticRule>,
    global: Vec<Diagnostic>,
    options: Vec<Diagnostic>,
}

#[derive(Default)]
pub struct ScriptedOracle {
    fs: CountingFileSystem,
    script: Mutex<Script>,
    pre_process_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    build_calls: AtomicUsize,
    transpile_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(fs: CountingFileSystem) -> Self {
        Self {
            fs,
            ..Self::default()
        }
    }

    pub fn fs(&self) -> &CountingFileSystem {
        &self.fs
    }

    /// Resolve the bare specifier `name` to `path`.
    pub fn map_module(&self, name: &str, path: impl AsRef<Path>) {
        self.script
            .lock()
            .modules
            .insert(name.to_string(), normalize_path(path.as_ref()));
    }

    pub fn map_type_reference(&self, name: &str, path: impl AsRef<Path>) {
        self.script
            .lock()
            .type_references
            .insert(name.to_string(), normalize_path(path.as_ref()));
    }

    /// Make resolving `specifier` (module or type reference) return an error.
    pub fn fail_resolution(&self, specifier: &str) {
        self.script
            .lock()
            .failing_specifiers
            .insert(specifier.to_string());
    }

    pub fn skip_emit(&self, path: impl AsRef<Path>) {
        self.script
            .lock()
            .skip_emit
            .insert(normalize_path(path.as_ref()));
    }

    /// Emit succeeds for `path` but produces no output files.
    pub fn omit_output(&self, path: impl AsRef<Path>) {
        self.script
            .lock()
            .omit_output
            .insert(normalize_path(path.as_ref()));
    }

    /// Leave `path` out of every program built from now on.
    pub fn exclude_from_program(&self, path: impl AsRef<Path>) {
        self.script
            .lock()
            .excluded
            .insert(normalize_path(path.as_ref()));
    }

    pub fn include_in_program(&self, path: impl AsRef<Path>) {
        self.script
            .lock()
            .excluded
            .remove(&normalize_path(path.as_ref()));
    }

    pub fn empty_transpile(&self, empty: bool) {
        self.script.lock().empty_transpile = empty;
    }

    pub fn on_syntactic(&self, rule: impl Fn(&Path, &str) -> Vec<Diagnostic> + Send + Sync + 'static) {
        self.script.lock().syntactic.push(Arc::new(rule));
    }

    pub fn on_semantic(&self, rule: impl Fn(&Path, &str) -> Vec<Diagnostic> + Send + Sync + 'static) {
        self.script.lock().semantic.push(Arc::new(rule));
    }

    pub fn add_global_diagnostic(&self, diagnostic: Diagnostic) {
        self.script.lock().global.push(diagnostic);
    }

    pub fn add_options_diagnostic(&self, diagnostic: Diagnostic) {
        self.script.lock().options.push(diagnostic);
    }

    pub fn pre_process_calls(&self) -> usize {
        self.pre_process_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub fn transpile_calls(&self) -> usize {
        self.transpile_calls.load(Ordering::SeqCst)
    }

    fn first_existing(&self, candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
        candidates
            .into_iter()
            .map(|candidate| normalize_path(&candidate))
            .find(|candidate| self.fs.contains(candidate))
    }

    fn search_node_modules(&self, containing_file: &Path, relative: &[String]) -> Option<PathBuf> {
        containing_file.ancestors().skip(1).find_map(|dir| {
            self.first_existing(relative.iter().map(|rel| dir.join("node_modules").join(rel)))
        })
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", base.display(), suffix))
}

fn has_script_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("ts" | "tsx" | "js" | "jsx" | "mts" | "cts")
    )
}

/// The string literal at the start of `s`, if any.
fn quoted(s: &str) -> Option<String> {
    let s = s.trim_start();
    let quote = s.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let rest = &s[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn attribute(s: &str, name: &str) -> Option<String> {
    let marker = format!("{name}=");
    let start = s.find(&marker)? + marker.len();
    quoted(&s[start..])
}

fn scan(text: &str) -> PreProcessedFile {
    let mut pre = PreProcessedFile::default();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("///") {
            if rest.contains("<reference") {
                if let Some(path) = attribute(rest, "path") {
                    pre.referenced_files.push(path);
                } else if let Some(types) = attribute(rest, "types") {
                    pre.type_reference_directives.push(types);
                }
            }
            continue;
        }
        if trimmed.starts_with("//") {
            continue;
        }

        if trimmed.starts_with("import ") || trimmed.starts_with("export ") || trimmed.starts_with('}')
        {
            if let Some(index) = trimmed.find(" from ") {
                pre.imported_files.extend(quoted(&trimmed[index + " from ".len()..]));
            } else if let Some(rest) = trimmed.strip_prefix("import ") {
                pre.imported_files.extend(quoted(rest));
            }
        }

        let mut rest = trimmed;
        while let Some(index) = rest.find("require(") {
            rest = &rest[index + "require(".len()..];
            pre.imported_files.extend(quoted(rest));
        }
    }
    pre
}

fn source_map_json(file: &Path) -> String {
    serde_json::json!({
        "version": 3,
        "sources": [file.to_string_lossy()],
        "names": [],
        "mappings": "",
    })
    .to_string()
}

impl CompilerOracle for ScriptedOracle {
    fn info(&self) -> CompilerInfo {
        CompilerInfo {
            name: "scripted".to_string(),
            version: "0.0.0".to_string(),
        }
    }

    fn pre_process_file(&self, text: &str) -> PreProcessedFile {
        self.pre_process_calls.fetch_add(1, Ordering::SeqCst);
        scan(text)
    }

    fn resolve_module_name(
        &self,
        name: &str,
        containing_file: &Path,
        _options: &CompilerOptions,
    ) -> Result<Option<ResolvedModule>, OracleError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock();
        if script.failing_specifiers.contains(name) {
            return Err(OracleError::new(format!("resolver failure for '{name}'")));
        }
        if let Some(path) = script.modules.get(name) {
            return Ok(Some(ResolvedModule {
                resolved_file_name: path.clone(),
                is_external_library_import: true,
            }));
        }
        drop(script);

        if name.starts_with("./") || name.starts_with("../") || name.starts_with('/') {
            let base = match containing_file.parent() {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            };
            let candidates = if has_script_extension(&base) {
                vec![base]
            } else {
                vec![
                    with_suffix(&base, ".ts"),
                    with_suffix(&base, ".tsx"),
                    with_suffix(&base, ".d.ts"),
                    base.join("index.ts"),
                    base.join("index.d.ts"),
                ]
            };
            return Ok(self.first_existing(candidates).map(ResolvedModule::new));
        }

        let relative = [
            format!("{name}/index.d.ts"),
            format!("{name}.d.ts"),
            format!("@types/{name}/index.d.ts"),
        ];
        Ok(self
            .search_node_modules(containing_file, &relative)
            .map(|path| ResolvedModule {
                resolved_file_name: path,
                is_external_library_import: true,
            }))
    }

    fn resolve_type_reference_directive(
        &self,
        name: &str,
        containing_file: &Path,
        _options: &CompilerOptions,
    ) -> Result<Option<ResolvedTypeReference>, OracleError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock();
        if script.failing_specifiers.contains(name) {
            return Err(OracleError::new(format!("resolver failure for '{name}'")));
        }
        if let Some(path) = script.type_references.get(name) {
            return Ok(Some(ResolvedTypeReference::new(path.clone())));
        }
        drop(script);

        let relative = [format!("@types/{name}/index.d.ts")];
        Ok(self
            .search_node_modules(containing_file, &relative)
            .map(ResolvedTypeReference::new))
    }

    fn build_program(&self, host: &dyn ProgramHost) -> Result<Arc<dyn Program>, OracleError> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().clone();
        let mut files = FxHashMap::default();
        for name in host.script_file_names() {
            let name = normalize_path(&name);
            if script.excluded.contains(&name) {
                continue;
            }
            if let Some(text) = host.script_snapshot(&name) {
                files.insert(name, text);
            }
        }
        Ok(Arc::new(ScriptedProgram {
            project_version: host.project_version(),
            files,
            script,
        }))
    }

    fn transpile_module(
        &self,
        text: &str,
        file_name: &Path,
        _options: &CompilerOptions,
    ) -> Result<TranspileOutput, OracleError> {
        self.transpile_calls.fetch_add(1, Ordering::SeqCst);
        let output_text = if self.script.lock().empty_transpile {
            String::new()
        } else {
            text.to_string()
        };
        Ok(TranspileOutput {
            output_text,
            source_map_text: Some(source_map_json(file_name)),
            diagnostics: Vec::new(),
        })
    }
}

/// Program snapshot produced by [`ScriptedOracle`].
pub struct ScriptedProgram {
    project_version: u64,
    files: FxHashMap<PathBuf, Arc<str>>,
    script: Script,
}

impl ScriptedProgram {
    pub fn project_version(&self) -> u64 {
        self.project_version
    }

    fn run_rules(&self, rules: &[DiagnosticRule], file: &Path) -> Vec<Diagnostic> {
        let file = normalize_path(file);
        let Some(text) = self.files.get(&file) else {
            return Vec::new();
        };
        rules.iter().flat_map(|rule| rule(&file, &**text)).collect()
    }
}

impl Program for ScriptedProgram {
    fn source_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.files.keys().cloned().collect();
        files.sort();
        files
    }

    fn contains_file(&self, file: &Path) -> bool {
        self.files.contains_key(&normalize_path(file))
    }

    fn emit(&self, file: &Path) -> Result<EmitOutput, OracleError> {
        let file = normalize_path(file);
        let Some(text) = self.files.get(&file) else {
            return Ok(EmitOutput::default());
        };
        if self.script.skip_emit.contains(&file) || is_declaration_file(&file) {
            return Ok(EmitOutput {
                output_files: Vec::new(),
                emit_skipped: true,
            });
        }
        if self.script.omit_output.contains(&file) {
            return Ok(EmitOutput::default());
        }

        let js_name = file.with_extension("js");
        let map_name = with_suffix(&js_name, ".map");
        let map_file_name = map_name
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(EmitOutput {
            output_files: vec![
                OutputFile {
                    name: js_name,
                    text: format!("{text}\n//# sourceMappingURL={map_file_name}"),
                    write_byte_order_mark: false,
                },
                OutputFile {
                    name: map_name,
                    text: source_map_json(&file),
                    write_byte_order_mark: false,
                },
            ],
            emit_skipped: false,
        })
    }

    fn options_diagnostics(&self) -> Vec<Diagnostic> {
        self.script.options.clone()
    }

    fn global_diagnostics(&self) -> Vec<Diagnostic> {
        self.script.global.clone()
    }

    fn syntactic_diagnostics(&self, file: &Path) -> Vec<Diagnostic> {
        self.run_rules(&self.script.syntactic, file)
    }

    fn semantic_diagnostics(&self, file: &Path) -> Vec<Diagnostic> {
        self.run_rules(&self.script.semantic, file)
    }
}
