//! The compiler oracle capability.
//!
//! The loader never type checks anything itself. A compiler implementation
//! plugs in through [`CompilerOracle`] and hands back [`Program`] snapshots
//! built from a [`ProgramHost`] view of the current file versions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tsz_common::Diagnostic;

use crate::error::OracleError;

/// Name and version of the compiler behind the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    pub name: String,
    pub version: String,
}

/// Compiler options as a JSON object (`compilerOptions` in tsconfig terms).
///
/// The loader only reads a handful of flags; everything else is passed
/// through to the oracle untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerOptions(Map<String, Value>);

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: &CompilerOptions) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn skip_lib_check(&self) -> bool {
        self.get_bool("skipLibCheck")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Imports and references found by the oracle's pre-parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreProcessedFile {
    /// Module specifiers from `import`/`export ... from`/`require`.
    pub imported_files: Vec<String>,
    /// `/// <reference path="..." />` targets, relative to the file.
    pub referenced_files: Vec<String>,
    /// `/// <reference types="..." />` names.
    pub type_reference_directives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedModule {
    pub resolved_file_name: PathBuf,
    #[serde(default)]
    pub is_external_library_import: bool,
}

impl ResolvedModule {
    pub fn new(resolved_file_name: impl Into<PathBuf>) -> Self {
        Self {
            resolved_file_name: resolved_file_name.into(),
            is_external_library_import: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTypeReference {
    pub resolved_file_name: PathBuf,
    #[serde(default)]
    pub primary: bool,
}

impl ResolvedTypeReference {
    pub fn new(resolved_file_name: impl Into<PathBuf>) -> Self {
        Self {
            resolved_file_name: resolved_file_name.into(),
            primary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub name: PathBuf,
    pub text: String,
    #[serde(default)]
    pub write_byte_order_mark: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitOutput {
    pub output_files: Vec<OutputFile>,
    pub emit_skipped: bool,
}

const JS_OUTPUT_EXTENSIONS: [&str; 4] = [".js", ".jsx", ".mjs", ".cjs"];

impl EmitOutput {
    /// The emitted JavaScript file, if any.
    pub fn javascript(&self) -> Option<&OutputFile> {
        self.output_files.iter().find(|file| {
            let name = file.name.to_string_lossy();
            JS_OUTPUT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        })
    }

    /// The source map emitted next to the JavaScript file, if any.
    pub fn source_map(&self) -> Option<&OutputFile> {
        self.output_files
            .iter()
            .find(|file| file.name.to_string_lossy().ends_with(".map"))
    }
}

/// Output of the single-file fast path (no type checking).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspileOutput {
    pub output_text: String,
    pub source_map_text: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// What the oracle sees when it builds a program.
pub trait ProgramHost {
    /// Bumped on structural changes (files added, removed, renamed).
    fn project_version(&self) -> u64;

    fn script_file_names(&self) -> Vec<PathBuf>;

    fn script_version(&self, file: &Path) -> Option<u64>;

    fn script_snapshot(&self, file: &Path) -> Option<Arc<str>>;

    fn compiler_options(&self) -> &CompilerOptions;
}

/// An immutable program snapshot built by the oracle.
pub trait Program: Send + Sync {
    fn source_files(&self) -> Vec<PathBuf>;

    fn contains_file(&self, file: &Path) -> bool;

    fn emit(&self, file: &Path) -> Result<EmitOutput, OracleError>;

    fn options_diagnostics(&self) -> Vec<Diagnostic>;

    fn global_diagnostics(&self) -> Vec<Diagnostic>;

    fn syntactic_diagnostics(&self, file: &Path) -> Vec<Diagnostic>;

    fn semantic_diagnostics(&self, file: &Path) -> Vec<Diagnostic>;
}

/// The compiler capability consumed by the loader.
pub trait CompilerOracle: Send + Sync {
    fn info(&self) -> CompilerInfo;

    fn pre_process_file(&self, text: &str) -> PreProcessedFile;

    /// `Ok(None)` means "not found"; the import is dropped from the graph.
    fn resolve_module_name(
        &self,
        name: &str,
        containing_file: &Path,
        options: &CompilerOptions,
    ) -> Result<Option<ResolvedModule>, OracleError>;

    fn resolve_type_reference_directive(
        &self,
        name: &str,
        containing_file: &Path,
        options: &CompilerOptions,
    ) -> Result<Option<ResolvedTypeReference>, OracleError>;

    fn build_program(&self, host: &dyn ProgramHost) -> Result<Arc<dyn Program>, OracleError>;

    fn transpile_module(
        &self,
        text: &str,
        file_name: &Path,
        options: &CompilerOptions,
    ) -> Result<TranspileOutput, OracleError>;
}
