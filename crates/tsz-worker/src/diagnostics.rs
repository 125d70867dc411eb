//! Diagnostic collection, filtering and rendering.
//!
//! Filtering is an explicit [`DiagnosticFilter`] value handed to
//! [`collect_diagnostics`]; the program itself is never touched.

use std::path::{Path, PathBuf};

use colored::Colorize;
use globset::{Glob, GlobSet, GlobSetBuilder};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tsz_common::{Diagnostic, DiagnosticCategory, FormatError, LineMap, is_declaration_file};
use tsz_incremental::{CompilationState, Program};

use crate::error::CheckerError;

#[derive(Debug, Clone, Default)]
pub struct DiagnosticFilter {
    skip_lib_check: bool,
    report_files: Option<GlobSet>,
    ignore: FxHashSet<u32>,
    context: PathBuf,
}

impl DiagnosticFilter {
    /// `report_files` globs are matched against paths relative to `context`.
    /// An empty list reports every file.
    pub fn new(
        skip_lib_check: bool,
        report_files: &[String],
        ignore_diagnostics: &[u32],
        context: impl Into<PathBuf>,
    ) -> Result<Self, CheckerError> {
        let report_files = if report_files.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in report_files {
                builder.add(Glob::new(pattern)?);
            }
            Some(builder.build()?)
        };
        Ok(Self {
            skip_lib_check,
            report_files,
            ignore: ignore_diagnostics.iter().copied().collect(),
            context: context.into(),
        })
    }

    /// Whether diagnostics should be requested for `file` at all.
    pub fn should_check_file(&self, file: &Path) -> bool {
        if self.skip_lib_check && is_declaration_file(file) {
            return false;
        }
        self.is_reported(file)
    }

    fn is_reported(&self, file: &Path) -> bool {
        let Some(globs) = &self.report_files else {
            return true;
        };
        let relative = file.strip_prefix(&self.context).unwrap_or(file);
        globs.is_match(relative)
    }

    pub fn keep(&self, diagnostic: &Diagnostic) -> bool {
        if self.ignore.contains(&diagnostic.code) {
            return false;
        }
        !diagnostic.has_file() || self.should_check_file(Path::new(&diagnostic.file))
    }
}

/// Options, global, syntactic and semantic diagnostics, in that order.
pub fn collect_diagnostics(program: &dyn Program, filter: &DiagnosticFilter) -> Vec<Diagnostic> {
    let mut diagnostics = program.options_diagnostics();
    diagnostics.extend(program.global_diagnostics());
    for file in program.source_files() {
        if !filter.should_check_file(&file) {
            continue;
        }
        diagnostics.extend(program.syntactic_diagnostics(&file));
        diagnostics.extend(program.semantic_diagnostics(&file));
    }
    diagnostics.retain(|diagnostic| filter.keep(diagnostic));
    diagnostics
}

/// A diagnostic ready for display: positions resolved, message flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedDiagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    /// `/`-separated and relative to the context directory; empty for
    /// global diagnostics.
    pub file: String,
    /// 0-based.
    pub line: u32,
    /// 0-based, UTF-16 code units.
    pub character: u32,
    pub message: String,
    pub pretty: String,
}

impl FormattedDiagnostic {
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

fn display_path(file: &str, context: &Path) -> String {
    let path = Path::new(file);
    let relative = path.strip_prefix(context).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

/// Render `diagnostic`. `source` is the text of its file, used to turn the
/// byte offset into a line and character.
pub fn format_diagnostic(
    diagnostic: &Diagnostic,
    source: Option<&str>,
    context: &Path,
) -> Result<FormattedDiagnostic, FormatError> {
    let message = diagnostic.message.flatten()?;
    let file = if diagnostic.has_file() {
        display_path(&diagnostic.file, context)
    } else {
        String::new()
    };
    let position = source
        .map(|text| LineMap::build(text).offset_to_position(diagnostic.start, text))
        .unwrap_or_default();

    let label = diagnostic.category.label();
    let category = match diagnostic.category {
        DiagnosticCategory::Error => label.red().bold(),
        DiagnosticCategory::Warning => label.yellow().bold(),
        DiagnosticCategory::Suggestion => label.blue().bold(),
        DiagnosticCategory::Message => label.cyan().bold(),
    };
    let code = format!("TS{}", diagnostic.code).bright_blue();
    let pretty = if file.is_empty() {
        format!("{category} {code}: {message}")
    } else {
        format!(
            "{} - {category} {code}: {message}",
            format!("{}:{}:{}", file, position.line + 1, position.character + 1).cyan()
        )
    };

    Ok(FormattedDiagnostic {
        category: diagnostic.category,
        code: diagnostic.code,
        file,
        line: position.line,
        character: position.character,
        message,
        pretty,
    })
}

/// Collect and render the diagnostics of `state`'s current program, resolving
/// positions against the text held in its file store.
pub fn program_diagnostics(
    state: &mut CompilationState,
    filter: &DiagnosticFilter,
    context: &Path,
) -> Result<Vec<FormattedDiagnostic>, CheckerError> {
    let program = state.program()?;
    collect_diagnostics(&*program, filter)
        .iter()
        .map(|diagnostic| {
            let source = state
                .get_file(Path::new(&diagnostic.file))
                .map(|file| file.text());
            format_diagnostic(diagnostic, source, context).map_err(CheckerError::from)
        })
        .collect()
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod diagnostics_tests;
