//! Host build hooks.
//!
//! [`on_watch_run`] runs before a watch rebuild with the changed paths;
//! [`after_compile`] runs once a pass has produced its module set and adds
//! dependencies and diagnostics to the pass report.

use std::path::PathBuf;
use std::time::Instant;

use rustc_hash::FxHashSet;
use tracing::{debug, info};
use tsz_common::normalize_path;
use tsz_worker::FormattedDiagnostic;

use crate::context::BuildContext;
use crate::error::{LoaderError, Result};
use crate::instance::Instance;

#[derive(Debug, Clone, Default)]
pub struct CompilationReport {
    pub errors: Vec<FormattedDiagnostic>,
    pub warnings: Vec<FormattedDiagnostic>,
    /// Files the host should watch for this pass.
    pub file_dependencies: Vec<PathBuf>,
    /// Files the host bundled as modules in this pass.
    pub module_files: Vec<PathBuf>,
    /// Status lines for the user; empty for silent instances.
    pub messages: Vec<String>,
}

pub fn on_watch_run(ctx: &BuildContext, changed: &[PathBuf]) {
    if changed.is_empty() {
        return;
    }
    for instance in ctx.all_instances() {
        debug!(instance = instance.name(), count = changed.len(), "applying watch changes");
        instance.files_changed(changed);
    }
}

pub fn after_compile(ctx: &BuildContext, report: &mut CompilationReport) -> Result<()> {
    let mut bail = None;
    for instance in ctx.all_instances() {
        register_phantom_dependencies(&instance, report)?;
        let errors = report_diagnostics(&instance, report)?;
        if errors > 0 && instance.config().bail && bail.is_none() {
            bail = Some(format!("{errors} type errors in instance '{}'", instance.name()));
        }
    }
    match bail {
        Some(reason) => Err(LoaderError::Bail { file: None, reason }),
        None => Ok(()),
    }
}

/// Files the compilation read (declarations, type references, imports that
/// were elided) are not modules of the bundle, but edits to them still have
/// to trigger a rebuild.
fn register_phantom_dependencies(instance: &Instance, report: &mut CompilationReport) -> Result<()> {
    let modules: FxHashSet<PathBuf> = report.module_files.iter().map(|file| normalize_path(file)).collect();
    let mut seen: FxHashSet<PathBuf> = report
        .file_dependencies
        .iter()
        .map(|file| normalize_path(file))
        .collect();

    let mut added = 0usize;
    for file in instance.known_files()? {
        let file = normalize_path(&file);
        if modules.contains(&file) || !seen.insert(file.clone()) {
            continue;
        }
        report.file_dependencies.push(file);
        added += 1;
    }
    debug!(instance = instance.name(), added, "phantom dependencies registered");
    Ok(())
}

/// Append the instance's diagnostics; returns how many count as errors.
fn report_diagnostics(instance: &Instance, report: &mut CompilationReport) -> Result<usize> {
    let started = Instant::now();
    let Some(diagnostics) = instance.debounced_diagnostics()? else {
        return Ok(0);
    };
    let config = instance.config();
    let errors = diagnostics.iter().filter(|diagnostic| diagnostic.is_error()).count();
    info!(instance = instance.name(), errors, total = diagnostics.len(), "checking finished");

    if !config.silent {
        if instance.is_forked() {
            report
                .messages
                .push("[tsz-loader] Checking started in a separate process...".to_string());
        }
        report
            .messages
            .push(format!("[tsz-loader] Checking finished with {errors} errors"));
        report
            .messages
            .push(format!("[tsz-loader] Time: {}ms", started.elapsed().as_millis()));
    }

    for diagnostic in diagnostics {
        if diagnostic.is_error() && !config.errors_as_warnings {
            report.errors.push(diagnostic);
        } else {
            report.warnings.push(diagnostic);
        }
    }
    Ok(if config.errors_as_warnings { 0 } else { errors })
}
