//! The loader entry point: one call per module the host bundles.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;
use tracing::{trace, warn};
use tsz_common::normalize_path;
use tsz_worker::{CheckerError, FileDeps};

use crate::cache::{CacheKey, CachedOutput};
use crate::config::LoaderConfig;
use crate::context::BuildContext;
use crate::error::{LoaderError, Result};
use crate::instance::{CompiledModule, Instance};
use crate::registry::SessionRegistry;

/// What the host exposes about the module being loaded.
pub trait LoaderContext {
    fn resource_path(&self) -> &Path;

    /// Inline options of the request, including the leading `?`.
    fn query(&self) -> &str;

    /// Options the loader was registered with.
    fn options(&self) -> &Value;

    fn build_context(&self) -> &BuildContext;

    /// Rebuild this module when `path` changes.
    fn add_dependency(&mut self, path: &Path);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOutput {
    pub text: String,
    /// Source map JSON; the URL comment is stripped from `text`.
    pub source_map: Option<String>,
    pub dependencies: Vec<PathBuf>,
}

pub fn load(registry: &SessionRegistry, ctx: &mut dyn LoaderContext, source: &str) -> Result<LoaderOutput> {
    let config = LoaderConfig::resolve(ctx.options(), ctx.query()).map_err(LoaderError::Config)?;
    let instance = registry.ensure_instance(ctx.build_context(), &config, ctx.options())?;
    let file = normalize_path(ctx.resource_path());

    let cache_key = instance
        .cache()
        .map(|_| CacheKey::compute(source, instance.cache_identifier(), ctx.query()));
    if let (Some(cache), Some(key)) = (instance.cache(), &cache_key)
        && let Some(hit) = cache.get(key)
    {
        trace!(file = %file.display(), "served from cache");
        let deps = instance.register(&file, source)?;
        instance.debouncer().notify(Instant::now());
        return Ok(LoaderOutput {
            text: hit.text,
            source_map: hit.source_map,
            dependencies: add_dependencies(ctx, &deps),
        });
    }

    let compiled = match compile(&instance, &file, source) {
        Ok(compiled) => compiled,
        Err(err) if err.is_missing_output() && instance.config().bail => {
            return Err(LoaderError::Bail {
                reason: err.to_string(),
                file: Some(file),
            });
        }
        Err(err) => return Err(err),
    };
    instance.debouncer().notify(Instant::now());

    let output = LoaderOutput {
        text: strip_source_map_url(&compiled.output.text),
        source_map: compiled.output.source_map,
        dependencies: add_dependencies(ctx, &compiled.deps),
    };

    if let (Some(cache), Some(key)) = (instance.cache(), cache_key) {
        let entry = CachedOutput {
            text: output.text.clone(),
            source_map: output.source_map.clone(),
        };
        if let Err(err) = cache.put(&key, &entry) {
            warn!(file = %file.display(), error = %err, "failed to write cache entry");
        }
    }
    Ok(output)
}

/// Tell the host to rebuild the module when any of `deps` changes.
fn add_dependencies(ctx: &mut dyn LoaderContext, deps: &FileDeps) -> Vec<PathBuf> {
    deps.all()
        .map(|dep| {
            ctx.add_dependency(dep);
            dep.clone()
        })
        .collect()
}

/// Compile, restarting a crashed checker once.
fn compile(instance: &Instance, file: &Path, source: &str) -> Result<CompiledModule> {
    match instance.compile(file, source) {
        Err(LoaderError::Checker(CheckerError::WorkerExited)) => {
            warn!(instance = instance.name(), "checker worker exited, restarting");
            instance.reset_checker()?;
            instance.compile(file, source)
        }
        result => result,
    }
}

/// Drop a trailing `//# sourceMappingURL=` comment; the map is returned on
/// its own.
pub fn strip_source_map_url(text: &str) -> String {
    let trimmed = text.trim_end_matches(['\n', '\r']);
    let line_start = trimmed.rfind('\n').map_or(0, |index| index + 1);
    let last_line = trimmed[line_start..].trim_start();
    if last_line.starts_with("//# sourceMappingURL=") || last_line.starts_with("//@ sourceMappingURL=") {
        return text[..line_start].to_string();
    }
    text.to_string()
}

#[cfg(test)]
#[path = "../tests/loader_unit_tests.rs"]
mod loader_unit_tests;
