//! Loader configuration.
//!
//! Loader options are layered: built-in defaults, then the options object the
//! host registered the loader with, then the inline query of the module
//! request. Later layers win. Compiler options come from the project's
//! tsconfig (with its `extends` chain) overlaid with the loader's own
//! `compilerOptions`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;
use tsz_common::PathCase;
use tsz_common::limits::{DEFAULT_CONFIG_FILE_NAME, DEFAULT_DEBOUNCE_MS, DEFAULT_INSTANCE_NAME};
use tsz_incremental::CompilerOptions;
use tsz_worker::{SendPolicy, WorkerConfig};

pub const DEFAULT_CACHE_DIRECTORY: &str = ".tsz-cache";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderConfig {
    /// Session name. Modules naming the same instance share one compilation.
    pub instance: String,
    /// Directory the tsconfig, cache and reported file names are resolved
    /// against. Defaults to the working directory.
    pub context: Option<PathBuf>,
    pub config_file_name: String,
    /// Overrides on top of the tsconfig `compilerOptions`.
    pub compiler_options: CompilerOptions,
    #[serde(alias = "useTranspileModule")]
    pub transpile_only: bool,
    pub fork_checker: bool,
    /// Binary that runs the checker worker. Required with `forkChecker`
    /// unless the registry was given its own launcher.
    pub checker_command: Option<PathBuf>,
    pub checker_args: Vec<String>,
    pub send_policy: SendPolicy,
    pub use_cache: bool,
    pub cache_directory: PathBuf,
    /// Carried for the host; babel runs outside the loader.
    pub use_babel: bool,
    pub babel_options: Value,
    pub ignore_diagnostics: Vec<u32>,
    pub report_files: Vec<String>,
    pub errors_as_warnings: bool,
    pub silent: bool,
    pub bail: bool,
    pub debounce_ms: u64,
    pub path_case: Option<PathCase>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            instance: DEFAULT_INSTANCE_NAME.to_string(),
            context: None,
            config_file_name: DEFAULT_CONFIG_FILE_NAME.to_string(),
            compiler_options: CompilerOptions::new(),
            transpile_only: false,
            fork_checker: false,
            checker_command: None,
            checker_args: Vec::new(),
            send_policy: SendPolicy::platform_default(),
            use_cache: false,
            cache_directory: PathBuf::from(DEFAULT_CACHE_DIRECTORY),
            use_babel: false,
            babel_options: Value::Null,
            ignore_diagnostics: Vec::new(),
            report_files: Vec::new(),
            errors_as_warnings: false,
            silent: false,
            bail: false,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            path_case: None,
        }
    }
}

impl LoaderConfig {
    /// Layer the request `query` over the host `options`.
    pub fn resolve(options: &Value, query: &str) -> Result<Self> {
        let mut merged = match options {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => bail!("loader options must be an object, got {other}"),
        };
        for (key, value) in parse_query(query)? {
            if key == "compilerOptions"
                && let Value::Object(overrides) = &value
                && let Some(Value::Object(base)) = merged.get_mut(&key)
            {
                base.extend(overrides.clone());
                continue;
            }
            merged.insert(key, value);
        }
        serde_json::from_value(Value::Object(merged)).context("invalid loader options")
    }

    pub fn context_dir(&self) -> PathBuf {
        match &self.context {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// What the checker worker needs to know about this configuration.
    pub fn worker_config(&self, context: &Path) -> WorkerConfig {
        WorkerConfig {
            transpile_only: self.transpile_only,
            ignore_diagnostics: self.ignore_diagnostics.clone(),
            report_files: self.report_files.clone(),
            context: context.to_path_buf(),
            path_case: self.path_case,
        }
    }

    /// tsconfig compiler options for `context`, overlaid with ours.
    pub fn project_config(&self, context: &Path) -> Result<ProjectConfig> {
        let path = context.join(&self.config_file_name);
        let (mut compiler_options, config_file) = if path.is_file() {
            let tsconfig = load_tsconfig(&path)?;
            (tsconfig.compiler_options.unwrap_or_default(), Some(path))
        } else {
            debug!(path = %path.display(), "no tsconfig, using loader compiler options only");
            (CompilerOptions::new(), None)
        };
        compiler_options.merge(&self.compiler_options);
        Ok(ProjectConfig {
            compiler_options,
            config_file,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    pub compiler_options: CompilerOptions,
    pub config_file: Option<PathBuf>,
}

/// Parse a request query: `?{json}` or `?a=1&b&-c&list[]=x`.
///
/// Bare keys are `true`, `-key` is `false`. Values `true`/`false`/`null` and
/// numbers are typed; everything else stays a string.
pub fn parse_query(query: &str) -> Result<Map<String, Value>> {
    let query = query.strip_prefix('?').unwrap_or(query).trim();
    if query.is_empty() {
        return Ok(Map::new());
    }
    if query.starts_with('{') {
        return json5::from_str(query).context("invalid JSON loader query");
    }

    let mut map = Map::new();
    for pair in query.split(['&', ',']).filter(|pair| !pair.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (decode_component(key)?, query_value(&decode_component(value)?)),
            None => match pair.strip_prefix('-') {
                Some(key) => (decode_component(key)?, Value::Bool(false)),
                None => {
                    let key = pair.strip_prefix('+').unwrap_or(pair);
                    (decode_component(key)?, Value::Bool(true))
                }
            },
        };
        match key.strip_suffix("[]") {
            Some(list) => {
                let entry = map
                    .entry(list.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match entry {
                    Value::Array(items) => items.push(value),
                    _ => bail!("query key '{list}' used both as a list and a value"),
                }
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    Ok(map)
}

fn query_value(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(int) = text.parse::<i64>() {
                Value::Number(int.into())
            } else if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(number)
            } else {
                Value::String(text.to_string())
            }
        }
    }
}

/// Percent-decode one query component; `+` is a space.
fn decode_component(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text
                .get(i + 1..i + 3)
                .ok_or_else(|| anyhow!("truncated escape in query component '{text}'"))?;
            let byte = u8::from_str_radix(hex, 16)
                .with_context(|| format!("invalid escape '%{hex}' in query component"))?;
            out.push(byte);
            i += 3;
        } else if bytes[i] == b'+' {
            out.push(b' ');
            i += 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).context("query component is not UTF-8")
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub compiler_options: Option<CompilerOptions>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

/// tsconfig files are JSON with comments and trailing commas.
pub fn parse_tsconfig(source: &str) -> Result<TsConfig> {
    json5::from_str(source).context("failed to parse tsconfig JSON")
}

/// Load `path` and everything it extends, child options winning.
pub fn load_tsconfig(path: &Path) -> Result<TsConfig> {
    let mut visited = FxHashSet::default();
    load_tsconfig_inner(path, &mut visited)
}

fn load_tsconfig_inner(path: &Path, visited: &mut FxHashSet<PathBuf>) -> Result<TsConfig> {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        bail!("tsconfig extends cycle detected at {}", canonical.display());
    }

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tsconfig: {}", path.display()))?;
    let mut config = parse_tsconfig(&source)
        .with_context(|| format!("failed to parse tsconfig: {}", path.display()))?;

    if let Some(extends) = config.extends.take() {
        let base_path = resolve_extends_path(path, &extends)?;
        let base = load_tsconfig_inner(&base_path, visited)?;
        config = merge_configs(base, config);
    }

    visited.remove(&canonical);
    Ok(config)
}

/// Relative and absolute `extends` are files; anything else names a package
/// under `node_modules`.
fn resolve_extends_path(current_path: &Path, extends: &str) -> Result<PathBuf> {
    let base_dir = current_path
        .parent()
        .ok_or_else(|| anyhow!("tsconfig has no parent directory"))?;
    let mut candidate = PathBuf::from(extends);
    if candidate.extension().is_none() {
        candidate.set_extension("json");
    }

    if candidate.is_absolute() {
        return Ok(candidate);
    }
    if extends.starts_with('.') {
        return Ok(base_dir.join(candidate));
    }
    base_dir
        .ancestors()
        .map(|dir| dir.join("node_modules").join(&candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow!("cannot find tsconfig '{extends}' extended by {}", current_path.display()))
}

fn merge_configs(base: TsConfig, mut child: TsConfig) -> TsConfig {
    let compiler_options = match (base.compiler_options, child.compiler_options.take()) {
        (Some(mut base_opts), Some(child_opts)) => {
            base_opts.merge(&child_opts);
            Some(base_opts)
        }
        (base_opts, child_opts) => child_opts.or(base_opts),
    };

    TsConfig {
        extends: None,
        compiler_options,
        include: child.include.or(base.include),
        exclude: child.exclude.or(base.exclude),
        files: child.files.or(base.files),
    }
}

#[cfg(test)]
#[path = "../tests/config_tests.rs"]
mod config_tests;
