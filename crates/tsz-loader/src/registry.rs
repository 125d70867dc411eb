//! Creation and reuse of loader instances.
//!
//! The first request naming an instance builds it: tsconfig and inline
//! options are merged, an oracle is obtained from the [`OracleProvider`], and
//! a checker worker is started when `forkChecker` is set. Later requests, from
//! any build context of the same tree, get the same instance back.

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::Value;
use tracing::{debug, info};
use tsz_common::PathCase;
use tsz_incremental::{CompilationState, CompilerOptions, CompilerOracle, FileSystem, OsFileSystem};
use tsz_worker::{CheckerClient, CheckerError, InitPayload, WorkerCommand};

use crate::cache::{FsOutputCache, OutputCache};
use crate::config::LoaderConfig;
use crate::context::BuildContext;
use crate::error::{LoaderError, Result};
use crate::instance::Instance;

/// Supplies the compiler for a new instance.
pub trait OracleProvider: Send + Sync {
    fn oracle(
        &self,
        config: &LoaderConfig,
        options: &CompilerOptions,
    ) -> anyhow::Result<Arc<dyn CompilerOracle>>;
}

/// A single shared oracle for every instance.
impl<T: CompilerOracle + 'static> OracleProvider for Arc<T> {
    fn oracle(
        &self,
        _config: &LoaderConfig,
        _options: &CompilerOptions,
    ) -> anyhow::Result<Arc<dyn CompilerOracle>> {
        Ok(Arc::clone(self) as Arc<dyn CompilerOracle>)
    }
}

/// Starts a checker for an instance rooted at the given context directory.
pub type CheckerLauncher =
    Box<dyn Fn(&LoaderConfig, &Path) -> std::result::Result<CheckerClient, CheckerError> + Send + Sync>;

fn spawn_checker(config: &LoaderConfig, context: &Path) -> Result<CheckerClient> {
    let Some(program) = &config.checker_command else {
        return Err(LoaderError::Config(anyhow!(
            "forkChecker requires checkerCommand, the checker worker binary to run"
        )));
    };
    let command = WorkerCommand::new(program.clone())
        .args(config.checker_args.iter().cloned())
        .cwd(context);
    Ok(CheckerClient::spawn(command, config.send_policy)?)
}

pub struct SessionRegistry {
    provider: Box<dyn OracleProvider>,
    fs: Arc<dyn FileSystem>,
    /// `None` spawns `checkerCommand`.
    launcher: Option<CheckerLauncher>,
}

impl SessionRegistry {
    pub fn new(provider: impl OracleProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            fs: Arc::new(OsFileSystem),
            launcher: None,
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Replace how checker workers are started.
    pub fn with_checker_launcher(
        mut self,
        launcher: impl Fn(&LoaderConfig, &Path) -> std::result::Result<CheckerClient, CheckerError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.launcher = Some(Box::new(launcher));
        self
    }

    /// The instance named by `config`, created on first use. Lookups go to
    /// the root of `ctx`'s build tree.
    pub fn ensure_instance(
        &self,
        ctx: &BuildContext,
        config: &LoaderConfig,
        host_options: &Value,
    ) -> Result<Arc<Instance>> {
        let mut instances = ctx.instances().lock();
        if let Some(existing) = instances.get(&config.instance) {
            return Ok(Arc::clone(existing));
        }

        let instance = Arc::new(self.create_instance(config, host_options)?);
        instances.insert(config.instance.clone(), Arc::clone(&instance));
        info!(
            instance = %config.instance,
            context = ctx.name(),
            forked = instance.is_forked(),
            "loader instance created"
        );
        Ok(instance)
    }

    fn create_instance(&self, config: &LoaderConfig, host_options: &Value) -> Result<Instance> {
        let context = config.context_dir();
        let project = config
            .project_config(&context)
            .map_err(LoaderError::Config)?;
        if let Some(file) = &project.config_file {
            debug!(instance = %config.instance, tsconfig = %file.display(), "compiler options loaded");
        }
        let oracle = self
            .provider
            .oracle(config, &project.compiler_options)
            .map_err(LoaderError::Config)?;
        let case = config.path_case.unwrap_or_else(PathCase::detect);

        let checker = if config.fork_checker {
            let client = match &self.launcher {
                Some(launch) => launch(config, &context)?,
                None => spawn_checker(config, &context)?,
            };
            let mut loader_config = config.worker_config(&context);
            loader_config.path_case = Some(case);
            client
                .init(InitPayload {
                    compiler_info: oracle.info(),
                    loader_config,
                    compiler_config: project.compiler_options.clone(),
                    webpack_options: host_options.clone(),
                })
                .wait()?;
            Some(client)
        } else {
            None
        };

        let cache = config.use_cache.then(|| {
            Box::new(FsOutputCache::new(context.join(&config.cache_directory))) as Box<dyn OutputCache>
        });

        let state = CompilationState::new(oracle, project.compiler_options, case)
            .with_file_system(Arc::clone(&self.fs));
        Instance::new(
            config.instance.clone(),
            config.clone(),
            context,
            state,
            Arc::clone(&self.fs),
            checker,
            cache,
        )
    }
}
