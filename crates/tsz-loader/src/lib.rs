//! Bundler loader for incremental TypeScript compilation.
//!
//! A host calls [`load`] for every TypeScript module it bundles and the two
//! hooks around each pass: [`on_watch_run`] with the files that changed and
//! [`after_compile`] once the pass is done. Modules are compiled by a named
//! [`Instance`] that keeps an incremental compilation alive across passes,
//! either in-process or in a forked checker worker.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod instance;
pub mod loader;
pub mod registry;
pub mod tracing_config;

pub use cache::{CacheKey, CachedOutput, FsOutputCache, OutputCache};
pub use config::{LoaderConfig, ProjectConfig, TsConfig, load_tsconfig, parse_query, parse_tsconfig};
pub use context::BuildContext;
pub use error::{LoaderError, Result};
pub use hooks::{CompilationReport, after_compile, on_watch_run};
pub use instance::{CompiledModule, Instance};
pub use loader::{LoaderContext, LoaderOutput, load, strip_source_map_url};
pub use registry::{CheckerLauncher, OracleProvider, SessionRegistry};
pub use tracing_config::init_tracing;
