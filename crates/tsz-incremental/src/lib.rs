//! Incremental compilation state for the tsz loader.
//!
//! The compiler itself is an external capability (see [`oracle`]). This crate
//! keeps everything around it incremental:
//! - [`FileStore`]: versioned source text keyed by normalized path
//! - [`DependencyManager`]: per-file dependency edges and memoized resolutions
//! - [`FileAnalyzer`]: worklist-driven dependency discovery with validity flags
//! - [`CompilationState`]: the synchronization point between the store and the
//!   oracle's cached program

pub mod analyzer;
pub mod deps;
pub mod error;
pub mod file_store;
pub mod fs;
pub mod oracle;
pub mod state;

pub use analyzer::{AnalysisOutcome, AnalyzerEnv, FileAnalyzer, Validity};
pub use deps::{
    DependencyEdge, DependencyGraph, DependencyKind, DependencyManager, DependencySink, GraphNode,
};
pub use error::{IncrementalError, OracleError, Result};
pub use file_store::{FileStore, SourceFile};
pub use fs::{FileSystem, OsFileSystem};
pub use oracle::{
    CompilerInfo, CompilerOptions, CompilerOracle, EmitOutput, OutputFile, PreProcessedFile,
    Program, ProgramHost, ResolvedModule, ResolvedTypeReference, TranspileOutput,
};
pub use state::{CompilationState, CompiledOutput};
