//! Test fixtures for the tsz loader crates.
//!
//! - [`ScriptedOracle`]: an in-memory compiler oracle whose diagnostics and
//!   emit behavior are scripted per test
//! - [`CountingFileSystem`]: an in-memory file system that counts reads
//! - [`pipe`]: an in-process byte pipe for wiring a checker client to a
//!   worker loop without spawning a process

mod fs;
mod oracle;
mod pipe;

pub use fs::CountingFileSystem;
pub use oracle::{DiagnosticRule, ScriptedOracle, ScriptedProgram};
pub use pipe::{PipeReader, PipeWriter, pipe};
