//! Checker worker protocol.
//!
//! The build process keeps a [`CheckerClient`] connected to a worker process
//! that owns its own compilation state. Messages are `Content-Length` framed
//! JSON ([`framing`]); every request carries a sequence number and the
//! matching response echoes it, so many requests can be in flight at once.
//!
//! The worker side is [`serve`]: any binary that links a concrete compiler
//! oracle becomes a checker worker by calling it on stdin/stdout.

pub mod client;
pub mod debounce;
pub mod diagnostics;
pub mod error;
pub mod file_deps;
pub mod framing;
pub mod protocol;
pub mod queued_sender;
pub mod server;

pub use client::{CheckerClient, Connector, PendingReply, Transport, WorkerCommand};
pub use debounce::DiagnosticsDebouncer;
pub use diagnostics::{
    DiagnosticFilter, FormattedDiagnostic, collect_diagnostics, format_diagnostic,
    program_diagnostics,
};
pub use error::CheckerError;
pub use file_deps::{FileDeps, sync_file};
pub use protocol::{
    EmitFilePayload, EmitFileResponse, ErrorPayload, InitPayload, RemoveFilePayload, Request,
    RequestEnvelope, RequestKind, ResponseEnvelope, UpdateFilePayload, WorkerConfig,
};
pub use queued_sender::{QueuedSender, SendPolicy};
pub use server::{WorkerSession, serve, serve_stdio};
