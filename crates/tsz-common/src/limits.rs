//! Centralized limits and defaults for the loader workspace.
//!
//! Shared constants for protocol framing, diagnostic rendering and the
//! checker supervisor live here so the worker and the loader agree on them.

/// Maximum nesting depth of a chained diagnostic message.
///
/// Compiler message chains are trees; anything deeper than this is treated as
/// a corrupted chain and formatting fails instead of producing partial text.
pub const MAX_MESSAGE_CHAIN_DEPTH: usize = 64;

/// Largest protocol frame accepted from a peer (64 MiB).
///
/// A `Content-Length` header above this is rejected before any allocation.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Capacity of the bounded hand-off between the queued sender and the writer
/// thread. A full hand-off is the "channel busy" signal.
pub const WRITER_CHANNEL_CAPACITY: usize = 16;

/// Default window for coalescing diagnostics requests, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Default session name when the loader options do not name one.
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Default config file looked up from the build context directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "tsconfig.json";
