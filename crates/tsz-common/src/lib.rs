//! Common types and utilities for the tsz loader workspace.
//!
//! This crate provides foundational types shared by every tsz crate:
//! - Diagnostics reported by the compiler oracle (`Diagnostic`, `MessageChain`)
//! - Position/line-map types for turning byte offsets into line/character
//! - Path normalization and case-(in)sensitive path keys
//! - Centralized limits and defaults

// Diagnostics shared between the oracle, the worker and the loader
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, FormatError, MessageChain};

// Centralized limits and thresholds
pub mod limits;

// Position/line map types for line/column source locations
pub mod position;
pub use position::{LineMap, Position};

// Path normalization and file-system case handling
pub mod path;
pub use path::{PathCase, PathKey, is_declaration_file, normalize_path};
