use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::MAX_MESSAGE_CHAIN_DEPTH;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

impl DiagnosticCategory {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "message",
        }
    }
}

/// A possibly nested compiler message.
///
/// The compiler reports elaborations ("Type 'x' is not assignable to ...")
/// as children of the headline message. Rendering walks the tree depth-first
/// and indents each level by two spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChain {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<MessageChain>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("diagnostic message chain exceeds {limit} levels")]
    ChainTooDeep { limit: usize },
}

impl MessageChain {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next: Vec::new(),
        }
    }

    pub fn with_next(mut self, next: MessageChain) -> Self {
        self.next.push(next);
        self
    }

    /// Flatten the chain into a single string.
    ///
    /// Fails when the chain is deeper than [`MAX_MESSAGE_CHAIN_DEPTH`]; a
    /// truncated message would hide the actual cause of the error.
    pub fn flatten(&self) -> Result<String, FormatError> {
        let mut out = String::new();
        let mut stack: Vec<(&MessageChain, usize)> = vec![(self, 0)];

        while let Some((chain, depth)) = stack.pop() {
            if depth > MAX_MESSAGE_CHAIN_DEPTH {
                return Err(FormatError::ChainTooDeep {
                    limit: MAX_MESSAGE_CHAIN_DEPTH,
                });
            }
            if depth > 0 {
                out.push('\n');
                for _ in 0..depth {
                    out.push_str("  ");
                }
            }
            out.push_str(&chain.text);
            // Reverse so children pop in declaration order.
            for child in chain.next.iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        Ok(out)
    }
}

impl From<&str> for MessageChain {
    fn from(text: &str) -> Self {
        MessageChain::new(text)
    }
}

impl From<String> for MessageChain {
    fn from(text: String) -> Self {
        MessageChain::new(text)
    }
}

/// A diagnostic as produced by the compiler oracle.
///
/// `file` is empty for global and options diagnostics; `start`/`length` are
/// byte offsets into the file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message: MessageChain,
}

impl Diagnostic {
    pub fn error(
        file: impl Into<String>,
        start: u32,
        length: u32,
        message: impl Into<MessageChain>,
        code: u32,
    ) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            code,
            file: file.into(),
            start,
            length,
            message: message.into(),
        }
    }

    /// A diagnostic not attached to any file (options / global).
    pub fn global(category: DiagnosticCategory, message: impl Into<MessageChain>, code: u32) -> Self {
        Self {
            category,
            code,
            file: String::new(),
            start: 0,
            length: 0,
            message: message.into(),
        }
    }

    pub fn has_file(&self) -> bool {
        !self.file.is_empty()
    }
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod diagnostics_tests;
