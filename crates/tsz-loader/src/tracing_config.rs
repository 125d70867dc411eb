//! Tracing setup for hosts and checker workers.
//!
//! Output format is chosen with `TSZ_LOG_FORMAT`:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: indented spans via `tracing-tree`
//! - `json`: one JSON object per event
//!
//! ```bash
//! # Watch the checker protocol of a build
//! TSZ_LOG=tsz_worker=trace TSZ_LOG_FORMAT=tree <build command>
//!
//! # Instance lifecycle and cache activity only
//! TSZ_LOG="tsz_loader=debug" <build command>
//! ```
//!
//! Nothing is installed unless `TSZ_LOG` (or `RUST_LOG`) is set. Output always
//! goes to stderr: a checker worker's stdout is the protocol channel.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to [`LogFormat::Text`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var("TSZ_LOG_FORMAT").unwrap_or_default())
    }
}

/// `TSZ_LOG` wins over `RUST_LOG`; both use `RUST_LOG` syntax.
fn build_filter() -> EnvFilter {
    match std::env::var("TSZ_LOG") {
        Ok(val) => EnvFilter::builder().parse_lossy(val),
        Err(_) => EnvFilter::from_default_env(),
    }
}

/// Install the global subscriber. Returns `false` when logging was not
/// requested or a subscriber is already installed.
pub fn init_tracing() -> bool {
    let requested = std::env::var_os("TSZ_LOG").is_some() || std::env::var_os("RUST_LOG").is_some();
    if !requested {
        return false;
    }

    let filter = build_filter();
    match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::default()
                .with_writer(std::io::stderr)
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_deferred_spans(true)
                .with_targets(true);
            Registry::default().with(filter).with(tree_layer).try_init().is_ok()
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(json_layer).try_init().is_ok()
        }
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    }
}
