//! Host and worker stand-ins shared by the loader integration tests.
#![allow(dead_code)]

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use serde_json::{Value, json};
use tsz_common::Diagnostic;
use tsz_loader::{BuildContext, LoaderConfig, LoaderContext};
use tsz_test_helpers::{CountingFileSystem, ScriptedOracle, pipe};
use tsz_worker::{CheckerClient, CheckerError, Transport, serve};

pub const MATH: &str = "export function sum(a: number, b: number): number {\n  return a + b;\n}\n";
pub const INDEX: &str = "import { sum } from './math';\nexport const total = sum('x', 1);\n";
pub const MATH_PATH: &str = "/proj/src/math.ts";
pub const INDEX_PATH: &str = "/proj/src/index.ts";

/// One module request as the host would issue it.
pub struct Module<'a> {
    ctx: &'a BuildContext,
    path: PathBuf,
    query: String,
    options: Value,
    pub deps: Vec<PathBuf>,
}

impl<'a> Module<'a> {
    pub fn new(ctx: &'a BuildContext, path: &str, options: Value) -> Self {
        Self {
            ctx,
            path: PathBuf::from(path),
            query: String::new(),
            options,
            deps: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }
}

impl LoaderContext for Module<'_> {
    fn resource_path(&self) -> &Path {
        &self.path
    }

    fn query(&self) -> &str {
        &self.query
    }

    fn options(&self) -> &Value {
        &self.options
    }

    fn build_context(&self) -> &BuildContext {
        self.ctx
    }

    fn add_dependency(&mut self, path: &Path) {
        self.deps.push(path.to_path_buf());
    }
}

/// Loader options rooted at `/proj` with no debounce delay, overlaid with
/// `extra`.
pub fn options(extra: Value) -> Value {
    let mut base = json!({
        "context": "/proj",
        "pathCase": "sensitive",
        "debounceMs": 0,
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut base, extra) {
        base.extend(extra);
    }
    base
}

pub fn project_fs() -> CountingFileSystem {
    CountingFileSystem::new().with_file(MATH_PATH, MATH)
}

/// Report TS2345 for a string passed to `sum`.
pub fn add_sum_rule(oracle: &ScriptedOracle) {
    oracle.on_semantic(|file, text| {
        text.find("sum('x'")
            .map(|at| {
                Diagnostic::error(
                    file.to_string_lossy(),
                    (at + "sum(".len()) as u32,
                    3,
                    "Argument of type 'string' is not assignable to parameter of type 'number'.",
                    2345,
                )
            })
            .into_iter()
            .collect()
    });
}

/// A worker thread running `serve` over in-process pipes.
pub fn serve_in_process(oracle: Arc<ScriptedOracle>, fs: CountingFileSystem) -> Transport {
    let (client_writer, server_reader) = pipe();
    let (server_writer, client_reader) = pipe();
    thread::spawn(move || serve(oracle, Arc::new(fs), BufReader::new(server_reader), server_writer));
    Transport {
        reader: Box::new(client_reader),
        writer: Box::new(client_writer),
        child: None,
    }
}

/// Checker launcher whose workers run in-process.
pub fn in_process_launcher(
    oracle: Arc<ScriptedOracle>,
    fs: CountingFileSystem,
) -> impl Fn(&LoaderConfig, &Path) -> Result<CheckerClient, CheckerError> + Send + Sync + 'static {
    move |config, _context| {
        let oracle = Arc::clone(&oracle);
        let fs = fs.clone();
        CheckerClient::with_connector(
            Box::new(move || Ok(serve_in_process(Arc::clone(&oracle), fs.clone()))),
            config.send_policy,
        )
    }
}
