//! Worker side of the checker protocol.
//!
//! All worker state lives in one [`WorkerSession`]; [`serve`] is the request
//! loop around it.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info, trace, warn};
use tsz_common::PathCase;
use tsz_incremental::{
    CompilationState, CompiledOutput, CompilerOracle, EmitOutput, FileSystem, OsFileSystem,
    OutputFile,
};

use crate::diagnostics::{DiagnosticFilter, program_diagnostics};
use crate::error::CheckerError;
use crate::file_deps::{FileDeps, sync_file};
use crate::framing::{read_frame, write_frame};
use crate::protocol::{
    EmitFilePayload, EmitFileResponse, InitPayload, Request, RequestEnvelope, ResponseEnvelope,
    UpdateFilePayload, WorkerConfig,
};

struct Initialized {
    state: CompilationState,
    config: WorkerConfig,
    filter: DiagnosticFilter,
}

pub struct WorkerSession {
    oracle: Arc<dyn CompilerOracle>,
    fs: Arc<dyn FileSystem>,
    session: Option<Initialized>,
}

impl WorkerSession {
    pub fn new(oracle: Arc<dyn CompilerOracle>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            oracle,
            fs,
            session: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> Option<&CompilationState> {
        self.session.as_ref().map(|session| &session.state)
    }

    pub fn handle_envelope(&mut self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let seq = envelope.seq;
        let kind = envelope.kind;
        let result = envelope
            .decode()
            .map_err(CheckerError::from)
            .and_then(|request| self.handle(request));
        match result {
            Ok(payload) => ResponseEnvelope::ok(seq, payload),
            Err(err) => {
                debug!(seq, ?kind, error = %err, "request failed");
                ResponseEnvelope::error(seq, &err)
            }
        }
    }

    pub fn handle(&mut self, request: Request) -> Result<Value, CheckerError> {
        match request {
            Request::Init(payload) => self.handle_init(payload),
            Request::UpdateFile(payload) => self.initialized()?.handle_update_file(payload),
            Request::RemoveFile(payload) => self.initialized()?.handle_remove_file(&payload.file_name),
            Request::EmitFile(payload) => self.initialized()?.handle_emit_file(payload),
            Request::RegisterFile(payload) => self.initialized()?.handle_register_file(payload),
            Request::Diagnostics => self.initialized()?.handle_diagnostics(),
            Request::Files => Ok(serde_json::to_value(self.initialized()?.state.files().paths())?),
        }
    }

    fn initialized(&mut self) -> Result<&mut Initialized, CheckerError> {
        self.session.as_mut().ok_or(CheckerError::NotInitialized)
    }

    fn handle_init(&mut self, payload: InitPayload) -> Result<Value, CheckerError> {
        let info = self.oracle.info();
        if info != payload.compiler_info {
            warn!(
                worker = %format!("{} {}", info.name, info.version),
                loader = %format!("{} {}", payload.compiler_info.name, payload.compiler_info.version),
                "compiler mismatch between loader and checker"
            );
        }
        if self.session.is_some() {
            debug!("re-initializing checker session");
        }

        let config = payload.loader_config;
        let options = payload.compiler_config;
        let filter = DiagnosticFilter::new(
            options.skip_lib_check(),
            &config.report_files,
            &config.ignore_diagnostics,
            config.context.clone(),
        )?;
        let case = config.path_case.unwrap_or_else(PathCase::detect);
        let state = CompilationState::new(Arc::clone(&self.oracle), options, case)
            .with_file_system(Arc::clone(&self.fs));

        info!(compiler = %info.name, version = %info.version, "checker session initialized");
        self.session = Some(Initialized {
            state,
            config,
            filter,
        });
        Ok(Value::Null)
    }
}

impl Initialized {
    fn handle_update_file(&mut self, payload: UpdateFilePayload) -> Result<Value, CheckerError> {
        let file = payload.file_name;
        if payload.if_exist_only && !self.state.has_file(&file) {
            trace!(file = %file.display(), "update for unknown file ignored");
            return Ok(Value::Null);
        }
        if self.state.update_file(&file, &payload.text, true) {
            self.state.invalidate(&file);
            self.state.update_program();
        }
        Ok(Value::Null)
    }

    fn handle_remove_file(&mut self, file: &Path) -> Result<Value, CheckerError> {
        if self.state.remove_file(file) {
            self.state.update_program();
        }
        Ok(Value::Null)
    }

    fn handle_emit_file(&mut self, payload: EmitFilePayload) -> Result<Value, CheckerError> {
        let file = payload.file_name;
        sync_file(&mut self.state, &file, &payload.text)?;

        let compiled = self
            .state
            .emit_with_fallback(&file, self.config.transpile_only)?;
        let response = EmitFileResponse {
            output: emit_output_for(&file, &compiled),
            deps: FileDeps::collect(&self.state, &file),
            fast_emit: compiled.fast,
        };
        Ok(serde_json::to_value(response)?)
    }

    fn handle_register_file(&mut self, payload: EmitFilePayload) -> Result<Value, CheckerError> {
        let file = payload.file_name;
        sync_file(&mut self.state, &file, &payload.text)?;
        let deps = FileDeps::collect(&self.state, &file);
        trace!(file = %file.display(), deps = deps.dependencies.len(), "file registered");
        Ok(serde_json::to_value(deps)?)
    }

    fn handle_diagnostics(&mut self) -> Result<Value, CheckerError> {
        let formatted = program_diagnostics(&mut self.state, &self.filter, &self.config.context)?;
        debug!(count = formatted.len(), "diagnostics computed");
        Ok(serde_json::to_value(formatted)?)
    }
}

/// Wire form of a compiled file.
fn emit_output_for(file: &Path, compiled: &CompiledOutput) -> EmitOutput {
    let js_name = file.with_extension("js");
    let map_name = PathBuf::from(format!("{}.map", js_name.display()));
    let mut output_files = vec![OutputFile {
        name: js_name,
        text: compiled.text.clone(),
        write_byte_order_mark: false,
    }];
    if let Some(map) = &compiled.source_map {
        output_files.push(OutputFile {
            name: map_name,
            text: map.clone(),
            write_byte_order_mark: false,
        });
    }
    EmitOutput {
        output_files,
        emit_skipped: false,
    }
}

/// The `seq` of a message that failed to parse as a request, if it has one.
fn seq_hint(message: &str) -> u64 {
    serde_json::from_str::<Value>(message)
        .ok()
        .and_then(|value| value.get("seq")?.as_u64())
        .unwrap_or(0)
}

/// Answer requests from `reader` on `writer` until end of input.
pub fn serve<R: BufRead, W: Write>(
    oracle: Arc<dyn CompilerOracle>,
    fs: Arc<dyn FileSystem>,
    mut reader: R,
    mut writer: W,
) -> anyhow::Result<()> {
    let mut session = WorkerSession::new(oracle, fs);
    info!("checker worker ready");

    while let Some(message) = read_frame(&mut reader).context("failed to read checker request")? {
        if message.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<RequestEnvelope>(&message) {
            Ok(envelope) => session.handle_envelope(envelope),
            Err(err) => {
                warn!(error = %err, "invalid checker request");
                ResponseEnvelope::error(seq_hint(&message), &CheckerError::Json(err))
            }
        };
        let json = serde_json::to_string(&response)?;
        write_frame(&mut writer, &json).context("failed to write checker response")?;
    }

    info!("input closed, checker worker exiting");
    Ok(())
}

/// [`serve`] on the process's stdin/stdout with the real file system. Logs
/// must go to stderr; stdout carries the protocol.
pub fn serve_stdio(oracle: Arc<dyn CompilerOracle>) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(oracle, Arc::new(OsFileSystem), stdin.lock(), stdout.lock())
}
