//! Wire types of the checker protocol.
//!
//! Outgoing: `{seq, type, payload}`. Incoming: `{seq, success, payload}`, where
//! a failed request carries an [`ErrorPayload`] as its payload.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tsz_common::PathCase;
use tsz_incremental::{CompiledOutput, CompilerInfo, CompilerOptions, EmitOutput};

use crate::error::CheckerError;
use crate::file_deps::FileDeps;

/// The slice of the loader configuration the worker needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    pub transpile_only: bool,
    pub ignore_diagnostics: Vec<u32>,
    pub report_files: Vec<String>,
    /// Diagnostic file names are reported relative to this directory.
    pub context: PathBuf,
    /// `None` means probe the file system.
    pub path_case: Option<PathCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub compiler_info: CompilerInfo,
    pub loader_config: WorkerConfig,
    pub compiler_config: CompilerOptions,
    /// Opaque bundler options, carried for the worker's oracle.
    #[serde(default)]
    pub webpack_options: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFilePayload {
    pub file_name: PathBuf,
    pub text: String,
    /// Only update files the worker already knows.
    #[serde(default)]
    pub if_exist_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFilePayload {
    pub file_name: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitFilePayload {
    pub file_name: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Init,
    UpdateFile,
    RemoveFile,
    EmitFile,
    RegisterFile,
    Diagnostics,
    Files,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Init(InitPayload),
    UpdateFile(UpdateFilePayload),
    RemoveFile(RemoveFilePayload),
    EmitFile(EmitFilePayload),
    /// Like `EmitFile` without the emit: the loader already has the output
    /// and only needs the file known and its dependencies.
    RegisterFile(EmitFilePayload),
    Diagnostics,
    Files,
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Init(_) => RequestKind::Init,
            Request::UpdateFile(_) => RequestKind::UpdateFile,
            Request::RemoveFile(_) => RequestKind::RemoveFile,
            Request::EmitFile(_) => RequestKind::EmitFile,
            Request::RegisterFile(_) => RequestKind::RegisterFile,
            Request::Diagnostics => RequestKind::Diagnostics,
            Request::Files => RequestKind::Files,
        }
    }

    pub fn into_envelope(self, seq: u64) -> Result<RequestEnvelope, serde_json::Error> {
        let kind = self.kind();
        let payload = match self {
            Request::Init(payload) => serde_json::to_value(payload)?,
            Request::UpdateFile(payload) => serde_json::to_value(payload)?,
            Request::RemoveFile(payload) => serde_json::to_value(payload)?,
            Request::EmitFile(payload) | Request::RegisterFile(payload) => {
                serde_json::to_value(payload)?
            }
            Request::Diagnostics | Request::Files => Value::Null,
        };
        Ok(RequestEnvelope { seq, kind, payload })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl RequestEnvelope {
    pub fn decode(self) -> Result<Request, serde_json::Error> {
        Ok(match self.kind {
            RequestKind::Init => Request::Init(serde_json::from_value(self.payload)?),
            RequestKind::UpdateFile => Request::UpdateFile(serde_json::from_value(self.payload)?),
            RequestKind::RemoveFile => Request::RemoveFile(serde_json::from_value(self.payload)?),
            RequestKind::EmitFile => Request::EmitFile(serde_json::from_value(self.payload)?),
            RequestKind::RegisterFile => {
                Request::RegisterFile(serde_json::from_value(self.payload)?)
            }
            RequestKind::Diagnostics => Request::Diagnostics,
            RequestKind::Files => Request::Files,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub seq: u64,
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
}

impl ResponseEnvelope {
    pub fn ok(seq: u64, payload: Value) -> Self {
        Self {
            seq,
            success: true,
            payload,
        }
    }

    pub fn error(seq: u64, err: &CheckerError) -> Self {
        let payload = ErrorPayload {
            message: err.to_string(),
            kind: err.kind().to_string(),
        };
        Self {
            seq,
            success: false,
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }

    /// The error a failed response stands for.
    pub fn into_error(self) -> CheckerError {
        match serde_json::from_value::<ErrorPayload>(self.payload) {
            Ok(payload) => CheckerError::Remote {
                kind: payload.kind,
                message: payload.message,
            },
            Err(_) => CheckerError::Remote {
                kind: "Unknown".to_string(),
                message: "checker reported a failure without details".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitFileResponse {
    pub output: EmitOutput,
    pub deps: FileDeps,
    pub fast_emit: bool,
}

impl EmitFileResponse {
    /// The JavaScript and source map in loader form, if anything was emitted.
    pub fn compiled(&self) -> Option<CompiledOutput> {
        let js = self.output.javascript()?;
        Some(CompiledOutput {
            text: js.text.clone(),
            source_map: self.output.source_map().map(|map| map.text.clone()),
            fast: self.fast_emit,
            diagnostics: Vec::new(),
        })
    }
}

#[cfg(test)]
#[path = "../tests/protocol_tests.rs"]
mod protocol_tests;
