//! `WorkerSession` request handling and the `serve` loop.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};
use tsz_common::{Diagnostic, PathCase};
use tsz_incremental::CompilerOptions;
use tsz_test_helpers::{CountingFileSystem, ScriptedOracle};
use tsz_worker::framing::{read_frame, write_frame};
use tsz_worker::{
    CheckerError, EmitFilePayload, EmitFileResponse, FileDeps, FormattedDiagnostic, InitPayload, Request,
    ResponseEnvelope, UpdateFilePayload, WorkerConfig, WorkerSession, serve,
};

fn init_payload(oracle: &ScriptedOracle, config: WorkerConfig) -> InitPayload {
    use tsz_incremental::CompilerOracle;
    InitPayload {
        compiler_info: oracle.info(),
        loader_config: config,
        compiler_config: CompilerOptions::new(),
        webpack_options: Value::Null,
    }
}

fn config() -> WorkerConfig {
    WorkerConfig {
        context: PathBuf::from("/proj"),
        path_case: Some(PathCase::Sensitive),
        ..WorkerConfig::default()
    }
}

fn session(fs: CountingFileSystem) -> (Arc<ScriptedOracle>, WorkerSession) {
    let oracle = Arc::new(ScriptedOracle::new(fs.clone()));
    let mut session = WorkerSession::new(oracle.clone(), Arc::new(fs));
    session
        .handle(Request::Init(init_payload(&oracle, config())))
        .unwrap();
    (oracle, session)
}

fn emit(session: &mut WorkerSession, file: &str, text: &str) -> EmitFileResponse {
    let value = session
        .handle(Request::EmitFile(EmitFilePayload {
            file_name: PathBuf::from(file),
            text: text.to_string(),
        }))
        .unwrap();
    serde_json::from_value(value).unwrap()
}

fn diagnostics(session: &mut WorkerSession) -> Vec<FormattedDiagnostic> {
    serde_json::from_value(session.handle(Request::Diagnostics).unwrap()).unwrap()
}

#[test]
fn test_requests_before_init_are_rejected() {
    let oracle = Arc::new(ScriptedOracle::default());
    let mut session = WorkerSession::new(oracle, Arc::new(CountingFileSystem::new()));
    assert!(matches!(
        session.handle(Request::Files),
        Err(CheckerError::NotInitialized)
    ));
    assert!(!session.is_initialized());
}

#[test]
fn test_emit_reports_dependencies() {
    let fs = CountingFileSystem::new()
        .with_file("/proj/src/b.ts", "/// <reference types=\"node\" />\nexport const b = 1;\n")
        .with_file("/node_modules/@types/node/index.d.ts", "declare module 'fs';\n");
    let (_oracle, mut session) = session(fs);

    let response = emit(
        &mut session,
        "/proj/src/a.ts",
        "import { b } from './b';\nexport const a = b;\n",
    );
    assert!(!response.fast_emit);
    assert!(response.compiled().unwrap().text.contains("export const a = b;"));
    assert_eq!(response.deps.dependencies, vec![PathBuf::from("/proj/src/b.ts")]);
    assert_eq!(
        response.deps.type_references,
        vec![PathBuf::from("/node_modules/@types/node/index.d.ts")]
    );
}

#[test]
fn test_emit_falls_back_to_transpile() {
    let (oracle, mut session) = session(CountingFileSystem::new());
    oracle.omit_output("/proj/src/a.ts");

    let response = emit(&mut session, "/proj/src/a.ts", "export const a = 1;");
    assert!(response.fast_emit);
    assert_eq!(response.compiled().unwrap().text, "export const a = 1;");
}

#[test]
fn test_syntax_errors_survive_the_transpile_fallback() {
    let (oracle, mut session) = session(CountingFileSystem::new());
    oracle.skip_emit("/proj/src/a.ts");
    oracle.on_syntactic(|file, text| {
        text.find("=>;")
            .map(|at| Diagnostic::error(file.to_string_lossy(), at as u32, 3, "Expression expected.", 1109))
            .into_iter()
            .collect()
    });

    let response = emit(&mut session, "/proj/src/a.ts", "export const a = 1;\nconst f = () =>;\n");
    assert!(response.fast_emit);
    let compiled = response.compiled().unwrap();
    assert!(compiled.text.contains("export const a = 1;"));

    let found = diagnostics(&mut session);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, 1109);
    assert!(found[0].is_error());
    assert_eq!(found[0].file, "src/a.ts");
    assert_eq!((found[0].line, found[0].character), (1, 13));
}

#[test]
fn test_register_file_reports_dependencies_without_emitting() {
    let fs = CountingFileSystem::new().with_file("/proj/src/b.ts", "export const b = 1;\n");
    let (oracle, mut session) = session(fs);

    let value = session
        .handle(Request::RegisterFile(EmitFilePayload {
            file_name: PathBuf::from("/proj/src/a.ts"),
            text: "import { b } from './b';\n".to_string(),
        }))
        .unwrap();
    let deps: FileDeps = serde_json::from_value(value).unwrap();
    assert_eq!(deps.dependencies, vec![PathBuf::from("/proj/src/b.ts")]);
    assert_eq!(oracle.build_calls(), 0);
    assert_eq!(oracle.transpile_calls(), 0);

    let state = session.state().unwrap();
    assert!(state.has_file(Path::new("/proj/src/b.ts")));
    assert!(state.is_valid(Path::new("/proj/src/a.ts")));
}

#[test]
fn test_transpile_only_skips_full_emit() {
    let fs = CountingFileSystem::new();
    let oracle = Arc::new(ScriptedOracle::new(fs.clone()));
    let mut session = WorkerSession::new(oracle.clone(), Arc::new(fs));
    let config = WorkerConfig {
        transpile_only: true,
        ..config()
    };
    session
        .handle(Request::Init(init_payload(&oracle, config)))
        .unwrap();

    let response = emit(&mut session, "/proj/src/a.ts", "export const a = 1;");
    assert!(response.fast_emit);
    assert_eq!(oracle.build_calls(), 0);
}

#[test]
fn test_update_if_exist_only_ignores_unknown_files() {
    let (_oracle, mut session) = session(CountingFileSystem::new());
    session
        .handle(Request::UpdateFile(UpdateFilePayload {
            file_name: PathBuf::from("/proj/src/x.ts"),
            text: "x".to_string(),
            if_exist_only: true,
        }))
        .unwrap();
    assert!(!session.state().unwrap().has_file(Path::new("/proj/src/x.ts")));

    session
        .handle(Request::UpdateFile(UpdateFilePayload {
            file_name: PathBuf::from("/proj/src/x.ts"),
            text: "x".to_string(),
            if_exist_only: false,
        }))
        .unwrap();
    let files: Vec<PathBuf> =
        serde_json::from_value(session.handle(Request::Files).unwrap()).unwrap();
    assert_eq!(files, vec![PathBuf::from("/proj/src/x.ts")]);
}

#[test]
fn test_diagnostics_follow_file_updates() {
    let (oracle, mut session) = session(CountingFileSystem::new());
    oracle.on_semantic(|file, text| {
        text.find("bad")
            .map(|at| Diagnostic::error(file.to_string_lossy(), at as u32, 3, "bad thing", 9999))
            .into_iter()
            .collect()
    });

    emit(&mut session, "/proj/src/a.ts", "let ok = 1;\nbad;\n");
    let found = diagnostics(&mut session);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file, "src/a.ts");
    assert_eq!((found[0].line, found[0].character), (1, 0));

    session
        .handle(Request::UpdateFile(UpdateFilePayload {
            file_name: PathBuf::from("/proj/src/a.ts"),
            text: "let ok = 1;\n".to_string(),
            if_exist_only: true,
        }))
        .unwrap();
    assert!(diagnostics(&mut session).is_empty());
}

#[test]
fn test_ignored_codes_and_lib_files_are_filtered() {
    let fs = CountingFileSystem::new();
    let oracle = Arc::new(ScriptedOracle::new(fs.clone()));
    let mut session = WorkerSession::new(oracle.clone(), Arc::new(fs));
    let mut payload = init_payload(
        &oracle,
        WorkerConfig {
            ignore_diagnostics: vec![1111],
            ..config()
        },
    );
    payload.compiler_config.set("skipLibCheck", true);
    session.handle(Request::Init(payload)).unwrap();

    oracle.on_semantic(|file, _| {
        vec![
            Diagnostic::error(file.to_string_lossy(), 0, 1, "ignored", 1111),
            Diagnostic::error(file.to_string_lossy(), 0, 1, "kept", 2222),
        ]
    });
    emit(&mut session, "/proj/src/a.ts", "export {};");
    session
        .handle(Request::UpdateFile(UpdateFilePayload {
            file_name: PathBuf::from("/proj/types.d.ts"),
            text: "declare const t: number;".to_string(),
            if_exist_only: false,
        }))
        .unwrap();

    let found = diagnostics(&mut session);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, 2222);
    assert_eq!(found[0].file, "src/a.ts");
}

#[test]
fn test_emit_failure_is_an_error_response() {
    let (oracle, mut session) = session(CountingFileSystem::new());
    oracle.skip_emit("/proj/src/a.ts");
    oracle.empty_transpile(true);

    let envelope = Request::EmitFile(EmitFilePayload {
        file_name: PathBuf::from("/proj/src/a.ts"),
        text: "export const a = 1;".to_string(),
    })
    .into_envelope(5)
    .unwrap();
    let response = session.handle_envelope(envelope);
    assert_eq!(response.seq, 5);
    assert!(!response.success);
    assert_eq!(response.payload["kind"], json!("EmitSkipped"));
}

#[test]
fn test_serve_answers_each_frame_with_matching_seq() {
    let fs = CountingFileSystem::new();
    let oracle = Arc::new(ScriptedOracle::new(fs.clone()));

    let mut input = Vec::new();
    let requests = vec![
        Request::Files.into_envelope(1).unwrap(),
        Request::Init(init_payload(&oracle, config()))
            .into_envelope(2)
            .unwrap(),
        Request::Files.into_envelope(3).unwrap(),
    ];
    for request in &requests {
        write_frame(&mut input, &serde_json::to_string(request).unwrap()).unwrap();
    }
    write_frame(&mut input, r#"{"seq": 4, "type": "Bogus"}"#).unwrap();

    let mut output = Vec::new();
    serve(oracle, Arc::new(fs), Cursor::new(input), &mut output).unwrap();

    let mut reader = Cursor::new(output);
    let mut responses = Vec::new();
    while let Some(message) = read_frame(&mut reader).unwrap() {
        responses.push(serde_json::from_str::<ResponseEnvelope>(&message).unwrap());
    }
    let summary: Vec<(u64, bool)> = responses.iter().map(|r| (r.seq, r.success)).collect();
    assert_eq!(summary, vec![(1, false), (2, true), (3, true), (4, false)]);
    assert_eq!(responses[0].payload["kind"], json!("NotInitialized"));
    assert_eq!(responses[2].payload, json!([]));
}
