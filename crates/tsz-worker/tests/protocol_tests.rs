use super::*;
use serde_json::json;

#[test]
fn test_envelope_shape() {
    let envelope = Request::UpdateFile(UpdateFilePayload {
        file_name: PathBuf::from("/src/a.ts"),
        text: "let a = 1;".to_string(),
        if_exist_only: true,
    })
    .into_envelope(7)
    .unwrap();

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({
            "seq": 7,
            "type": "UpdateFile",
            "payload": {"fileName": "/src/a.ts", "text": "let a = 1;", "ifExistOnly": true}
        })
    );
}

#[test]
fn test_payloadless_requests_decode() {
    let envelope: RequestEnvelope =
        serde_json::from_value(json!({"seq": 3, "type": "Diagnostics"})).unwrap();
    assert_eq!(envelope.decode().unwrap(), Request::Diagnostics);

    let files = Request::Files.into_envelope(4).unwrap();
    assert_eq!(
        serde_json::to_value(&files).unwrap(),
        json!({"seq": 4, "type": "Files"})
    );
}

#[test]
fn test_if_exist_only_defaults_to_false() {
    let envelope: RequestEnvelope = serde_json::from_value(json!({
        "seq": 1,
        "type": "UpdateFile",
        "payload": {"fileName": "/a.ts", "text": ""}
    }))
    .unwrap();
    match envelope.decode().unwrap() {
        Request::UpdateFile(payload) => assert!(!payload.if_exist_only),
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_unknown_type_is_rejected() {
    let result = serde_json::from_value::<RequestEnvelope>(json!({"seq": 1, "type": "Shutdown"}));
    assert!(result.is_err());
}

#[test]
fn test_error_response_roundtrip() {
    let response = ResponseEnvelope::error(9, &CheckerError::NotInitialized);
    assert!(!response.success);
    match response.into_error() {
        CheckerError::Remote { kind, message } => {
            assert_eq!(kind, "NotInitialized");
            assert!(message.contains("before Init"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_emit_response_to_compiled_output() {
    let response: EmitFileResponse = serde_json::from_value(json!({
        "output": {
            "outputFiles": [
                {"name": "/src/a.js", "text": "var a = 1;"},
                {"name": "/src/a.js.map", "text": "{}"}
            ],
            "emitSkipped": false
        },
        "deps": {"dependencies": ["/src/b.ts"], "typeReferences": []},
        "fastEmit": false
    }))
    .unwrap();

    let compiled = response.compiled().unwrap();
    assert_eq!(compiled.text, "var a = 1;");
    assert_eq!(compiled.source_map.as_deref(), Some("{}"));
    assert_eq!(response.deps.dependencies, vec![PathBuf::from("/src/b.ts")]);
}

#[test]
fn test_register_file_shares_the_emit_payload() {
    let envelope: RequestEnvelope = serde_json::from_value(json!({
        "seq": 2,
        "type": "RegisterFile",
        "payload": {"fileName": "/src/a.ts", "text": "import './b';"}
    }))
    .unwrap();
    assert_eq!(
        envelope.decode().unwrap(),
        Request::RegisterFile(EmitFilePayload {
            file_name: PathBuf::from("/src/a.ts"),
            text: "import './b';".to_string(),
        })
    );
}
