use super::*;
use serde_json::json;

#[test]
fn test_defaults() {
    let config = LoaderConfig::resolve(&Value::Null, "").unwrap();
    assert_eq!(config.instance, "default");
    assert_eq!(config.config_file_name, "tsconfig.json");
    assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
    assert!(!config.fork_checker);
    assert!(!config.transpile_only);
    assert_eq!(config.send_policy, SendPolicy::platform_default());
}

#[test]
fn test_query_pairs_are_typed() {
    let query = parse_query("?transpileOnly&-silent&debounceMs=50&instance=at%2Dloader&ignoreDiagnostics[]=2345&ignoreDiagnostics[]=6133").unwrap();
    assert_eq!(query["transpileOnly"], json!(true));
    assert_eq!(query["silent"], json!(false));
    assert_eq!(query["debounceMs"], json!(50));
    assert_eq!(query["instance"], json!("at-loader"));
    assert_eq!(query["ignoreDiagnostics"], json!([2345, 6133]));
}

#[test]
fn test_plus_decodes_to_space_but_still_enables_bare_keys() {
    let query = parse_query("?configFileName=tsconfig+build.json&+silent&instance=a%2Bb").unwrap();
    assert_eq!(query["configFileName"], json!("tsconfig build.json"));
    assert_eq!(query["silent"], json!(true));
    assert_eq!(query["instance"], json!("a+b"));
}

#[test]
fn test_json_query() {
    let query = parse_query("?{instance: 'worker', reportFiles: ['src/**/*.ts'],}").unwrap();
    assert_eq!(query["instance"], json!("worker"));
    assert_eq!(query["reportFiles"], json!(["src/**/*.ts"]));
}

#[test]
fn test_bad_escape_is_rejected() {
    assert!(parse_query("?instance=%zz").is_err());
    assert!(parse_query("?instance=%2").is_err());
}

#[test]
fn test_query_wins_over_options() {
    let options = json!({
        "instance": "main",
        "silent": true,
        "compilerOptions": { "strict": true, "target": "es5" },
    });
    let config = LoaderConfig::resolve(&options, "?silent=false").unwrap();
    assert_eq!(config.instance, "main");
    assert!(!config.silent);

    let config = LoaderConfig::resolve(&options, r#"?{"compilerOptions": {"target": "es2020"}}"#).unwrap();
    assert_eq!(config.compiler_options.get("target"), Some(&json!("es2020")));
    assert_eq!(config.compiler_options.get("strict"), Some(&json!(true)));
}

#[test]
fn test_transpile_module_alias() {
    let config = LoaderConfig::resolve(&json!({ "useTranspileModule": true }), "").unwrap();
    assert!(config.transpile_only);
}

#[test]
fn test_unknown_value_types_are_errors() {
    assert!(LoaderConfig::resolve(&json!({ "debounceMs": "soon" }), "").is_err());
    assert!(LoaderConfig::resolve(&json!(["not", "an", "object"]), "").is_err());
}

#[test]
fn test_tsconfig_extends_chain() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.json"),
        "{\n  // shared\n  compilerOptions: { strict: true, target: 'es5', },\n  include: ['lib'],\n}\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("tsconfig.json"),
        r#"{ "extends": "./base", "compilerOptions": { "target": "es2020" } }"#,
    )
    .unwrap();

    let config = load_tsconfig(&dir.path().join("tsconfig.json")).unwrap();
    let options = config.compiler_options.unwrap();
    assert_eq!(options.get("target"), Some(&json!("es2020")));
    assert_eq!(options.get("strict"), Some(&json!(true)));
    assert_eq!(config.include, Some(vec!["lib".to_string()]));
    assert!(config.extends.is_none());
}

#[test]
fn test_tsconfig_extends_cycle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.json"), r#"{ "extends": "./b.json" }"#).unwrap();
    std::fs::write(dir.path().join("b.json"), r#"{ "extends": "./a.json" }"#).unwrap();

    let err = load_tsconfig(&dir.path().join("a.json")).unwrap_err();
    assert!(format!("{err:#}").contains("cycle"));
}

#[test]
fn test_tsconfig_extends_package() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("node_modules").join("@tsconfig").join("strictest");
    std::fs::create_dir_all(&package).unwrap();
    std::fs::write(package.join("tsconfig.json"), r#"{ "compilerOptions": { "strict": true } }"#).unwrap();
    let project = dir.path().join("app");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::write(
        project.join("tsconfig.json"),
        r#"{ "extends": "@tsconfig/strictest/tsconfig.json" }"#,
    )
    .unwrap();

    let config = load_tsconfig(&project.join("tsconfig.json")).unwrap();
    assert_eq!(config.compiler_options.unwrap().get("strict"), Some(&json!(true)));
}

#[test]
fn test_project_config_overlays_loader_options() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("tsconfig.json"),
        r#"{ "compilerOptions": { "strict": true, "skipLibCheck": false } }"#,
    )
    .unwrap();
    let config = LoaderConfig::resolve(&json!({ "compilerOptions": { "skipLibCheck": true } }), "").unwrap();

    let project = config.project_config(dir.path()).unwrap();
    assert_eq!(project.config_file, Some(dir.path().join("tsconfig.json")));
    assert!(project.compiler_options.skip_lib_check());
    assert!(project.compiler_options.get_bool("strict"));

    let empty = tempfile::tempdir().unwrap();
    let project = config.project_config(empty.path()).unwrap();
    assert!(project.config_file.is_none());
    assert!(project.compiler_options.skip_lib_check());
}
