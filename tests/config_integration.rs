use chat_sessions::config::AppConfig;
use serial_test::serial;
use std::env;
use std::fs;
use std::io::Write;
use std::time::Duration;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        for var in [
            "CHAT_SERVER__PORT",
            "CHAT_GATEWAY__DEFAULT_MODEL",
            "CONFIG_FILE",
            "BIND_HOST",
            "PORT",
            "DEFAULT_CHAT_MODEL_NAME",
            "GATEWAY_TIMEOUT_SECS",
            "GOOGLE_PROJECT_NAME",
            "GOOGLE_REGION",
            "GOOGLE_API_KEY",
        ] {
            env::remove_var(var);
        }
    }
}

fn load() -> AppConfig {
    AppConfig::load_from_args(["chat-sessions"]).expect("Failed to load config")
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = load();
    assert_eq!(config.server.port, 9797);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.gateway.provider, "google_ai");
    assert_eq!(config.gateway.timeout(), Duration::from_secs(120));
    assert!(config.gateway.default_model.is_none());
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("CHAT_SERVER__PORT", "9090");
        env::set_var("CHAT_GATEWAY__DEFAULT_MODEL", "gemini-from-prefix");
    }

    let config = load();
    assert_eq!(config.server.port, 9090);
    assert_eq!(
        config.gateway.default_model.as_deref(),
        Some("gemini-from-prefix")
    );

    clear_env_vars();
}

#[test]
#[serial]
fn test_legacy_env_and_flags() {
    clear_env_vars();
    unsafe {
        env::set_var("GOOGLE_PROJECT_NAME", "my-project");
        env::set_var("GOOGLE_REGION", "europe-west4");
        env::set_var("DEFAULT_CHAT_MODEL_NAME", "gemini-from-env");
        env::set_var("CHAT_GATEWAY__DEFAULT_MODEL", "gemini-from-prefix");
    }

    let config = load();
    assert_eq!(config.gateway.project.as_deref(), Some("my-project"));
    assert_eq!(config.gateway.region.as_deref(), Some("europe-west4"));
    // Named variables beat the prefixed layer
    assert_eq!(
        config.gateway.default_model.as_deref(),
        Some("gemini-from-env")
    );

    let config = AppConfig::load_from_args([
        "chat-sessions",
        "--port",
        "8123",
        "--default-model",
        "gemini-from-cli",
        "--timeout-secs",
        "5",
    ])
    .expect("Failed to load config");
    assert_eq!(config.server.port, 8123);
    assert_eq!(
        config.gateway.default_model.as_deref(),
        Some("gemini-from-cli")
    );
    assert_eq!(config.gateway.timeout(), Duration::from_secs(5));

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp config");
    writeln!(
        file,
        r#"
server:
  port: 7070
gateway:
  provider: vertex_ai
  project: file-project
  region: us-central1
  default_model: gemini-from-file
  system_instruction: Be brief.
"#
    )
    .expect("Failed to write temp config");

    let path = file.path().to_str().unwrap().to_string();
    let config =
        AppConfig::load_from_args(["chat-sessions", "--config", &path]).expect("Failed to load");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.gateway.provider, "vertex_ai");
    assert_eq!(
        config.gateway.default_model.as_deref(),
        Some("gemini-from-file")
    );
    assert_eq!(config.gateway.system_instruction.as_deref(), Some("Be brief."));

    // Environment still beats the file
    unsafe {
        env::set_var("CONFIG_FILE", &path);
        env::set_var("CHAT_SERVER__PORT", "7171");
    }
    assert_eq!(load().server.port, 7171);

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_fails() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["chat-sessions", "--config", "no-such-file.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let config_content = r"
server:
  port: 6060
    ";
    let cwd_path = "config.yaml";
    fs::write(cwd_path, config_content).expect("Failed to write ./config.yaml");

    let port = AppConfig::load_from_args(["chat-sessions"])
        .ok()
        .map(|c| c.server.port);

    let result = std::panic::catch_unwind(|| {
        assert_eq!(port, Some(6060));
    });

    fs::remove_file(cwd_path).unwrap();

    if let Err(e) = result {
        std::panic::resume_unwind(e);
    }
}
