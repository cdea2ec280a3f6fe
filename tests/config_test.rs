//! Configuration Loading Tests
//!
//! Layered loading (env base, YAML override) and the validation gate that must
//! reject bad configuration before any build or deploy action begins.

use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use scribe_gateway::config::{ConfigError, GatewayConfig, ModelSize};

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
#[serial]
fn defaults_load_without_environment() {
    let config = GatewayConfig::from_env().unwrap();
    assert_eq!(config.port, 8080);
    assert!(config.gateway_enabled);
    assert_eq!(config.function.model_size, ModelSize::TinyEn);
    assert_eq!(config.plan.throttle_burst, 10);
}

#[test]
#[serial]
fn valid_model_size_is_accepted() {
    let file = yaml_file(
        r#"
function:
  model_size: "tiny.en"
"#,
    );
    let config = GatewayConfig::from_file(file.path()).unwrap();
    assert_eq!(config.function.model_size, ModelSize::TinyEn);
}

#[test]
#[serial]
fn unknown_model_size_is_rejected_at_validation_time() {
    // The rejection happens while loading configuration, before any pipeline
    // task could possibly run.
    let file = yaml_file(
        r#"
function:
  model_size: "huge"
"#,
    );
    let err = GatewayConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidModelSize { .. }));
    assert!(err.to_string().contains("huge"));
}

#[test]
#[serial]
fn yaml_overrides_environment() {
    std::env::set_var("SCRIBE_PORT", "9100");
    std::env::set_var("THROTTLE_RATE", "7");

    let file = yaml_file(
        r#"
server:
  port: 9200
"#,
    );
    let config = GatewayConfig::from_file(file.path()).unwrap();

    std::env::remove_var("SCRIBE_PORT");
    std::env::remove_var("THROTTLE_RATE");

    // YAML wins where it speaks; the environment fills the rest.
    assert_eq!(config.port, 9200);
    assert_eq!(config.plan.throttle_rate, 7);
}

#[test]
#[serial]
fn environment_keys_bind_to_active_plan() {
    std::env::set_var("API_KEYS", "client-a:abc123,client-b:def456");
    std::env::set_var("ACTIVE_PLAN", "prod");

    let config = GatewayConfig::from_env().unwrap();

    std::env::remove_var("API_KEYS");
    std::env::remove_var("ACTIVE_PLAN");

    assert_eq!(config.api_keys.len(), 2);
    assert!(config.api_keys.iter().all(|k| k.plan == "prod" && k.enabled));
    assert_eq!(config.keys_for_active_plan().count(), 2);
}

#[test]
#[serial]
fn invalid_env_value_is_rejected() {
    std::env::set_var("SCRIBE_PORT", "not-a-port");
    let result = GatewayConfig::from_env();
    std::env::remove_var("SCRIBE_PORT");
    assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
}

#[test]
#[serial]
fn gateway_toggle_parses_from_yaml() {
    let file = yaml_file(
        r#"
gateway:
  enabled: false
"#,
    );
    let config = GatewayConfig::from_file(file.path()).unwrap();
    assert!(!config.gateway_enabled);
}

#[test]
#[serial]
fn reserved_latest_version_tag_is_rejected() {
    let file = yaml_file(
        r#"
deploy:
  image_version: "latest"
"#,
    );
    assert!(matches!(
        GatewayConfig::from_file(file.path()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
#[serial]
fn zero_quota_is_rejected() {
    let file = yaml_file(
        r#"
plan:
  quota_limit: 0
"#,
    );
    assert!(GatewayConfig::from_file(file.path()).is_err());
}
