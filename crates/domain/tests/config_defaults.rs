use std::time::Duration;

use vl_domain::config::Config;

#[test]
fn default_join_timeout_is_five_seconds() {
    let config = Config::default();
    assert_eq!(config.voice.join_timeout(), Duration::from_secs(5));
}

#[test]
fn default_single_shard() {
    let config = Config::default();
    assert_eq!(config.gateway.shard_count, 1);
}

#[test]
fn default_reconnect_policy() {
    let config = Config::default();
    assert_eq!(config.reconnect.max_attempts, 5);
    assert_eq!(config.reconnect.initial_delay(), Duration::from_secs(1));
    assert_eq!(config.reconnect.max_delay(), Duration::from_secs(60));
}

#[test]
fn partial_sections_parse() {
    let toml_str = r#"
[gateway]
shard_count = 16

[voice]
self_deaf = true
"#;
    let config = Config::from_toml_str(toml_str).unwrap();
    assert_eq!(config.gateway.shard_count, 16);
    assert!(config.voice.self_deaf);
    assert!(!config.voice.self_mute);
    assert_eq!(config.voice.join_timeout_secs, 5);
}

#[test]
fn reconnect_overrides_parse() {
    let toml_str = r#"
[reconnect]
max_attempts = 3
backoff_factor = 1.5
"#;
    let config = Config::from_toml_str(toml_str).unwrap();
    assert_eq!(config.reconnect.max_attempts, 3);
    assert!((config.reconnect.backoff_factor - 1.5).abs() < f64::EPSILON);
    assert_eq!(config.reconnect.initial_delay_ms, 1_000);
}

#[test]
fn malformed_toml_is_rejected() {
    assert!(Config::from_toml_str("[gateway]\nshard_count = \"many\"").is_err());
}
