//! Integration tests for talawa-config

use std::io::Write;
use std::path::PathBuf;
use talawa_config::domains::logging::{LogFormat, LogLevel};
use talawa_config::*;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = TalawaConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("TALAWA_PLUGIN_DIR", Some("/srv/plugins:/opt/plugins")),
        ("TALAWA_VERBOSE_PLUGIN_ERRORS", Some("true")),
        ("TALAWA_AUTO_INITIALIZE", Some("false")),
        ("TALAWA_LOG_LEVEL", Some("debug")),
        ("TALAWA_LOG_FORMAT", Some("json")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(
            config.plugins.plugin_dirs,
            vec![PathBuf::from("/srv/plugins"), PathBuf::from("/opt/plugins")]
        );
        assert!(config.plugins.verbose_errors);
        assert!(!config.plugins.auto_initialize);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn test_invalid_env_override() {
    with_vars(vec![("TALAWA_VERBOSE_PLUGIN_ERRORS", Some("sometimes"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("ADMIN_LOG_LEVEL", Some("trace"))], || {
        let config = ConfigLoader::with_prefix("ADMIN").from_env().unwrap();
        assert_eq!(config.logging.level, LogLevel::Trace);
    });
}

#[test]
fn test_yaml_config_file() {
    let yaml = r#"
plugins:
  plugin_dirs:
    - "./local-plugins"
  module_base_path: "/bundles"
  verbose_errors: true
  event_buffer_size: 32

logging:
  level: warn
  format: compact
  targets:
    - type: console
    - type: file
      path: "/var/log/talawa-admin.log"
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let vars = vec![
        ("TALAWA_LOG_LEVEL", None::<&str>),
        ("TALAWA_VERBOSE_PLUGIN_ERRORS", None),
        ("TALAWA_AUTO_INITIALIZE", None),
        ("TALAWA_PLUGIN_DIR", None),
    ];
    with_vars(vars, || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        assert_eq!(config.plugins.plugin_dirs, vec![PathBuf::from("./local-plugins")]);
        assert_eq!(config.plugins.module_base_path, "/bundles");
        assert!(config.plugins.verbose_errors);
        assert!(config.plugins.auto_initialize);
        assert_eq!(config.plugins.event_buffer_size, 32);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.logging.targets.len(), 2);
    });
}

#[test]
fn test_invalid_yaml_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"plugins:\n  module_base_path: \"relative\"\n")
        .unwrap();

    with_vars(vec![("TALAWA_VERBOSE_PLUGIN_ERRORS", None::<&str>)], || {
        let result = ConfigLoader::new().from_file(file.path());
        assert!(matches!(result, Err(ConfigError::DomainError { .. })));
    });
}

#[test]
fn test_sample_round_trip() {
    let sample = TalawaConfig::generate_sample();
    let parsed: TalawaConfig = serde_yaml::from_str(&sample).unwrap();
    assert!(parsed.validate_all().is_ok());
}
