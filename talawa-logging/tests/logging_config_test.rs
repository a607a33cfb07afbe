use talawa_config::domains::logging::{LogFormat, LogLevel};
use talawa_logging::{init_logging_from_config, init_simple_tracing, LoggingConfig};

#[test]
fn test_repeated_initialisation_is_harmless() {
    let config = LoggingConfig {
        level: LogLevel::Debug,
        format: LogFormat::Compact,
        directives: vec!["talawa_plugin=trace".to_string()],
        ..Default::default()
    };

    let guard = init_logging_from_config(&config).unwrap();
    assert_eq!(guard.file_targets(), 0);
    assert!(init_logging_from_config(&config).is_ok());
    assert!(init_simple_tracing("warn").is_ok());
}

#[test]
fn test_invalid_level_falls_back() {
    // An unparseable directive must not fail initialisation
    assert!(init_simple_tracing("not a [valid directive").is_ok());
}

#[test]
fn test_env_filter_from_config() {
    let config = LoggingConfig {
        level: LogLevel::Warn,
        ..Default::default()
    };
    let filter = talawa_logging::build_env_filter(&config);
    assert_eq!(filter.to_string(), "warn");
}
