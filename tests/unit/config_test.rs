//! Tests for configuration validation and the parameter store

use grid_client::config::{Configuration, Parameter, SchedulerConfig, MAX_SLOTS};

#[test]
fn test_scheduler_config_defaults_are_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.slots, MAX_SLOTS);
    assert_eq!(config.recovery_delay_secs, 15);
    assert_eq!(config.recovery_max_tries, 4);
    assert_eq!(config.busy_retry_secs, 5);
    assert_eq!(config.upload_failure_limit, 10);
}

#[test]
fn test_scheduler_config_invalid_slots() {
    for slots in [0, MAX_SLOTS + 1] {
        let config = SchedulerConfig {
            slots,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err(), "slots = {slots}");
    }
}

#[test]
fn test_scheduler_config_invalid_delays() {
    let config = SchedulerConfig {
        busy_retry_secs: 0,
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());

    let config = SchedulerConfig {
        upload_failure_limit: 0,
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let config = SchedulerConfig::from_json_str(r#"{ "slots": 1, "busy_retry_secs": 2 }"#).unwrap();
    assert_eq!(config.slots, 1);
    assert_eq!(config.busy_retry_secs, 2);
    assert_eq!(config.recovery_max_tries, 4);

    assert!(SchedulerConfig::from_json_str(r#"{ "slots": 3 }"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_parameter_keys_round_trip() {
    for parameter in Parameter::ALL {
        assert_eq!(Parameter::from_key(parameter.key()), Some(parameter));
    }
    assert_eq!(Parameter::from_key("scheduler"), Some(Parameter::SchedulerUrl));
    assert_eq!(Parameter::from_key("no_such_key"), None);
}

#[test]
fn test_host_parameters_are_computed() {
    let dir = tempfile::tempdir().unwrap();
    let config = Configuration::new(dir.path());
    assert!(config.get_number(Parameter::HostCpuCount) >= 1.0);
    assert!(config.has_non_empty(Parameter::HostOsName));
    assert!(config.has_non_empty(Parameter::PlatformName));
}

#[test]
fn test_server_values_merge() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Configuration::new(dir.path());
    let applied = config.update_from_pairs([
        ("scheduler", "http://example.org/cgi"),
        ("user_name", "volunteer"),
        ("p_ncpus", "1024"),
        ("project_dir", "/elsewhere"),
        ("unknown", "ignored"),
    ]);
    assert_eq!(applied, 2);
    assert_eq!(
        config.get_text(Parameter::SchedulerUrl).as_deref(),
        Some("http://example.org/cgi")
    );
    assert_eq!(config.project_directory(), dir.path());
    assert_ne!(config.get_text(Parameter::HostCpuCount).as_deref(), Some("1024"));
}

#[test]
fn test_configuration_requires_http_project_url() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Configuration::new(dir.path());
    assert!(config.validate().is_err());
    config.set_text(Parameter::ProjectUrl, "ftp://example.org").unwrap();
    assert!(config.validate().is_err());
    config.set_text(Parameter::ProjectUrl, "https://example.org/project").unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_slot_directories_live_under_project() {
    let dir = tempfile::tempdir().unwrap();
    let config = Configuration::new(dir.path());
    assert_eq!(config.slot_directory(1), dir.path().join("1"));
}

#[test]
fn test_number_formatting() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Configuration::new(dir.path());
    config.set_number(Parameter::TotalWorkUnits, 12.0).unwrap();
    assert_eq!(config.get_text(Parameter::TotalWorkUnits).as_deref(), Some("12"));
    config.set_number(Parameter::TotalCredit, 3.5).unwrap();
    assert_eq!(config.get_number(Parameter::TotalCredit), 3.5);
}
