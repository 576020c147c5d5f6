use super::{Settings, load_config_from};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.sweep_interval_secs, 10);
    assert_eq!(settings.broker.default_ttl_secs, None);
    assert_eq!(settings.broker.max_pending_per_subscriber, None);
    assert_eq!(settings.broker.latency_window, 1000);
    assert_eq!(settings.broker.latency_budget_ms, 100.0);
    assert_eq!(settings.logging.level, "info");
}

#[test]
#[serial]
fn missing_file_yields_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent");

    let cfg = temp_env::with_vars_unset(
        [
            "AGENTMQ_BROKER__SWEEP_INTERVAL_SECS",
            "AGENTMQ_LOGGING__LEVEL",
        ],
        || load_config_from(path.to_str().unwrap()),
    )
    .expect("load_config failed");

    assert_eq!(cfg, Settings::default());
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("default.toml");
    let toml = r#"
        [broker]
        sweep_interval_secs = 3
        default_ttl_secs = 30.5
        max_pending_per_subscriber = 50

        [logging]
        level = "debug"
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.broker.sweep_interval_secs, 3);
    assert_eq!(cfg.broker.default_ttl_secs, Some(30.5));
    assert_eq!(cfg.broker.max_pending_per_subscriber, Some(50));
    // untouched keys keep their defaults
    assert_eq!(cfg.broker.latency_window, 1000);
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("default.toml");
    fs::write(&path, "[broker]\nsweep_interval_secs = 3\n").expect("write config file");

    let cfg = temp_env::with_vars(
        [
            ("AGENTMQ_BROKER__SWEEP_INTERVAL_SECS", Some("7")),
            ("AGENTMQ_LOGGING__LEVEL", Some("warn")),
        ],
        || load_config_from(path.to_str().unwrap()),
    )
    .expect("load_config failed");

    assert_eq!(cfg.broker.sweep_interval_secs, 7);
    assert_eq!(cfg.logging.level, "warn");
}

#[test]
#[serial]
fn zero_sweep_interval_is_rejected() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("default.toml");
    fs::write(&path, "[broker]\nsweep_interval_secs = 0\n").expect("write config file");

    assert!(load_config_from(path.to_str().unwrap()).is_err());
}

#[test]
#[serial]
fn non_positive_default_ttl_is_rejected() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("default.toml");

    for ttl in ["0.0", "-5.0", "nan", "inf"] {
        fs::write(&path, format!("[broker]\ndefault_ttl_secs = {ttl}\n"))
            .expect("write config file");
        let err = load_config_from(path.to_str().unwrap())
            .expect_err("default_ttl_secs should be rejected");
        assert!(err.to_string().contains("default_ttl_secs"), "{ttl}: {err}");
    }

    fs::write(&path, "[broker]\ndefault_ttl_secs = 0.5\n").expect("write config file");
    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.broker.default_ttl_secs, Some(0.5));
}
