
use ignition::config::{BootConfig, Mode};
use ignition::phase::PhasePolicy;

const FULL_CONFIG: &str = r#"
mode = "production"

[logging]
level = "debug"
format = "json"

[settings]
retry_delay_base_ms = 100
slow_module_threshold_ms = 1500
max_boot_time_ms = 20000
probe_interval_ms = 50

[monitor]
enabled = true
interval_ms = 2000
memory_threshold_kb = 262144
error_threshold = 10

[[phases]]
name = "core"
policy = "blocking_required"
modules = ["store", "navigation"]

[[phases]]
name = "system"
policy = "blocking_degradable"
modules = ["demos"]

[[phases]]
name = "feature"
policy = "non_blocking"
modules = ["extras"]

[[modules]]
name = "store"
required = true
timeout_ms = 2000
max_retries = 1

[[modules]]
name = "navigation"
required = true
timeout_ms = 3000
max_retries = 2
fallback = "minimal_navigation"

[[modules]]
name = "demos"
timeout_ms = 2000
fallback = "static_placeholders"

[modules.sim]
available_after_ms = 20
init_duration_ms = 30

[[modules]]
name = "extras"
max_retries = 0

[modules.sim]
fail_always = true
"#;

#[test]
fn full_config_parses() {
    let config = BootConfig::parse_toml(FULL_CONFIG).unwrap();

    assert_eq!(config.mode, Mode::Production);
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.settings.retry_delay_base_ms, 100);
    assert_eq!(config.monitor.error_threshold, 10);

    assert_eq!(config.phases.len(), 3);
    assert_eq!(config.phases[2].policy, PhasePolicy::NonBlocking);

    let navigation = config.module("navigation").unwrap();
    assert_eq!(navigation.descriptor.max_retries, 2);
    assert_eq!(
        navigation.descriptor.fallback.as_deref(),
        Some("minimal_navigation")
    );

    let demos = config.module("demos").unwrap();
    let sim = demos.sim.as_ref().unwrap();
    assert_eq!(sim.available_after_ms, 20);
    assert_eq!(sim.init_duration_ms, 30);

    assert!(config.module("extras").unwrap().sim.as_ref().unwrap().fail_always);
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ignition.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let config = BootConfig::load(&path).unwrap();
    assert_eq!(config.phases.len(), 3);
}

#[test]
fn load_rejects_missing_file() {
    assert!(BootConfig::load("/definitely/not/here.toml").is_err());
}

#[test]
fn load_rejects_malformed_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "mode = ").unwrap();
    assert!(BootConfig::load(&path).is_err());
}
