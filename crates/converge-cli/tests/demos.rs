//! The shipped demo scenarios converge

use converge_cli::{load_document, run_scenario, Scenario};
use converge_core::DriverConfig;
use std::path::PathBuf;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

fn driver_config() -> DriverConfig {
    let raw = std::fs::read_to_string(demo("driver.toml")).unwrap();
    DriverConfig::from_toml_str(&raw).unwrap()
}

#[tokio::test(start_paused = true)]
async fn fake_component_demo_converges() {
    let scenario: Scenario = load_document(&demo("fake_component.yaml")).unwrap();
    let config = scenario.driver_config(driver_config(), None);

    let report = run_scenario(&scenario, config).await.unwrap();
    assert_eq!(report.steps.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn fake_non_grouped_demo_converges() {
    let scenario: Scenario = load_document(&demo("fake_non_grouped.yaml")).unwrap();
    let config = scenario.driver_config(driver_config(), None);

    let report = run_scenario(&scenario, config).await.unwrap();
    assert_eq!(report.steps.len(), 2);
}

#[test]
fn demo_driver_config_parses() {
    let config = driver_config();
    assert_eq!(config.run_timeout, std::time::Duration::from_secs(120));
    assert_eq!(config.step_timeout, Some(std::time::Duration::from_secs(60)));
    assert!(config.poll_interval.is_none());
}
