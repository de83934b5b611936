//! End-to-end runs against the simulated agent

use converge_core::{
    AgentFixture, DriverConfig, FailureKind, SequenceDriver, SimulatedAgent, SimulatorConfig, Step,
};
use converge_state::{ClientState, ComponentUnitKey, ExpectationStep, Mismatch};
use converge_test_utils::{component, healthy_component};
use std::sync::Arc;
use std::time::Duration;

const GROUPED_CONFIGURING: &str = r"
outputs:
  default:
    type: fake-action-output
    shipper.enabled: true
inputs:
  - id: fake
    type: fake
    state: 1
    message: Configuring
";

const GROUPED_HEALTHY: &str = r"
outputs:
  default:
    type: fake-action-output
    shipper.enabled: true
inputs:
  - id: fake
    type: fake
    state: 2
    message: Healthy
";

const SINGLE_NON_GROUPED: &str = r"
outputs:
  default:
    type: fake-action-output
inputs:
  - id: fake-non-grouped
    type: fake-non-grouped
    state: 1
    message: Configuring
";

const TWO_NON_GROUPED: &str = r"
outputs:
  default:
    type: fake-action-output
inputs:
  - id: fake-non-grouped-0
    type: fake-non-grouped
    state: 2
    message: Healthy
  - id: fake-non-grouped-1
    type: fake-non-grouped
    state: 2
    message: Healthy
";

fn simulator() -> Arc<SimulatedAgent> {
    Arc::new(SimulatedAgent::new(
        SimulatorConfig::new()
            .with_transition_delay(Duration::from_millis(250))
            .with_shipper_delay(Duration::from_millis(500))
            .with_jitter(Duration::from_millis(100), 42),
    ))
}

fn fake_components() -> Vec<String> {
    vec!["fake".to_string(), "fake-shipper".to_string()]
}

fn grouped_steps() -> Vec<Step> {
    let configuring = ExpectationStep::new(GROUPED_CONFIGURING, ClientState::Healthy).with_component(
        "fake-default",
        component(
            ClientState::Healthy,
            &[
                (ComponentUnitKey::output("fake-default"), ClientState::Healthy),
                (ComponentUnitKey::input("fake-default-fake"), ClientState::Configuring),
            ],
        ),
    );
    let healthy = ExpectationStep::new(GROUPED_HEALTHY, ClientState::Healthy)
        .with_strict_component(
            "fake-default",
            healthy_component(&[
                ComponentUnitKey::output("fake-default"),
                ComponentUnitKey::input("fake-default-fake"),
            ]),
        )
        .with_strict_component(
            "fake-shipper-default",
            healthy_component(&[
                ComponentUnitKey::output("fake-shipper-default"),
                ComponentUnitKey::input("fake-default"),
            ]),
        );
    vec![Step::new(configuring), Step::new(healthy)]
}

#[tokio::test(start_paused = true)]
async fn grouped_component_with_shipper_converges() {
    let agent = simulator();
    let driver = SequenceDriver::new(agent.clone(), DriverConfig::new());
    let ctx = driver.context();

    driver.prepare(&ctx, &fake_components()).await.unwrap();
    let report = driver.run(&ctx, &grouped_steps()).await.unwrap();

    assert_eq!(report.steps.len(), 2);
    let last = agent.snapshot().unwrap();
    assert_eq!(
        last.components.keys().cloned().collect::<Vec<_>>(),
        vec!["fake-default".to_string(), "fake-shipper-default".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn grouped_component_converges_when_polled() {
    let agent = simulator();
    let config = DriverConfig::new().with_poll_interval(Duration::from_millis(100));
    let driver = SequenceDriver::new(agent, config);
    let ctx = driver.context();

    driver.prepare(&ctx, &fake_components()).await.unwrap();
    driver.run(&ctx, &grouped_steps()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn non_grouped_components_converge() {
    let agent = simulator();
    let driver = SequenceDriver::new(agent, DriverConfig::new());
    let ctx = driver.context();

    let single = ExpectationStep::new(SINGLE_NON_GROUPED, ClientState::Healthy).with_component(
        "fake-non-grouped-default-fake-non-grouped",
        component(
            ClientState::Healthy,
            &[
                (ComponentUnitKey::output("fake-action-output"), ClientState::Healthy),
                (
                    ComponentUnitKey::input("fake-non-grouped-default-fake-non-grouped-unit"),
                    ClientState::Configuring,
                ),
            ],
        ),
    );
    let pair = ["0", "1"]
        .iter()
        .fold(
            ExpectationStep::new(TWO_NON_GROUPED, ClientState::Healthy),
            |step, n| {
                let name = format!("fake-non-grouped-default-fake-non-grouped-{n}");
                let unit = ComponentUnitKey::input(format!("{name}-unit"));
                step.with_component(
                    name,
                    healthy_component(&[ComponentUnitKey::output("fake-action-output"), unit]),
                )
            },
        );

    driver.prepare(&ctx, &fake_components()).await.unwrap();
    let report = driver
        .run(&ctx, &[Step::new(single), Step::new(pair)])
        .await
        .unwrap();
    assert_eq!(report.steps.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_shipper_binary_times_out_with_diagnostic() {
    let agent = simulator();
    let config = DriverConfig::new().with_run_timeout(Duration::from_secs(30));
    let driver = SequenceDriver::new(agent, config);
    let ctx = driver.context();

    driver.prepare(&ctx, &["fake".to_string()]).await.unwrap();
    let err = driver.run(&ctx, &grouped_steps()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Timeout);
    assert_eq!(err.step(), Some(1));
    let diagnostic = err.diagnostic().unwrap();
    assert!(diagnostic.mismatches().contains(&Mismatch::ComponentState {
        component: "fake-shipper-default".to_string(),
        expected: ClientState::Healthy,
        observed: ClientState::Failed,
    }));
}

#[tokio::test(start_paused = true)]
async fn invalid_policy_fails_the_push() {
    let agent = simulator();
    agent.prepare(&fake_components()).await.unwrap();
    let driver = SequenceDriver::new(agent, DriverConfig::new());
    let ctx = driver.context();

    let step = ExpectationStep::new("inputs: [", ClientState::Healthy);
    let err = driver.run(&ctx, &[Step::new(step)]).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ConfigPush);
    assert_eq!(err.step(), Some(0));
}
