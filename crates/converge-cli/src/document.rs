//! State documents on disk
//!
//! `.json` files are read as JSON, anything else as YAML.

use anyhow::Context;
use converge_state::{ExpectationStep, MatchReport, StateSnapshot};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Read and deserialize a YAML or JSON document
///
/// # Errors
/// Fails if the file cannot be read or does not parse as `T`.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&raw).map_err(anyhow::Error::from)
    } else {
        serde_yaml::from_str(&raw).map_err(anyhow::Error::from)
    };
    parsed.with_context(|| format!("parsing {}", path.display()))
}

/// Match an observed snapshot file against an expectation file
///
/// # Errors
/// Fails if either document cannot be loaded.
pub fn check_files(expected: &Path, observed: &Path) -> anyhow::Result<MatchReport> {
    let expected: ExpectationStep = load_document(expected)?;
    let observed: StateSnapshot = load_document(observed)?;
    Ok(expected.evaluate(&observed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_state::{ClientState, ComponentUnitKey, Mismatch};
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const EXPECTED: &str = r"
agent_state: healthy
strict_components:
  c1:
    state: healthy
    units:
      input/u1:
        state: healthy
";

    #[test]
    fn yaml_expectation_against_json_observation() {
        let dir = tempfile::tempdir().unwrap();
        let expected = write(&dir, "expected.yaml", EXPECTED);
        let observed = write(
            &dir,
            "observed.json",
            r#"{
                "agent": {"state": "healthy"},
                "components": {
                    "c1": {
                        "state": "healthy",
                        "units": {
                            "input/u1": {"state": "healthy"},
                            "output/o1": {"state": "healthy"}
                        }
                    }
                }
            }"#,
        );

        let report = check_files(&expected, &observed).unwrap();
        assert_eq!(
            report.mismatches(),
            &[Mismatch::UnexpectedUnit {
                component: "c1".to_string(),
                unit: ComponentUnitKey::output("o1"),
            }]
        );
    }

    #[test]
    fn matching_documents_report_no_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let expected = write(&dir, "expected.yml", EXPECTED);
        let observed = write(
            &dir,
            "observed.yml",
            "agent:\n  state: healthy\ncomponents:\n  c1:\n    state: healthy\n    units:\n      input/u1:\n        state: healthy\n        message: ok\n",
        );

        assert!(check_files(&expected, &observed).unwrap().is_match());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write(&dir, "broken.json", "{ not json");
        let err = load_document::<StateSnapshot>(&broken).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_document::<StateSnapshot>(Path::new("/nonexistent/state.yaml")).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }

    #[test]
    fn snapshot_without_components_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "agent.yaml", "agent:\n  state: healthy\n");
        let snapshot: StateSnapshot = load_document(&path).unwrap();
        assert_eq!(snapshot.agent.state, ClientState::Healthy);
    }
}
