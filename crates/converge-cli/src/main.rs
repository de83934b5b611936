//! `converge` command line

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use converge_cli::{check_files, init_tracing, load_document, run_scenario, Scenario};
use converge_core::DriverConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("converge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drive an agent through expected states and verify convergence")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run a scenario against the simulated agent")
                .arg(
                    Arg::new("scenario")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Scenario file (YAML)"),
                )
                .arg(
                    Arg::new("timeout-secs")
                        .long("timeout-secs")
                        .value_parser(value_parser!(u64))
                        .help("Upper bound for the whole run"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Driver configuration (TOML)"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Match an observed state document against an expectation")
                .arg(
                    Arg::new("expected")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Expectation step (YAML or JSON)"),
                )
                .arg(
                    Arg::new("observed")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Observed snapshot (YAML or JSON)"),
                ),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let outcome = match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("check", args)) => check(args),
        _ => Ok(false),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: &ArgMatches) -> anyhow::Result<bool> {
    let path = required_path(args, "scenario")?;
    let scenario: Scenario = load_document(path)?;

    let base = match args.get_one::<PathBuf>("config") {
        Some(config) => {
            let raw = std::fs::read_to_string(config)
                .with_context(|| format!("reading {}", config.display()))?;
            DriverConfig::from_toml_str(&raw)?
        }
        None => DriverConfig::new(),
    };
    let config = scenario.driver_config(base, args.get_one::<u64>("timeout-secs").copied());
    config.validate()?;

    match run_scenario(&scenario, config).await {
        Ok(report) => {
            for step in &report.steps {
                println!(
                    "step {}: converged after {} snapshot(s) in {:?}",
                    step.index, step.snapshots_seen, step.elapsed
                );
            }
            println!("PASSED: {} step(s) in {:?}", report.steps.len(), report.elapsed);
            Ok(true)
        }
        Err(err) => {
            println!("FAILED: {err}");
            Ok(false)
        }
    }
}

fn check(args: &ArgMatches) -> anyhow::Result<bool> {
    let expected = required_path(args, "expected")?;
    let observed = required_path(args, "observed")?;

    let report = check_files(expected, observed)?;
    println!("{report}");
    Ok(report.is_match())
}

fn required_path<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing argument <{name}>"))
}
