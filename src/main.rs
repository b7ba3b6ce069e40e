use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use log::{error, info};

use mslt_composer::config::{ARTIFACT_PATH_KEY, ConfigurationTree, OUTPUT_PREFIX_KEY};
use mslt_composer::runner::{Simulation, parse_override, run_draws};
use mslt_composer::scheduler::RunState;
use mslt_composer::utils::logging::create_main_progress_bar;

#[derive(Parser, Debug)]
#[command(name = "mslt-run")]
#[command(about = "Compose and run multi-state life table simulations from a model specification")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulation to completion and write observer output
    Run(RunArgs),
    /// Parse, resolve and validate a model specification without running it
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct OverrideArgs {
    /// Path to the input data artifact
    #[arg(long)]
    artifact: Option<PathBuf>,

    /// Prefix for output files
    #[arg(long)]
    output_prefix: Option<PathBuf>,

    /// Configuration override, e.g. `--set population.population_size=220`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Disable configuration schema validation
    #[arg(long)]
    no_validate: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Model specification (YAML)
    spec: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,

    /// Run input draws 0..N concurrently
    #[arg(long)]
    draws: Option<u32>,

    /// Worker threads for concurrent draws (default: number of CPUs)
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Model specification (YAML)
    spec: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,

    /// Print the resolved configuration as JSON instead of YAML
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let outcome = match cli.command {
        Command::Run(args) => run(&args, cli.quiet),
        Command::Check(args) => check(&args),
    };

    match outcome {
        Ok(RunState::Completed) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Load the specification and apply command-line overrides
fn load_simulation(spec: &Path, args: &OverrideArgs) -> anyhow::Result<Simulation> {
    let mut overrides = ConfigurationTree::new();
    if let Some(artifact) = &args.artifact {
        overrides.set(ARTIFACT_PATH_KEY, artifact.to_string_lossy().into_owned());
    }
    if let Some(prefix) = &args.output_prefix {
        overrides.set(OUTPUT_PREFIX_KEY, prefix.to_string_lossy().into_owned());
    }
    for text in &args.overrides {
        let (key, value) =
            parse_override(text).with_context(|| format!("Invalid override '{text}'"))?;
        overrides.set(&key, value);
    }

    let simulation = Simulation::from_file(spec)
        .with_context(|| format!("Failed to load model specification {}", spec.display()))?
        .with_overrides(&overrides);
    Ok(if args.no_validate {
        simulation.without_validation()
    } else {
        simulation
    })
}

fn run(args: &RunArgs, quiet: bool) -> anyhow::Result<RunState> {
    let simulation = load_simulation(&args.spec, &args.overrides)?;

    if let Some(count) = args.draws {
        if count == 0 {
            bail!("--draws must be at least 1");
        }
        let draws: Vec<i64> = (0..i64::from(count)).collect();
        let outcomes = run_draws(&simulation, &draws, args.jobs, !quiet)?;
        let failed = outcomes
            .iter()
            .filter(|outcome| outcome.state() == RunState::Failed)
            .count();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(report) => info!(
                    "Draw {}: completed {} steps, wrote {} files",
                    outcome.draw,
                    report.summary.steps,
                    report.outputs.len()
                ),
                Err(e) => error!("Draw {}: {e}", outcome.draw),
            }
        }
        return Ok(if failed == 0 {
            RunState::Completed
        } else {
            error!("{failed} of {} draws failed", outcomes.len());
            RunState::Failed
        });
    }

    let simulation = if quiet {
        simulation
    } else {
        simulation.with_progress(create_main_progress_bar(0, Some("simulating")))
    };
    let report = simulation.run().context("Simulation failed")?;
    info!(
        "Completed {} steps (ended at {}); wrote {} files",
        report.summary.steps,
        report.summary.end_time,
        report.outputs.len()
    );
    for path in &report.outputs {
        println!("{}", path.display());
    }
    Ok(RunState::Completed)
}

fn check(args: &CheckArgs) -> anyhow::Result<RunState> {
    let simulation = load_simulation(&args.spec, &args.overrides)?;
    let config = simulation
        .resolve_configuration()
        .context("Configuration is invalid")?;

    println!("# components (execution order)");
    for spec in simulation.specification().ordered_components() {
        println!("#   {:<12} {}", spec.category, spec.declaration());
    }
    let rendered = if args.json {
        config.to_json_string()?
    } else {
        config.to_yaml_string()?
    };
    println!("{rendered}");
    Ok(RunState::Completed)
}
