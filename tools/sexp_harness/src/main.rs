use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use mission_sim::{
    load_runtime_config_from_env, notification_channel, HostScenario, Mission, MissionDefinition,
    MissionRuntime, RuntimeConfig, SaveStore, ScriptedHost,
};
use sexp_core::{
    validate, MissionOutcome, OperatorRegistry, Parser as FormulaParser, PersistenceSnapshot,
    VariableStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about="Runs a mission definition against a scripted host", long_about = None)]
struct Args {
    /// Path to mission definition JSON file
    #[arg(long)]
    mission: PathBuf,

    /// Host scenario JSON (defaults to <mission>.host.json next to the mission, if present)
    #[arg(long)]
    host: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(long, default_value_t = 60)]
    ticks: u32,

    /// Seconds between ticks (defaults to the runtime config value)
    #[arg(long)]
    step: Option<f64>,

    /// Pilot save to load persistent variables from and commit to
    #[arg(long, requires = "campaign")]
    pilot: Option<String>,

    /// Campaign save to load persistent variables from and commit to
    #[arg(long, requires = "pilot")]
    campaign: Option<String>,

    /// Override the save directory from the runtime config
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Parse and validate every formula, then exit without running
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let (config, metadata) = load_runtime_config_from_env();
    let config = match &args.save_dir {
        Some(dir) => Arc::new(RuntimeConfig {
            save_dir: dir.clone(),
            ..(*config).clone()
        }),
        None => config,
    };
    tracing::debug!(
        target: "sexp::harness",
        config_path = ?metadata.path(),
        "harness.config"
    );

    let definition = MissionDefinition::from_file(&args.mission)
        .with_context(|| format!("Failed to load mission at {}", args.mission.display()))?;
    let registry = OperatorRegistry::builtin();

    if args.check {
        return check(&definition, &registry, &config);
    }

    let store = SaveStore::from_config(&config);
    let persisted = match (&args.pilot, &args.campaign) {
        (Some(pilot), Some(campaign)) => store
            .snapshot_for(pilot, campaign)
            .with_context(|| format!("Failed to read saves for pilot '{pilot}'"))?,
        _ => PersistenceSnapshot::default(),
    };

    let mission = Mission::load(&definition, &registry, &config, &persisted)
        .with_context(|| format!("Mission '{}' failed to load", definition.name))?;
    let (sink, receiver) = notification_channel();
    let mut runtime = MissionRuntime::new(mission, registry, &config).with_sink(sink);

    let scenario = match resolve_host_path(&args.mission, args.host.as_deref()) {
        Some(path) => HostScenario::from_file(&path)
            .with_context(|| format!("Failed to load host scenario at {}", path.display()))?,
        None => HostScenario::default(),
    };
    let mut host = ScriptedHost::new(scenario, config.rng_seed);
    let step = args.step.unwrap_or(config.tick_seconds);

    for tick_index in 0..args.ticks {
        host.set_time(f64::from(tick_index) * step);
        let report = runtime.tick(&mut host);
        let notifications: Vec<_> = receiver.try_iter().collect();
        if !notifications.is_empty() {
            println!("=== tick {} (t={}) ===", tick_index, report.time);
            println!("{}", serde_json::to_string_pretty(&notifications)?);
        }
        if report.outcome != MissionOutcome::InProgress {
            break;
        }
    }

    let summary = runtime.finish();
    if let (Some(pilot), Some(campaign)) = (&args.pilot, &args.campaign) {
        store
            .commit(pilot, campaign, &summary)
            .with_context(|| "Failed to commit persistent variables")?;
    }

    println!("=== summary ===");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn check(
    definition: &MissionDefinition,
    registry: &OperatorRegistry,
    config: &RuntimeConfig,
) -> Result<()> {
    let mut variables = VariableStore::new();
    for variable in &definition.variables {
        variables
            .declare(
                &variable.name,
                variable.value_type,
                variable.default.clone(),
                variable.scope,
            )
            .with_context(|| format!("Invalid variable '{}'", variable.name))?;
    }
    let parser = FormulaParser::with_options(registry, config.parse_options());
    let formulas = definition
        .events
        .iter()
        .map(|event| (&event.name, &event.formula))
        .chain(definition.goals.iter().map(|goal| (&goal.name, &goal.formula)));

    let mut problems = 0usize;
    for (name, text) in formulas {
        match parser.parse(text) {
            Ok(formula) => {
                for issue in validate(name, &formula, registry, Some(&variables)) {
                    println!("{issue}");
                    problems += 1;
                }
            }
            Err(err) => {
                println!("{name}: {err}");
                problems += 1;
            }
        }
    }

    if problems > 0 {
        return Err(anyhow::anyhow!(
            "{problems} problem(s) in mission '{}'",
            definition.name
        ));
    }
    println!("mission '{}' is clean", definition.name);
    Ok(())
}

fn resolve_host_path(mission_path: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let stem = mission_path.file_stem()?.to_str()?;
    let sibling = mission_path.with_file_name(format!("{stem}.host.json"));
    sibling.exists().then_some(sibling)
}
