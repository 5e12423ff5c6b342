use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use mission_sim::{
    build_mission_app, run_tick, HostScenario, Mission, MissionDefinition, MissionRuntime,
    RuntimeConfig, ScriptedHost, ShipScript,
};
use sexp_core::{
    parse_formula, Env, Evaluator, MissionLedger, OperatorRegistry, PersistenceSnapshot,
    VariableStore,
};

const FORMULA: &str = "(and (or (is-destroyed \"Bandit 1\") (> (mission-time) 30)) \
    (not (has-departed \"Convoy\")) (>= (+ 1 2 3) (* 2 3)))";

fn mission_json(events: usize) -> String {
    let events: Vec<String> = (0..events)
        .map(|index| {
            format!(
                r#"{{ "name": "Wave {index}", "formula": "(has-time-elapsed {index})", "repeat_count": -1, "interval": 1 }}"#
            )
        })
        .collect();
    format!(
        r#"{{ "name": "Bench", "events": [{}], "goals": [
            {{ "name": "Hold", "formula": "(not (is-destroyed \"Convoy\"))" }}
        ] }}"#,
        events.join(",")
    )
}

fn host() -> ScriptedHost {
    ScriptedHost::new(
        HostScenario {
            ships: vec![
                ShipScript::present("Convoy", 100.0),
                ShipScript::present("Bandit 1", 80.0),
            ],
            wings: Vec::new(),
        },
        1,
    )
}

fn bench_evaluate(c: &mut Criterion) {
    let registry = OperatorRegistry::builtin();
    let formula = parse_formula(FORMULA, &registry).expect("bench formula parses");
    let evaluator = Evaluator::new(registry);
    let mut game = host();
    let mut variables = VariableStore::new();
    let mut ledger = MissionLedger::new();

    c.bench_function("evaluate_formula", |b| {
        b.iter(|| {
            let mut env = Env::new(&mut game, &mut variables, &mut ledger);
            evaluator.evaluate_formula("bench", &formula, &mut env)
        })
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("mission_tick");

    for events in [8usize, 32, 128] {
        group.bench_with_input(BenchmarkId::new("events", events), &events, |b, &events| {
            b.iter_batched(
                || {
                    let config = Arc::new(RuntimeConfig::default());
                    let registry = OperatorRegistry::builtin();
                    let definition =
                        MissionDefinition::from_json_str(&mission_json(events)).expect("bench mission");
                    let mission = Mission::load(
                        &definition,
                        &registry,
                        &config,
                        &PersistenceSnapshot::default(),
                    )
                    .expect("bench mission loads");
                    let runtime = MissionRuntime::new(mission, registry, &config);
                    build_mission_app(runtime, host(), config)
                },
                |mut app| {
                    run_tick(&mut app);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(eval_benches, bench_evaluate, bench_tick);
criterion_main!(eval_benches);
