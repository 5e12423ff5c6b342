#![allow(dead_code)]

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};

use mission_sim::{
    HostScenario, Mission, MissionDefinition, MissionRuntime, RuntimeConfig, ScriptedHost,
};
use sexp_core::{names_match, GameContext, OperatorRegistry, PersistenceSnapshot, ShipStatus};

static INIT: Once = Once::new();
static NEXT_SCRATCH: AtomicU32 = AtomicU32::new(0);

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture("test_runtime_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test runtime config at {}",
            config_path.display()
        );

        std::env::set_var(mission_sim::RUNTIME_CONFIG_ENV, &config_path);
    });
}

pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sexp_it_{label}_{}_{}",
        std::process::id(),
        NEXT_SCRATCH.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

pub fn convoy_definition() -> MissionDefinition {
    MissionDefinition::from_file(&fixture("convoy_mission.json")).expect("convoy mission fixture")
}

pub fn convoy_host(config: &RuntimeConfig) -> ScriptedHost {
    let scenario =
        HostScenario::from_file(&fixture("convoy_host.json")).expect("convoy host fixture");
    ScriptedHost::new(scenario, config.rng_seed)
}

pub fn start_mission(
    definition: &MissionDefinition,
    config: &Arc<RuntimeConfig>,
    persisted: &PersistenceSnapshot,
) -> MissionRuntime {
    let registry = OperatorRegistry::builtin();
    let mission =
        Mission::load(definition, &registry, config, persisted).expect("mission loads");
    MissionRuntime::new(mission, registry, config)
}

/// Ticks once per second from `0` through `last` inclusive.
pub fn run_seconds(runtime: &mut MissionRuntime, host: &mut ScriptedHost, last: u32) {
    for second in 0..=last {
        host.set_time(f64::from(second));
        runtime.tick(host);
    }
}

/// Game double that counts every call reaching it.
#[derive(Debug, Default)]
pub struct CountingGame {
    pub time: f64,
    pub destroyed: Vec<String>,
    pub queries: Cell<u32>,
    pub messages: Vec<(String, String)>,
    pub spawns: u32,
    pub destroys: u32,
    pub rolls: u32,
}

impl CountingGame {
    pub fn side_effects(&self) -> u32 {
        self.messages.len() as u32 + self.spawns + self.destroys + self.rolls
    }
}

impl GameContext for CountingGame {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn ship_status(&self, name: &str) -> Option<ShipStatus> {
        self.queries.set(self.queries.get() + 1);
        if self
            .destroyed
            .iter()
            .any(|ship| names_match(ship, name))
        {
            Some(ShipStatus::Destroyed)
        } else {
            Some(ShipStatus::Present)
        }
    }

    fn ship_hull(&self, name: &str) -> Option<f64> {
        self.queries.set(self.queries.get() + 1);
        (!self
            .destroyed
            .iter()
            .any(|ship| names_match(ship, name)))
        .then_some(100.0)
    }

    fn wing_arrived(&self, _name: &str) -> Option<bool> {
        self.queries.set(self.queries.get() + 1);
        Some(true)
    }

    fn wing_destroyed_fraction(&self, _name: &str) -> Option<f64> {
        self.queries.set(self.queries.get() + 1);
        Some(0.0)
    }

    fn send_message(&mut self, persona: &str, text: &str) {
        self.messages.push((persona.to_string(), text.to_string()));
    }

    fn spawn_wing(&mut self, _name: &str) -> bool {
        self.spawns += 1;
        true
    }

    fn destroy_ship(&mut self, name: &str) -> bool {
        self.destroys += 1;
        self.destroyed.push(name.to_string());
        true
    }

    fn random_int(&mut self, low: i64, _high: i64) -> i64 {
        self.rolls += 1;
        low
    }
}
