//! Timeline-driven stand-in for a flight simulation. Ships arrive, die and
//! leave at scripted times; mission actions can override the script.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sexp_core::{names_match, GameContext, ShipStatus};
use thiserror::Error;

fn full_hull() -> f64 {
    100.0
}

fn arrive_at_start() -> Option<f64> {
    Some(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipScript {
    pub name: String,
    /// `None` holds the ship back until its wing is spawned.
    #[serde(default = "arrive_at_start")]
    pub arrive_at: Option<f64>,
    #[serde(default)]
    pub destroy_at: Option<f64>,
    #[serde(default)]
    pub depart_at: Option<f64>,
    #[serde(default = "full_hull")]
    pub hull: f64,
}

impl ShipScript {
    pub fn present(name: &str, hull: f64) -> Self {
        Self {
            name: name.to_string(),
            arrive_at: Some(0.0),
            destroy_at: None,
            depart_at: None,
            hull,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WingScript {
    pub name: String,
    pub ships: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostScenario {
    #[serde(default)]
    pub ships: Vec<ShipScript>,
    #[serde(default)]
    pub wings: Vec<WingScript>,
}

impl HostScenario {
    pub fn from_json_str(json: &str) -> Result<Self, HostScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, HostScenarioError> {
        let contents = fs::read_to_string(path).map_err(|source| HostScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}

#[derive(Debug, Error)]
pub enum HostScenarioError {
    #[error("failed to read host scenario from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse host scenario: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMessage {
    pub at: f64,
    pub persona: String,
    pub text: String,
}

#[derive(Debug, Clone)]
struct ShipTrack {
    script: ShipScript,
    destroyed_override: Option<f64>,
}

impl ShipTrack {
    fn status_at(&self, now: f64) -> ShipStatus {
        let reached = |at: Option<f64>| at.is_some_and(|at| at <= now);
        let destroyed_at = match (self.script.destroy_at, self.destroyed_override) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if !reached(self.script.arrive_at) {
            return ShipStatus::NotArrived;
        }
        match (destroyed_at.filter(|at| *at <= now), self.script.depart_at.filter(|at| *at <= now)) {
            (Some(destroyed), Some(departed)) if departed < destroyed => ShipStatus::Departed,
            (Some(_), _) => ShipStatus::Destroyed,
            (None, Some(_)) => ShipStatus::Departed,
            (None, None) => ShipStatus::Present,
        }
    }
}

/// Host game whose state is a pure function of the clock plus the overrides
/// applied by mission actions.
#[derive(Debug, Clone)]
pub struct ScriptedHost {
    time: f64,
    ships: Vec<ShipTrack>,
    wings: Vec<WingScript>,
    rng: SmallRng,
    messages: Vec<HostMessage>,
    spawned: Vec<String>,
}

impl ScriptedHost {
    pub fn new(scenario: HostScenario, seed: u64) -> Self {
        Self {
            time: 0.0,
            ships: scenario
                .ships
                .into_iter()
                .map(|script| ShipTrack {
                    script,
                    destroyed_override: None,
                })
                .collect(),
            wings: scenario.wings,
            rng: SmallRng::seed_from_u64(seed),
            messages: Vec::new(),
            spawned: Vec::new(),
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn advance(&mut self, seconds: f64) {
        self.time += seconds;
    }

    pub fn messages(&self) -> &[HostMessage] {
        &self.messages
    }

    pub fn spawned_wings(&self) -> &[String] {
        &self.spawned
    }

    fn ship(&self, name: &str) -> Option<&ShipTrack> {
        self.ships
            .iter()
            .find(|ship| names_match(&ship.script.name, name))
    }

    fn wing(&self, name: &str) -> Option<&WingScript> {
        self.wings
            .iter()
            .find(|wing| names_match(&wing.name, name))
    }

    fn wing_statuses(&self, name: &str) -> Option<Vec<ShipStatus>> {
        let wing = self.wing(name)?;
        Some(
            wing.ships
                .iter()
                .map(|member| {
                    self.ship_status(member)
                        .unwrap_or(ShipStatus::NotArrived)
                })
                .collect(),
        )
    }
}

impl GameContext for ScriptedHost {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn ship_status(&self, name: &str) -> Option<ShipStatus> {
        self.ship(name).map(|ship| ship.status_at(self.time))
    }

    fn ship_hull(&self, name: &str) -> Option<f64> {
        let ship = self.ship(name)?;
        (ship.status_at(self.time) == ShipStatus::Present).then_some(ship.script.hull)
    }

    fn wing_arrived(&self, name: &str) -> Option<bool> {
        self.wing_statuses(name)
            .map(|statuses| statuses.iter().any(|status| status.has_arrived()))
    }

    fn wing_destroyed_fraction(&self, name: &str) -> Option<f64> {
        let statuses = self.wing_statuses(name)?;
        if statuses.is_empty() {
            return Some(0.0);
        }
        let destroyed = statuses
            .iter()
            .filter(|status| **status == ShipStatus::Destroyed)
            .count();
        Some(destroyed as f64 / statuses.len() as f64)
    }

    fn send_message(&mut self, persona: &str, text: &str) {
        tracing::info!(target: "sexp::host", persona, text, at = self.time, "host.message");
        self.messages.push(HostMessage {
            at: self.time,
            persona: persona.to_string(),
            text: text.to_string(),
        });
    }

    fn spawn_wing(&mut self, name: &str) -> bool {
        let Some(wing) = self.wing(name).cloned() else {
            return false;
        };
        let now = self.time;
        let mut spawned_any = false;
        for ship in &mut self.ships {
            let member = wing
                .ships
                .iter()
                .any(|member| names_match(member, &ship.script.name));
            if member && ship.status_at(now) == ShipStatus::NotArrived {
                ship.script.arrive_at = Some(now);
                spawned_any = true;
            }
        }
        if spawned_any {
            tracing::debug!(target: "sexp::host", wing = %wing.name, at = now, "host.wing_spawned");
            self.spawned.push(wing.name);
        }
        spawned_any
    }

    fn destroy_ship(&mut self, name: &str) -> bool {
        let now = self.time;
        match self
            .ships
            .iter_mut()
            .find(|ship| names_match(&ship.script.name, name))
        {
            Some(ship) if ship.status_at(now) == ShipStatus::Present => {
                ship.destroyed_override = Some(now);
                true
            }
            _ => false,
        }
    }

    fn random_int(&mut self, low: i64, high: i64) -> i64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}
