//! In-memory game used by the unit tests of this crate.

use std::collections::HashMap;

use crate::context::{GameContext, ShipStatus};
use crate::eval::{Env, Evaluator};
use crate::ledger::{name_key, MissionLedger};
use crate::parser::parse_formula;
use crate::registry::OperatorRegistry;
use crate::value::Value;
use crate::variables::VariableStore;

#[derive(Debug, Default)]
pub struct StubGame {
    pub time: f64,
    pub ships: HashMap<String, (ShipStatus, f64)>,
    pub wings: HashMap<String, (bool, f64)>,
    pub messages: Vec<(String, String)>,
    pub spawned: Vec<String>,
    pub next_random: i64,
}

impl StubGame {
    pub fn with_ship(mut self, name: &str, status: ShipStatus, hull: f64) -> Self {
        self.ships.insert(name_key(name), (status, hull));
        self
    }

    pub fn set_ship(&mut self, name: &str, status: ShipStatus) {
        let hull = if status == ShipStatus::Destroyed { 0.0 } else { 100.0 };
        self.ships.insert(name_key(name), (status, hull));
    }
}

impl GameContext for StubGame {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn ship_status(&self, name: &str) -> Option<ShipStatus> {
        self.ships.get(&name_key(name)).map(|(status, _)| *status)
    }

    fn ship_hull(&self, name: &str) -> Option<f64> {
        match self.ships.get(&name_key(name)) {
            Some((ShipStatus::Present, hull)) => Some(*hull),
            _ => None,
        }
    }

    fn wing_arrived(&self, name: &str) -> Option<bool> {
        self.wings.get(&name_key(name)).map(|(arrived, _)| *arrived)
    }

    fn wing_destroyed_fraction(&self, name: &str) -> Option<f64> {
        self.wings.get(&name_key(name)).map(|(_, fraction)| *fraction)
    }

    fn send_message(&mut self, persona: &str, text: &str) {
        self.messages.push((persona.to_string(), text.to_string()));
    }

    fn spawn_wing(&mut self, name: &str) -> bool {
        match self.wings.get_mut(&name_key(name)) {
            Some((arrived, _)) if !*arrived => {
                *arrived = true;
                self.spawned.push(name.to_string());
                true
            }
            _ => false,
        }
    }

    fn destroy_ship(&mut self, name: &str) -> bool {
        match self.ships.get_mut(&name_key(name)) {
            Some((status, hull)) if *status == ShipStatus::Present => {
                *status = ShipStatus::Destroyed;
                *hull = 0.0;
                true
            }
            _ => false,
        }
    }

    fn random_int(&mut self, low: i64, high: i64) -> i64 {
        self.next_random.clamp(low, high)
    }
}

/// Evaluation fixture: a game, a variable store and a ledger sharing one
/// builtin evaluator.
pub struct Harness {
    pub evaluator: Evaluator,
    pub game: StubGame,
    pub variables: VariableStore,
    pub ledger: MissionLedger,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            evaluator: Evaluator::new(OperatorRegistry::builtin()),
            game: StubGame::default(),
            variables: VariableStore::new(),
            ledger: MissionLedger::new(),
        }
    }

    pub fn eval(&mut self, text: &str) -> Value {
        let formula = parse_formula(text, self.evaluator.registry())
            .unwrap_or_else(|err| panic!("{text}: {err}"));
        let mut env = Env::new(&mut self.game, &mut self.variables, &mut self.ledger);
        self.evaluator.evaluate_formula("test", &formula, &mut env)
    }
}
