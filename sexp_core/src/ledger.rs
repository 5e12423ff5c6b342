//! Per-mission record of event and goal outcomes.
//!
//! Operators such as `is-event-true` and `is-goal-false` read from the ledger;
//! the scheduler and tracker write to it after each evaluation. Operators that
//! need to change goal state queue a [`Directive`] instead of mutating the
//! tracker mid-evaluation.

use std::collections::{HashMap, HashSet};

use crate::goals::GoalStatus;
use crate::node::NodePath;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    pub trigger_count: u32,
    pub first_fired_at: Option<f64>,
    pub last_fired_at: Option<f64>,
    /// The event's formula settled false; it will never fire.
    pub never_fires: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalRecord {
    pub status: GoalStatus,
    pub changed_at: Option<f64>,
}

/// Goal-state change requested by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    InvalidateGoal(String),
    ValidateGoal(String),
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warned_variables: HashSet<String>,
    swallowed_errors: u64,
}

impl Diagnostics {
    /// Returns true the first time `name` is reported in this mission.
    pub fn first_unknown_variable(&mut self, name: &str) -> bool {
        self.warned_variables.insert(name_key(name))
    }

    pub fn record_error(&mut self) {
        self.swallowed_errors += 1;
    }

    pub fn swallowed_errors(&self) -> u64 {
        self.swallowed_errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct MissionLedger {
    events: HashMap<String, EventRecord>,
    goals: HashMap<String, GoalRecord>,
    directives: Vec<Directive>,
    /// First time a subtree evaluated true, keyed by formula id and node path.
    latches: HashMap<(String, NodePath), f64>,
    pub diagnostics: Diagnostics,
}

/// Case-folded key for event, goal, variable and host names. Every
/// case-insensitive name comparison in a mission goes through this.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

pub fn names_match(a: &str, b: &str) -> bool {
    a == b || name_key(a) == name_key(b)
}

impl MissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&self, name: &str) -> Option<&EventRecord> {
        self.events.get(&name_key(name))
    }

    pub fn goal(&self, name: &str) -> Option<&GoalRecord> {
        self.goals.get(&name_key(name))
    }

    pub fn register_event(&mut self, name: &str) {
        self.events.entry(name_key(name)).or_default();
    }

    pub fn register_goal(&mut self, name: &str) {
        self.goals.entry(name_key(name)).or_insert(GoalRecord {
            status: GoalStatus::Incomplete,
            changed_at: None,
        });
    }

    pub fn record_event_fired(&mut self, name: &str, now: f64) {
        let record = self.events.entry(name_key(name)).or_default();
        record.trigger_count += 1;
        record.first_fired_at.get_or_insert(now);
        record.last_fired_at = Some(now);
    }

    pub fn record_event_never_fires(&mut self, name: &str) {
        self.events.entry(name_key(name)).or_default().never_fires = true;
    }

    pub fn record_goal_status(&mut self, name: &str, status: GoalStatus, now: f64) {
        self.goals.insert(
            name_key(name),
            GoalRecord {
                status,
                changed_at: Some(now),
            },
        );
    }

    /// Records that the subtree at `path` is true now, keeping the earliest
    /// time. Returns the latched time.
    pub fn latch_true(&mut self, formula_id: &str, path: &NodePath, now: f64) -> f64 {
        *self
            .latches
            .entry((name_key(formula_id), path.clone()))
            .or_insert(now)
    }

    pub fn latched_at(&self, formula_id: &str, path: &NodePath) -> Option<f64> {
        self.latches
            .get(&(name_key(formula_id), path.clone()))
            .copied()
    }

    pub fn push_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn take_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.directives)
    }

    pub fn pending_directives(&self) -> &[Directive] {
        &self.directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_records_accumulate() {
        let mut ledger = MissionLedger::new();
        ledger.register_event("Arrival");
        ledger.record_event_fired("arrival", 3.0);
        ledger.record_event_fired("ARRIVAL", 8.0);
        let record = ledger.event("Arrival").unwrap();
        assert_eq!(record.trigger_count, 2);
        assert_eq!(record.first_fired_at, Some(3.0));
        assert_eq!(record.last_fired_at, Some(8.0));
    }

    #[test]
    fn latches_keep_the_first_time() {
        let mut ledger = MissionLedger::new();
        let path = NodePath::root().child(2);
        assert_eq!(ledger.latch_true("Sequence", &path, 4.0), 4.0);
        assert_eq!(ledger.latch_true("sequence", &path, 9.0), 4.0);
        assert_eq!(ledger.latched_at("SEQUENCE", &path), Some(4.0));
        assert_eq!(ledger.latched_at("Sequence", &NodePath::root()), None);
    }

    #[test]
    fn unknown_variables_warn_once() {
        let mut diagnostics = Diagnostics::default();
        assert!(diagnostics.first_unknown_variable("Ghost"));
        assert!(!diagnostics.first_unknown_variable("ghost"));
    }
}
