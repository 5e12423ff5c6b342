//! Event scheduling.
//!
//! Each event cycles `Armed → Fired → (Armed | Exhausted)`. An event is
//! evaluated only when it is not exhausted, its interval has elapsed since the
//! last fire, and (when chained) its predecessor fired at least `chain_delay`
//! seconds ago.

use thiserror::Error;

use crate::eval::{Env, Evaluator};
use crate::ledger::{names_match, MissionLedger};
use crate::node::Formula;
use crate::notification::Notification;
use crate::value::Truth;

/// `repeat_count` value meaning "fire without limit".
pub const UNLIMITED_REPEATS: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventState {
    Armed,
    /// Fired and waiting out its interval.
    Fired,
    Exhausted,
}

/// Resolved `chain_after` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub predecessor: String,
    index: usize,
}

impl ChainLink {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("event '{event}' chains after unknown event '{predecessor}'")]
    UnknownPredecessor { event: String, predecessor: String },
    #[error("event '{0}' chains after itself")]
    SelfChain(String),
    #[error("event '{event}' chaining after '{predecessor}' would form a cycle")]
    ChainCycle { event: String, predecessor: String },
    #[error("event '{0}' is already scheduled")]
    DuplicateEvent(String),
}

#[derive(Debug, Clone)]
pub struct MissionEvent {
    pub name: String,
    pub formula: Formula,
    /// Number of fires before exhaustion; [`UNLIMITED_REPEATS`] for no limit.
    pub repeat_count: i32,
    /// Minimum seconds between fires.
    pub interval: f64,
    /// Seconds after this event fires before a successor chained to it
    /// becomes eligible.
    pub chain_delay: f64,
    pub score: i32,
    pub objective_text: Option<String>,
    chain: Option<ChainLink>,
    trigger_count: u32,
    last_evaluated_time: Option<f64>,
    state: EventState,
}

impl MissionEvent {
    pub fn new(name: impl Into<String>, formula: Formula) -> Self {
        Self {
            name: name.into(),
            formula,
            repeat_count: 1,
            interval: 0.0,
            chain_delay: 0.0,
            score: 0,
            objective_text: None,
            chain: None,
            trigger_count: 0,
            last_evaluated_time: None,
            state: EventState::Armed,
        }
    }

    pub fn repeat(mut self, repeat_count: i32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn every(mut self, interval: f64) -> Self {
        self.interval = interval;
        self
    }

    pub fn chain_delay(mut self, chain_delay: f64) -> Self {
        self.chain_delay = chain_delay;
        self
    }

    pub fn score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    pub fn objective(mut self, text: impl Into<String>) -> Self {
        self.objective_text = Some(text.into());
        self
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn trigger_count(&self) -> u32 {
        self.trigger_count
    }

    /// Mission time of the most recent fire.
    pub fn last_evaluated_time(&self) -> Option<f64> {
        self.last_evaluated_time
    }

    pub fn chain(&self) -> Option<&ChainLink> {
        self.chain.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == EventState::Exhausted
    }

    fn repeats_spent(&self) -> bool {
        self.repeat_count >= 0 && i64::from(self.trigger_count) >= i64::from(self.repeat_count)
    }

    fn interval_elapsed(&self, now: f64) -> bool {
        self.last_evaluated_time
            .map_or(true, |last| now - last >= self.interval)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventScheduler {
    events: Vec<MissionEvent>,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: MissionEvent) -> Result<usize, SchedulerError> {
        if self.index_of(&event.name).is_some() {
            return Err(SchedulerError::DuplicateEvent(event.name));
        }
        self.events.push(event);
        Ok(self.events.len() - 1)
    }

    /// Makes `event` wait for `predecessor`. Both must already be scheduled.
    pub fn chain_after(&mut self, event: &str, predecessor: &str) -> Result<(), SchedulerError> {
        let unknown = || SchedulerError::UnknownPredecessor {
            event: event.to_string(),
            predecessor: predecessor.to_string(),
        };
        let successor = self.index_of(event).ok_or_else(unknown)?;
        let index = self.index_of(predecessor).ok_or_else(unknown)?;
        if successor == index {
            return Err(SchedulerError::SelfChain(event.to_string()));
        }
        // Links are only added through here, so the existing chains are
        // acyclic and this walk terminates.
        let mut cursor = self.events[index].chain.as_ref().map(ChainLink::index);
        while let Some(ancestor) = cursor {
            if ancestor == successor {
                tracing::warn!(
                    target: "sexp::events",
                    event,
                    predecessor,
                    "event.chain_cycle"
                );
                return Err(SchedulerError::ChainCycle {
                    event: event.to_string(),
                    predecessor: predecessor.to_string(),
                });
            }
            cursor = self.events[ancestor].chain.as_ref().map(ChainLink::index);
        }
        self.events[successor].chain = Some(ChainLink {
            predecessor: self.events[index].name.clone(),
            index,
        });
        Ok(())
    }

    pub fn events(&self) -> &[MissionEvent] {
        &self.events
    }

    pub fn event(&self, name: &str) -> Option<&MissionEvent> {
        self.index_of(name).map(|index| &self.events[index])
    }

    /// Creates ledger records so status queries can tell an unfired event
    /// from a misspelled one.
    pub fn register_with(&self, ledger: &mut MissionLedger) {
        for event in &self.events {
            ledger.register_event(&event.name);
        }
    }

    pub fn all_exhausted(&self) -> bool {
        self.events.iter().all(MissionEvent::is_exhausted)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.events
            .iter()
            .position(|event| names_match(&event.name, name))
    }

    fn chain_ready(&self, index: usize, now: f64) -> bool {
        let Some(link) = &self.events[index].chain else {
            return true;
        };
        let predecessor = &self.events[link.index];
        predecessor
            .last_evaluated_time
            .is_some_and(|fired_at| now >= fired_at + predecessor.chain_delay)
    }

    /// Evaluates every due event in list order. Ledger updates happen right
    /// after each fire, so later events in the same tick observe them.
    pub fn tick(&mut self, evaluator: &Evaluator, env: &mut Env<'_>) -> Vec<Notification> {
        let now = env.game.current_time();
        let mut notifications = Vec::new();

        for index in 0..self.events.len() {
            let chain_ready = self.chain_ready(index, now);
            let event = &mut self.events[index];

            if event.state == EventState::Exhausted {
                continue;
            }
            if event.repeats_spent() {
                exhaust(event, "repeat_count");
                continue;
            }
            if !event.interval_elapsed(now) || !chain_ready {
                continue;
            }
            event.state = EventState::Armed;

            match evaluator.evaluate_formula(&event.name, &event.formula, env).truth() {
                Truth::True | Truth::KnownTrue => {
                    event.trigger_count += 1;
                    event.last_evaluated_time = Some(now);
                    event.state = EventState::Fired;
                    env.ledger.record_event_fired(&event.name, now);
                    tracing::info!(
                        target: "sexp::events",
                        event = %event.name,
                        trigger_count = event.trigger_count,
                        score = event.score,
                        time = now,
                        "event.fired"
                    );
                    notifications.push(Notification::EventFired {
                        id: event.name.clone(),
                        score_delta: event.score,
                        objective_text: event.objective_text.clone(),
                        trigger_count: event.trigger_count,
                        at: now,
                    });
                    if event.repeats_spent() {
                        exhaust(event, "repeat_count");
                    }
                }
                Truth::KnownFalse => {
                    env.ledger.record_event_never_fires(&event.name);
                    exhaust(event, "known_false");
                }
                Truth::False | Truth::Unknown => {}
            }
        }

        notifications
    }
}

fn exhaust(event: &mut MissionEvent, reason: &'static str) {
    event.state = EventState::Exhausted;
    tracing::debug!(
        target: "sexp::events",
        event = %event.name,
        reason,
        "event.exhausted"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use crate::testing::Harness;

    fn event(harness: &Harness, name: &str, text: &str) -> MissionEvent {
        MissionEvent::new(name, parse_formula(text, harness.evaluator.registry()).unwrap())
    }

    fn run(harness: &mut Harness, scheduler: &mut EventScheduler, seconds: u32) -> Vec<Notification> {
        let mut all = Vec::new();
        for second in 0..seconds {
            harness.game.time = f64::from(second);
            let mut env = Env::new(&mut harness.game, &mut harness.variables, &mut harness.ledger);
            all.extend(scheduler.tick(&harness.evaluator, &mut env));
        }
        all
    }

    fn fire_times(notifications: &[Notification], id: &str) -> Vec<f64> {
        notifications
            .iter()
            .filter_map(|notification| match notification {
                Notification::EventFired { id: fired, at, .. } if fired == id => Some(*at),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn interval_and_repeat_count_bound_fires() {
        let mut h = Harness::new();
        let mut scheduler = EventScheduler::new();
        scheduler
            .add(event(&h, "Pulse", "(true)").repeat(3).every(5.0).score(10))
            .unwrap();

        let notifications = run(&mut h, &mut scheduler, 20);
        assert_eq!(fire_times(&notifications, "Pulse"), vec![0.0, 5.0, 10.0]);
        let pulse = scheduler.event("pulse").unwrap();
        assert_eq!(pulse.trigger_count(), 3);
        assert_eq!(pulse.state(), EventState::Exhausted);
        assert_eq!(h.ledger.event("Pulse").unwrap().trigger_count, 3);
    }

    #[test]
    fn unlimited_repeats_keep_firing() {
        let mut h = Harness::new();
        let mut scheduler = EventScheduler::new();
        scheduler
            .add(event(&h, "Beacon", "(true)").repeat(UNLIMITED_REPEATS).every(4.0))
            .unwrap();
        let notifications = run(&mut h, &mut scheduler, 13);
        assert_eq!(fire_times(&notifications, "Beacon"), vec![0.0, 4.0, 8.0, 12.0]);
        assert_eq!(scheduler.event("Beacon").unwrap().state(), EventState::Fired);
    }

    #[test]
    fn known_false_exhausts_without_firing() {
        let mut h = Harness::new();
        let mut scheduler = EventScheduler::new();
        scheduler.add(event(&h, "Never", "(false)")).unwrap();
        let notifications = run(&mut h, &mut scheduler, 3);
        assert!(notifications.is_empty());
        assert!(scheduler.event("Never").unwrap().is_exhausted());
        assert!(h.ledger.event("never").unwrap().never_fires);
    }

    #[test]
    fn chained_event_waits_for_predecessor_delay() {
        let mut h = Harness::new();
        let mut scheduler = EventScheduler::new();
        scheduler
            .add(event(&h, "Briefing", "(has-time-elapsed 2)").chain_delay(3.0))
            .unwrap();
        scheduler.add(event(&h, "Follow Up", "(true)")).unwrap();
        scheduler.chain_after("Follow Up", "briefing").unwrap();

        let notifications = run(&mut h, &mut scheduler, 10);
        assert_eq!(fire_times(&notifications, "Briefing"), vec![2.0]);
        assert_eq!(fire_times(&notifications, "Follow Up"), vec![5.0]);
        assert_eq!(
            scheduler.event("Follow Up").unwrap().chain().map(ChainLink::index),
            Some(0)
        );
    }

    #[test]
    fn chain_errors() {
        let h = Harness::new();
        let mut scheduler = EventScheduler::new();
        scheduler.add(event(&h, "A", "(true)")).unwrap();
        assert_eq!(
            scheduler.chain_after("A", "A"),
            Err(SchedulerError::SelfChain("A".into()))
        );
        assert!(matches!(
            scheduler.chain_after("A", "Missing"),
            Err(SchedulerError::UnknownPredecessor { .. })
        ));
        assert_eq!(
            scheduler.add(event(&h, "a", "(true)")),
            Err(SchedulerError::DuplicateEvent("a".into()))
        );
    }

    #[test]
    fn chain_cycles_are_rejected() {
        let h = Harness::new();
        let mut scheduler = EventScheduler::new();
        for name in ["Launch", "Rendezvous", "Dock"] {
            scheduler.add(event(&h, name, "(true)")).unwrap();
        }
        scheduler.chain_after("Rendezvous", "Launch").unwrap();
        scheduler.chain_after("Dock", "Rendezvous").unwrap();
        assert_eq!(
            scheduler.chain_after("Launch", "Dock"),
            Err(SchedulerError::ChainCycle {
                event: "Launch".into(),
                predecessor: "Dock".into(),
            })
        );
        assert!(scheduler.event("Launch").unwrap().chain().is_none());
    }

    #[test]
    fn duplicate_detection_folds_non_ascii_names() {
        let mut h = Harness::new();
        let mut scheduler = EventScheduler::new();
        scheduler.add(event(&h, "Émile Arrives", "(true)")).unwrap();
        assert_eq!(
            scheduler.add(event(&h, "émile arrives", "(true)")),
            Err(SchedulerError::DuplicateEvent("émile arrives".into()))
        );
        scheduler.register_with(&mut h.ledger);

        let notifications = run(&mut h, &mut scheduler, 1);
        assert_eq!(fire_times(&notifications, "Émile Arrives"), vec![0.0]);
        assert!(scheduler.event("ÉMILE ARRIVES").is_some());
        assert_eq!(h.ledger.event("émile arrives").unwrap().trigger_count, 1);
    }

    #[test]
    fn later_events_see_earlier_fires_in_same_tick() {
        let mut h = Harness::new();
        let mut scheduler = EventScheduler::new();
        scheduler.add(event(&h, "First", "(true)")).unwrap();
        scheduler.add(event(&h, "Second", "(is-event-true \"First\")")).unwrap();
        let notifications = run(&mut h, &mut scheduler, 1);
        assert_eq!(fire_times(&notifications, "Second"), vec![0.0]);
    }
}
