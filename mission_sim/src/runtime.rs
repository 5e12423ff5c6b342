//! Per-tick driver tying the event scheduler, goal tracker and variable store
//! of one mission together.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use sexp_core::{
    Env, Evaluator, GameContext, GoalStatus, GoalType, MissionOutcome, Notification,
    OperatorRegistry, PersistenceSnapshot,
};

use crate::config::RuntimeConfig;
use crate::mission::Mission;

/// Sending half of the notification channel handed to a runtime.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    sender: Sender<Notification>,
}

impl NotificationSink {
    /// Returns false once the receiver is gone.
    pub fn send(&self, notification: Notification) -> bool {
        self.sender.send(notification).is_ok()
    }
}

pub fn notification_channel() -> (NotificationSink, Receiver<Notification>) {
    let (sender, receiver) = unbounded();
    (NotificationSink { sender }, receiver)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub time: f64,
    pub notifications: Vec<Notification>,
    pub score_delta: i64,
    pub outcome: MissionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSummary {
    pub name: String,
    pub goal_type: GoalType,
    pub status: GoalStatus,
    pub invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub name: String,
    pub trigger_count: u32,
    pub exhausted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSummary {
    pub mission: String,
    pub outcome: MissionOutcome,
    pub score: i64,
    pub ended_at: f64,
    pub ticks: u64,
    pub goals: Vec<GoalSummary>,
    pub events: Vec<EventSummary>,
    /// Notifications raised while resolving the mission end.
    pub final_notifications: Vec<Notification>,
    pub persistence: PersistenceSnapshot,
    pub swallowed_errors: u64,
}

pub struct MissionRuntime {
    mission: Mission,
    evaluator: Evaluator,
    fail_incomplete_at_end: bool,
    score: i64,
    last_time: f64,
    ticks: u64,
    sink: Option<NotificationSink>,
}

impl MissionRuntime {
    pub fn new(mission: Mission, registry: Arc<OperatorRegistry>, config: &RuntimeConfig) -> Self {
        Self {
            mission,
            evaluator: Evaluator::new(registry),
            fail_incomplete_at_end: config.fail_incomplete_at_end,
            score: 0,
            last_time: 0.0,
            ticks: 0,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: NotificationSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    pub fn mission_mut(&mut self) -> &mut Mission {
        &mut self.mission
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn outcome(&self) -> MissionOutcome {
        self.mission.goals.outcome()
    }

    /// Runs events, then goals, at the game's current time.
    pub fn tick(&mut self, game: &mut dyn GameContext) -> TickReport {
        let now = game.current_time();
        let Mission {
            scheduler,
            goals,
            variables,
            ledger,
            ..
        } = &mut self.mission;

        let mut env = Env::new(game, variables, ledger);
        let mut notifications = scheduler.tick(&self.evaluator, &mut env);
        notifications.extend(goals.tick(&self.evaluator, &mut env));

        self.last_time = now;
        self.ticks += 1;
        let score_delta = self.deliver(&notifications);
        TickReport {
            time: now,
            notifications,
            score_delta,
            outcome: self.outcome(),
        }
    }

    /// Ends the mission: fails leftover goals when configured, settles the
    /// outcome and extracts persistent variables. Local variables are dropped.
    pub fn finish(mut self) -> MissionSummary {
        let now = self.last_time;
        let mut final_notifications = Vec::new();
        if self.fail_incomplete_at_end {
            final_notifications.extend(
                self.mission
                    .goals
                    .fail_incomplete(now, &mut self.mission.ledger),
            );
        }
        final_notifications.extend(self.mission.goals.conclude(now));
        self.deliver(&final_notifications);

        let persistence = self.mission.variables.end_mission();
        let outcome = self.outcome();
        tracing::info!(
            target: "sexp::mission",
            mission = %self.mission.name,
            outcome = ?outcome,
            score = self.score,
            ticks = self.ticks,
            "mission.finished"
        );

        MissionSummary {
            mission: self.mission.name.clone(),
            outcome,
            score: self.score,
            ended_at: now,
            ticks: self.ticks,
            goals: self
                .mission
                .goals
                .goals()
                .iter()
                .map(|goal| GoalSummary {
                    name: goal.name.clone(),
                    goal_type: goal.goal_type,
                    status: goal.status(),
                    invalid: goal.invalid,
                })
                .collect(),
            events: self
                .mission
                .scheduler
                .events()
                .iter()
                .map(|event| EventSummary {
                    name: event.name.clone(),
                    trigger_count: event.trigger_count(),
                    exhausted: event.is_exhausted(),
                })
                .collect(),
            final_notifications,
            persistence,
            swallowed_errors: self.mission.ledger.diagnostics.swallowed_errors(),
        }
    }

    /// Drops the mission without resolving goals or extracting persistent
    /// state.
    pub fn abort(self) {
        tracing::info!(
            target: "sexp::mission",
            mission = %self.mission.name,
            ticks = self.ticks,
            "mission.aborted"
        );
    }

    fn deliver(&mut self, notifications: &[Notification]) -> i64 {
        let delta: i64 = notifications
            .iter()
            .map(|notification| i64::from(notification.score_delta()))
            .sum();
        self.score += delta;

        if let Some(sink) = &self.sink {
            let closed = notifications
                .iter()
                .any(|notification| !sink.send(notification.clone()));
            if closed {
                tracing::debug!(target: "sexp::mission", "mission.sink_closed");
                self.sink = None;
            }
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostScenario, ScriptedHost, ShipScript};
    use crate::mission::MissionDefinition;

    const PATROL: &str = r#"{
        "name": "Patrol",
        "variables": [
            { "name": "sweeps", "type": "number", "default": 0 },
            { "name": "rank", "type": "string", "default": "Ensign", "scope": "player_persistent" }
        ],
        "events": [
            {
                "name": "Sweep",
                "formula": "(modify-variable @sweeps (+ @sweeps 1))",
                "repeat_count": 3,
                "interval": 2,
                "score": 5
            },
            {
                "name": "Promotion",
                "formula": "(when (>= @sweeps 3) (modify-variable @rank \"Lieutenant\"))"
            }
        ],
        "goals": [
            { "name": "Sweep Thrice", "formula": "(>= @sweeps 3)", "score": 50 },
            { "name": "Kill Raider", "formula": "(is-destroyed \"Raider\")", "goal_type": "secondary" }
        ]
    }"#;

    fn runtime(config: &RuntimeConfig) -> MissionRuntime {
        let registry = OperatorRegistry::builtin();
        let definition = MissionDefinition::from_json_str(PATROL).unwrap();
        let mission =
            Mission::load(&definition, &registry, config, &PersistenceSnapshot::default()).unwrap();
        MissionRuntime::new(mission, registry, config)
    }

    fn host() -> ScriptedHost {
        ScriptedHost::new(
            HostScenario {
                ships: vec![ShipScript::present("Raider", 100.0)],
                wings: Vec::new(),
            },
            7,
        )
    }

    #[test]
    fn ticks_accumulate_score_and_forward_notifications() {
        let config = RuntimeConfig::default();
        let (sink, receiver) = notification_channel();
        let mut runtime = runtime(&config).with_sink(sink);
        let mut host = host();

        let mut total = 0;
        for second in 0..6 {
            host.set_time(f64::from(second));
            total += runtime.tick(&mut host).score_delta;
        }
        // Three sweeps at 0, 2 and 4, then the goal at 4.
        assert_eq!(total, 3 * 5 + 50);
        assert_eq!(runtime.score(), total);

        let forwarded: Vec<Notification> = receiver.try_iter().collect();
        assert_eq!(
            forwarded
                .iter()
                .filter(|notification| matches!(notification, Notification::EventFired { .. }))
                .count(),
            4
        );
    }

    #[test]
    fn finish_fails_leftovers_and_keeps_persistent_variables() {
        let config = RuntimeConfig::default();
        let mut runtime = runtime(&config);
        let mut host = host();
        for second in 0..6 {
            host.set_time(f64::from(second));
            runtime.tick(&mut host);
        }

        let summary = runtime.finish();
        assert_eq!(summary.outcome, MissionOutcome::Success);
        let kill = summary
            .goals
            .iter()
            .find(|goal| goal.name == "Kill Raider")
            .unwrap();
        assert_eq!(kill.status, GoalStatus::Failed);
        assert_eq!(summary.persistence.player.len(), 1);
        assert_eq!(summary.persistence.player[0].value, "Lieutenant");
        assert!(summary.persistence.campaign.is_empty());
        assert_eq!(
            summary.events.iter().find(|event| event.name == "Sweep"),
            Some(&EventSummary {
                name: "Sweep".into(),
                trigger_count: 3,
                exhausted: true,
            })
        );
    }

    #[test]
    fn dropped_receiver_does_not_stop_scoring() {
        let config = RuntimeConfig::default();
        let (sink, receiver) = notification_channel();
        drop(receiver);
        let mut runtime = runtime(&config).with_sink(sink);
        let mut host = host();
        assert_eq!(runtime.tick(&mut host).score_delta, 5);
    }
}
