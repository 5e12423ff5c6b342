use serde::{Deserialize, Serialize};

use crate::goals::{GoalStatus, MissionOutcome};

/// Outbound record of a mission-visible state change. `at` is the mission
/// time of the tick that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    EventFired {
        id: String,
        score_delta: i32,
        objective_text: Option<String>,
        trigger_count: u32,
        at: f64,
    },
    GoalStatusChanged {
        id: String,
        new_status: GoalStatus,
        score: i32,
        at: f64,
    },
    GoalValidityChanged {
        id: String,
        invalid: bool,
        at: f64,
    },
    MissionOutcome {
        outcome: MissionOutcome,
        at: f64,
    },
}

impl Notification {
    /// Score this notification contributes to the mission total.
    pub fn score_delta(&self) -> i32 {
        match self {
            Notification::EventFired { score_delta, .. } => *score_delta,
            Notification::GoalStatusChanged { score, .. } => *score,
            _ => 0,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Notification::EventFired { id, .. }
            | Notification::GoalStatusChanged { id, .. }
            | Notification::GoalValidityChanged { id, .. } => Some(id),
            Notification::MissionOutcome { .. } => None,
        }
    }
}
