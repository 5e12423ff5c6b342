//! Goal tracking and mission outcome aggregation.
//!
//! Goal status only moves forward: `Incomplete → Complete | Failed`. Invalid
//! goals are skipped entirely and do not count toward the outcome.

use serde::{Deserialize, Serialize};

use crate::eval::{Env, Evaluator};
use crate::ledger::{names_match, Directive, MissionLedger};
use crate::node::Formula;
use crate::notification::Notification;
use crate::value::Truth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Incomplete,
    Complete,
    Failed,
}

impl GoalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GoalStatus::Incomplete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Incomplete => "incomplete",
            GoalStatus::Complete => "complete",
            GoalStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    #[default]
    Primary,
    Secondary,
    Bonus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionOutcome {
    #[default]
    InProgress,
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct MissionGoal {
    pub name: String,
    pub formula: Formula,
    pub goal_type: GoalType,
    pub score: i32,
    pub team: u32,
    pub invalid: bool,
    status: GoalStatus,
}

impl MissionGoal {
    pub fn new(name: impl Into<String>, formula: Formula, goal_type: GoalType) -> Self {
        Self {
            name: name.into(),
            formula,
            goal_type,
            score: 0,
            team: 0,
            invalid: false,
            status: GoalStatus::Incomplete,
        }
    }

    pub fn with_score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    pub fn with_team(mut self, team: u32) -> Self {
        self.team = team;
        self
    }

    pub fn invalidated(mut self) -> Self {
        self.invalid = true;
        self
    }

    pub fn status(&self) -> GoalStatus {
        self.status
    }

    fn counts_as_primary(&self) -> bool {
        self.goal_type == GoalType::Primary && !self.invalid
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalPolicy {
    /// A failed primary goal ends the mission in failure immediately.
    pub primary_failure_fails_mission: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GoalTracker {
    goals: Vec<MissionGoal>,
    policy: GoalPolicy,
    outcome: MissionOutcome,
}

impl GoalTracker {
    pub fn new(policy: GoalPolicy) -> Self {
        Self {
            goals: Vec::new(),
            policy,
            outcome: MissionOutcome::InProgress,
        }
    }

    pub fn add(&mut self, goal: MissionGoal) -> usize {
        self.goals.push(goal);
        self.goals.len() - 1
    }

    pub fn goals(&self) -> &[MissionGoal] {
        &self.goals
    }

    pub fn goal(&self, name: &str) -> Option<&MissionGoal> {
        self.goals
            .iter()
            .find(|goal| names_match(&goal.name, name))
    }

    pub fn register_with(&self, ledger: &mut MissionLedger) {
        for goal in &self.goals {
            ledger.register_goal(&goal.name);
        }
    }

    pub fn outcome(&self) -> MissionOutcome {
        self.outcome
    }

    /// One evaluation pass over every valid, incomplete goal.
    pub fn tick(&mut self, evaluator: &Evaluator, env: &mut Env<'_>) -> Vec<Notification> {
        let now = env.game.current_time();
        let mut notifications = Vec::new();

        for directive in env.ledger.take_directives() {
            self.apply_directive(directive, now, &mut notifications);
        }

        for goal in &mut self.goals {
            if goal.invalid || goal.status.is_terminal() {
                continue;
            }
            let truth = evaluator.evaluate_formula(&goal.name, &goal.formula, env).truth();
            let next = match truth {
                Truth::True | Truth::KnownTrue => GoalStatus::Complete,
                Truth::KnownFalse => GoalStatus::Failed,
                Truth::False | Truth::Unknown => continue,
            };
            transition(goal, next, now, &mut *env.ledger, &mut notifications);
        }

        self.refresh_outcome(false, now, &mut notifications);
        notifications
    }

    /// Fails every valid goal that is still incomplete. Called once when the
    /// mission ends.
    pub fn fail_incomplete(&mut self, now: f64, ledger: &mut MissionLedger) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for goal in &mut self.goals {
            if goal.invalid || goal.status.is_terminal() {
                continue;
            }
            transition(goal, GoalStatus::Failed, now, ledger, &mut notifications);
        }
        self.refresh_outcome(false, now, &mut notifications);
        notifications
    }

    /// Settles the outcome for a finished mission: anything short of every
    /// valid primary goal complete is a failure.
    pub fn conclude(&mut self, now: f64) -> Vec<Notification> {
        let mut notifications = Vec::new();
        self.refresh_outcome(true, now, &mut notifications);
        notifications
    }

    fn apply_directive(
        &mut self,
        directive: Directive,
        now: f64,
        notifications: &mut Vec<Notification>,
    ) {
        let (name, invalid) = match &directive {
            Directive::InvalidateGoal(name) => (name, true),
            Directive::ValidateGoal(name) => (name, false),
        };
        let Some(goal) = self
            .goals
            .iter_mut()
            .find(|goal| names_match(&goal.name, name))
        else {
            tracing::warn!(target: "sexp::goals", goal = %name, "goal.directive_unknown_goal");
            return;
        };
        if goal.invalid == invalid {
            return;
        }
        goal.invalid = invalid;
        tracing::info!(
            target: "sexp::goals",
            goal = %goal.name,
            invalid,
            "goal.validity_changed"
        );
        notifications.push(Notification::GoalValidityChanged {
            id: goal.name.clone(),
            invalid,
            at: now,
        });
    }

    fn refresh_outcome(&mut self, finished: bool, now: f64, notifications: &mut Vec<Notification>) {
        let outcome = compute_outcome(&self.goals, self.policy, finished);
        if outcome != self.outcome {
            tracing::info!(
                target: "sexp::goals",
                from = ?self.outcome,
                to = ?outcome,
                "goal.outcome_changed"
            );
            self.outcome = outcome;
            notifications.push(Notification::MissionOutcome { outcome, at: now });
        }
    }
}

fn transition(
    goal: &mut MissionGoal,
    next: GoalStatus,
    now: f64,
    ledger: &mut MissionLedger,
    notifications: &mut Vec<Notification>,
) {
    goal.status = next;
    ledger.record_goal_status(&goal.name, next, now);
    let score = if next == GoalStatus::Complete { goal.score } else { 0 };
    tracing::info!(
        target: "sexp::goals",
        goal = %goal.name,
        status = next.as_str(),
        score,
        time = now,
        "goal.status_changed"
    );
    notifications.push(Notification::GoalStatusChanged {
        id: goal.name.clone(),
        new_status: next,
        score,
        at: now,
    });
}

/// Recomputes the outcome from current goal state.
///
/// While the mission runs, success needs at least one valid primary goal and
/// all of them complete. Once finished, an empty primary set counts as
/// success.
pub fn compute_outcome(goals: &[MissionGoal], policy: GoalPolicy, finished: bool) -> MissionOutcome {
    let mut primaries = goals.iter().filter(|goal| goal.counts_as_primary()).peekable();
    let has_primary = primaries.peek().is_some();
    let mut all_complete = true;
    let mut any_failed = false;
    for goal in primaries {
        all_complete &= goal.status == GoalStatus::Complete;
        any_failed |= goal.status == GoalStatus::Failed;
    }

    if any_failed && policy.primary_failure_fails_mission {
        MissionOutcome::Failure
    } else if all_complete && (has_primary || finished) {
        MissionOutcome::Success
    } else if finished {
        MissionOutcome::Failure
    } else {
        MissionOutcome::InProgress
    }
}
