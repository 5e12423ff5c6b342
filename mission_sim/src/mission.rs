//! Mission definition files and the loader that turns them into runnable
//! mission state.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sexp_core::{
    validate, EventScheduler, Formula, GoalTracker, GoalType, MissionEvent, MissionGoal,
    MissionLedger, OperatorRegistry, ParseError, Parser, PersistenceScope, PersistenceSnapshot,
    SchedulerError, ValidationIssue, VariableError, VariableStore, VariableType, VariableValue,
};
use thiserror::Error;

use crate::config::RuntimeConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: VariableType,
    pub default: VariableValue,
    #[serde(default)]
    pub scope: PersistenceScope,
}

fn default_repeat_count() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    pub formula: String,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: i32,
    #[serde(default)]
    pub interval: f64,
    #[serde(default)]
    pub chain_delay: f64,
    #[serde(default)]
    pub chain_after: Option<String>,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub objective_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDefinition {
    pub name: String,
    pub formula: String,
    #[serde(default)]
    pub goal_type: GoalType,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub team: u32,
    #[serde(default)]
    pub invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionDefinition {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default)]
    pub goals: Vec<GoalDefinition>,
}

impl MissionDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, MissionLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| MissionLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json_str(&contents)?)
    }
}

#[derive(Debug, Error)]
pub enum MissionLoadError {
    #[error("failed to read mission from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse mission definition: {0}")]
    Definition(#[from] serde_json::Error),
    #[error("formula '{formula_id}': {source}")]
    Syntax {
        formula_id: String,
        #[source]
        source: ParseError,
    },
    #[error("variable '{name}': {source}")]
    Variable {
        name: String,
        #[source]
        source: VariableError,
    },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("goal '{0}' is defined more than once")]
    DuplicateGoal(String),
    #[error(
        "{} validation issue(s), first: {}",
        .0.len(),
        .0.first().map(ToString::to_string).unwrap_or_default()
    )]
    Validation(Vec<ValidationIssue>),
}

/// Loaded mission: parsed formulas plus the per-mission mutable state they
/// run against.
#[derive(Debug)]
pub struct Mission {
    pub name: String,
    pub(crate) scheduler: EventScheduler,
    pub(crate) goals: GoalTracker,
    pub(crate) variables: VariableStore,
    pub(crate) ledger: MissionLedger,
    issues: Vec<ValidationIssue>,
}

impl Mission {
    /// Builds mission state from a definition.
    ///
    /// Order: declare variables, overlay persisted values, parse every
    /// formula, then validate them all. Any syntax error aborts the load.
    pub fn load(
        definition: &MissionDefinition,
        registry: &OperatorRegistry,
        config: &RuntimeConfig,
        persisted: &PersistenceSnapshot,
    ) -> Result<Self, MissionLoadError> {
        let mut variables = VariableStore::new();
        for variable in &definition.variables {
            variables
                .declare(
                    &variable.name,
                    variable.value_type,
                    variable.default.clone(),
                    variable.scope,
                )
                .map_err(|source| MissionLoadError::Variable {
                    name: variable.name.clone(),
                    source,
                })?;
        }
        let applied = variables.apply_persisted(&persisted.player)
            + variables.apply_persisted(&persisted.campaign);

        let parser = Parser::with_options(registry, config.parse_options());
        let parse = |formula_id: &str, text: &str| -> Result<Formula, MissionLoadError> {
            parser.parse(text).map_err(|source| MissionLoadError::Syntax {
                formula_id: formula_id.to_string(),
                source,
            })
        };

        let mut scheduler = EventScheduler::new();
        for event in &definition.events {
            let formula = parse(&event.name, &event.formula)?;
            let mut scheduled = MissionEvent::new(&event.name, formula)
                .repeat(event.repeat_count)
                .every(event.interval)
                .chain_delay(event.chain_delay)
                .score(event.score);
            if let Some(text) = &event.objective_text {
                scheduled = scheduled.objective(text);
            }
            scheduler.add(scheduled)?;
        }
        for event in &definition.events {
            if let Some(predecessor) = &event.chain_after {
                scheduler.chain_after(&event.name, predecessor)?;
            }
        }

        let mut goals = GoalTracker::new(config.goal_policy());
        for goal in &definition.goals {
            if goals.goal(&goal.name).is_some() {
                return Err(MissionLoadError::DuplicateGoal(goal.name.clone()));
            }
            let formula = parse(&goal.name, &goal.formula)?;
            let mut tracked = MissionGoal::new(&goal.name, formula, goal.goal_type)
                .with_score(goal.score)
                .with_team(goal.team);
            if goal.invalid {
                tracked = tracked.invalidated();
            }
            goals.add(tracked);
        }

        let mut issues = Vec::new();
        for event in scheduler.events() {
            issues.extend(validate(&event.name, &event.formula, registry, Some(&variables)));
        }
        for goal in goals.goals() {
            issues.extend(validate(&goal.name, &goal.formula, registry, Some(&variables)));
        }
        if !issues.is_empty() {
            if config.strict_validation {
                return Err(MissionLoadError::Validation(issues));
            }
            for issue in &issues {
                tracing::warn!(
                    target: "sexp::mission",
                    formula = %issue.formula_id,
                    path = %issue.path,
                    issue = %issue.kind,
                    "validate.issue"
                );
            }
        }

        let mut ledger = MissionLedger::new();
        scheduler.register_with(&mut ledger);
        goals.register_with(&mut ledger);

        tracing::info!(
            target: "sexp::mission",
            mission = %definition.name,
            events = scheduler.events().len(),
            goals = goals.goals().len(),
            variables = variables.len(),
            persisted_applied = applied,
            issues = issues.len(),
            "mission.loaded"
        );

        Ok(Self {
            name: definition.name.clone(),
            scheduler,
            goals,
            variables,
            ledger,
            issues,
        })
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn goals(&self) -> &GoalTracker {
        &self.goals
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    pub fn ledger(&self) -> &MissionLedger {
        &self.ledger
    }

    /// Validation issues tolerated at load.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }
}
