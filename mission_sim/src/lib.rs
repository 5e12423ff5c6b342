//! Headless mission runner built on `sexp_core`: loads mission definitions,
//! drives them tick by tick against a scripted host, and keeps pilot and
//! campaign saves between missions.

pub mod app;
pub mod config;
pub mod host;
pub mod mission;
pub mod persistence;
pub mod runtime;

pub use app::{build_mission_app, finish_mission, run_tick, ActiveMission, HostWorld, MissionClock};
pub use config::{
    load_runtime_config_from_env, RuntimeConfig, RuntimeConfigError, RuntimeConfigHandle,
    RuntimeConfigMetadata, SaveFormat, BUILTIN_RUNTIME_CONFIG, RUNTIME_CONFIG_ENV,
};
pub use host::{HostMessage, HostScenario, HostScenarioError, ScriptedHost, ShipScript, WingScript};
pub use mission::{
    EventDefinition, GoalDefinition, Mission, MissionDefinition, MissionLoadError,
    VariableDefinition,
};
pub use persistence::{CampaignSave, PilotSave, SaveStore, SaveStoreError};
pub use runtime::{
    notification_channel, EventSummary, GoalSummary, MissionRuntime, MissionSummary,
    NotificationSink, TickReport,
};
