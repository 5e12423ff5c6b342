use std::sync::Arc;

use bevy::prelude::*;

use crate::config::{RuntimeConfig, RuntimeConfigHandle};
use crate::host::ScriptedHost;
use crate::runtime::{MissionRuntime, MissionSummary, TickReport};

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct MissionClock {
    pub time: f64,
    pub step: f64,
    pub ticks: u64,
}

impl MissionClock {
    pub fn new(step: f64) -> Self {
        Self {
            time: 0.0,
            step,
            ticks: 0,
        }
    }
}

/// Running mission plus its most recent tick. `runtime` is `None` once the
/// mission has been finished.
#[derive(Resource)]
pub struct ActiveMission {
    runtime: Option<MissionRuntime>,
    pub last_report: Option<TickReport>,
}

impl ActiveMission {
    pub fn runtime(&self) -> Option<&MissionRuntime> {
        self.runtime.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }
}

#[derive(Resource, Debug)]
pub struct HostWorld(pub ScriptedHost);

pub fn build_mission_app(
    runtime: MissionRuntime,
    host: ScriptedHost,
    config: Arc<RuntimeConfig>,
) -> App {
    let mut app = App::new();

    app.insert_resource(MissionClock::new(config.tick_seconds))
        .insert_resource(RuntimeConfigHandle::new(config))
        .insert_resource(HostWorld(host))
        .insert_resource(ActiveMission {
            runtime: Some(runtime),
            last_report: None,
        })
        .add_plugins(MinimalPlugins)
        .add_systems(Update, (advance_clock, run_mission_tick).chain());

    app
}

/// Advances the mission clock by one step and evaluates one tick at the new
/// time. The first call evaluates at time zero.
pub fn run_tick(app: &mut App) -> Option<TickReport> {
    app.update();
    app.world.resource::<ActiveMission>().last_report.clone()
}

/// Resolves the mission and removes its runtime from the app.
pub fn finish_mission(app: &mut App) -> Option<MissionSummary> {
    app.world
        .resource_mut::<ActiveMission>()
        .runtime
        .take()
        .map(MissionRuntime::finish)
}

fn advance_clock(mut clock: ResMut<MissionClock>, mut host: ResMut<HostWorld>) {
    if clock.ticks > 0 {
        clock.time += clock.step;
    }
    clock.ticks += 1;
    host.0.set_time(clock.time);
}

fn run_mission_tick(mut active: ResMut<ActiveMission>, mut host: ResMut<HostWorld>) {
    let active = &mut *active;
    if let Some(runtime) = active.runtime.as_mut() {
        active.last_report = Some(runtime.tick(&mut host.0));
    }
}
