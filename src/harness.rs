//! Deterministic scenario harness: a fixture describes a screen configuration
//! and a timeline of calls, the manager runs against the headless host on a
//! hand-stepped clock, and every host interaction is recorded for golden
//! comparison.

use std::cell::RefCell;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::clock::ManualClock;
use crate::config::LoadingConfig;
use crate::host::{HeadlessHost, HostCall};
use crate::manager::LoadingManager;
use crate::observer::{WorldLoadObserver, WorldPhase, WorldSignal};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScenarioFixture {
    #[serde(default)]
    pub config: LoadingConfig,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub world_observer: Option<WorldObserverSetup>,
    #[serde(default)]
    pub events: Vec<TimedEvent>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorldObserverSetup {
    pub tag: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One scenario call, applied at the start of step `at`, before that step's
/// tick.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TimedEvent {
    pub at: usize,
    pub action: ScenarioEvent,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioEvent {
    AddProcess { name: String, tag: String, reason: String },
    RemoveProcess { name: String },
    RemoveScreen { tag: String },
    SetWidgetOverride { tag: String, widget: String },
    SetWorldPhase { phase: WorldPhase },
    SetSplashActive { active: bool },
    FailWidget { widget: String },
    AllowWidget { widget: String },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioOutput {
    pub steps: usize,
    pub dt: f64,
    pub records: Vec<StepRecord>,
    pub final_state: FinalState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub rejections: Vec<String>,
    pub host_calls: Vec<HostCall>,
    pub visibility_events: Vec<bool>,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalState {
    pub visible: bool,
    pub input_blocked: bool,
    pub saving_performance: bool,
    pub screens: Vec<ScreenSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenSummary {
    pub tag: String,
    pub widget: String,
    pub reasons: Vec<String>,
    pub has_overlay: bool,
    pub pending_hide: bool,
}

pub fn run_scenario(fixture: &ScenarioFixture) -> Result<ScenarioOutput> {
    let clock = ManualClock::new();
    let host = HeadlessHost::new();
    let world = WorldSignal::new();

    let mut manager = LoadingManager::new(
        fixture.config.clone(),
        Box::new(host.clone()),
        Box::new(clock.clone()),
    );

    let visibility_log: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&visibility_log);
    manager.on_visibility_changed(move |visible| sink.borrow_mut().push(visible));

    if let Some(setup) = &fixture.world_observer {
        let mut observer = WorldLoadObserver::new(world.clone(), setup.tag.clone());
        if let Some(reason) = &setup.reason {
            observer = observer.with_reason(reason.clone());
        }
        manager
            .register_observer(Box::new(observer))
            .context("registering world observer")?;
    }

    let mut records = Vec::with_capacity(fixture.steps);
    for step in 0..fixture.steps {
        clock.set(step as f64 * fixture.dt);

        let mut rejections = Vec::new();
        for event in fixture.events.iter().filter(|event| event.at == step) {
            apply_event(&event.action, &mut manager, &host, &world, &mut rejections);
        }

        manager.tick(fixture.dt);

        records.push(StepRecord {
            step,
            rejections,
            host_calls: host.take_calls(),
            visibility_events: std::mem::take(&mut *visibility_log.borrow_mut()),
            visible: manager.is_visible(),
        });
    }

    Ok(ScenarioOutput {
        steps: fixture.steps,
        dt: fixture.dt,
        records,
        final_state: summarize(&manager),
    })
}

pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<ScenarioFixture> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("opening scenario '{}'", path.as_ref().display()))?;
    serde_json::from_reader(file).with_context(|| "parsing scenario JSON")
}

fn apply_event(
    event: &ScenarioEvent,
    manager: &mut LoadingManager,
    host: &HeadlessHost,
    world: &WorldSignal,
    rejections: &mut Vec<String>,
) {
    match event {
        ScenarioEvent::AddProcess { name, tag, reason } => {
            if let Err(err) = manager.add_process(name, tag, reason) {
                rejections.push(err.to_string());
            }
        }
        ScenarioEvent::RemoveProcess { name } => {
            if let Err(err) = manager.remove_process(name) {
                rejections.push(err.to_string());
            }
        }
        ScenarioEvent::RemoveScreen { tag } => {
            if !manager.remove_screen(tag) {
                rejections.push(format!("no live screen for category '{tag}'"));
            }
        }
        ScenarioEvent::SetWidgetOverride { tag, widget } => {
            if !manager.set_widget_override(tag, widget) {
                rejections.push(format!("widget override rejected for category '{tag}'"));
            }
        }
        ScenarioEvent::SetWorldPhase { phase } => world.set(*phase),
        ScenarioEvent::SetSplashActive { active } => host.set_splash_active(*active),
        ScenarioEvent::FailWidget { widget } => host.fail_creation_for(widget.clone()),
        ScenarioEvent::AllowWidget { widget } => host.allow_creation_for(widget),
        ScenarioEvent::Shutdown => manager.shutdown(),
    }
}

fn summarize(manager: &LoadingManager) -> FinalState {
    let registry = manager.registry();
    let screens = registry
        .screens()
        .map(|(tag, state)| ScreenSummary {
            tag: tag.to_string(),
            widget: state.definition.widget.clone(),
            reasons: state.reasons().into_iter().map(str::to_string).collect(),
            has_overlay: state.overlay.is_some(),
            pending_hide: registry.pending_hide_started(tag).is_some(),
        })
        .collect();

    FinalState {
        visible: manager.is_visible(),
        input_blocked: manager.input_blocked(),
        saving_performance: manager.saving_performance(),
        screens,
    }
}

fn default_steps() -> usize {
    4
}

fn default_dt() -> f64 {
    0.5
}
