use crate::registry::{LoadingRegistry, ProcessError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

/// What an observer may touch during a pass. Wraps the registry so process
/// removal is stamped with the pass clock sample.
pub struct ObserverContext<'a> {
    registry: &'a mut LoadingRegistry,
    now: f64,
}

impl<'a> ObserverContext<'a> {
    pub fn new(registry: &'a mut LoadingRegistry, now: f64) -> Self {
        Self { registry, now }
    }

    pub fn add_process(&mut self, name: &str, tag: &str, reason: &str) -> Result<(), ProcessError> {
        self.registry.add_process(name, tag, reason)
    }

    pub fn remove_process(&mut self, name: &str) -> Result<(), ProcessError> {
        self.registry.remove_process(name, self.now)
    }
}

/// Source that starts and ends loading processes on the manager's behalf,
/// ticked once per pass before reconciliation.
pub trait LoadingObserver {
    fn name(&self) -> &'static str;

    fn initialize(&mut self, _ctx: &mut ObserverContext<'_>) -> Result<()> {
        Ok(())
    }

    fn tick(&mut self, _ctx: &mut ObserverContext<'_>, _dt: f64) -> Result<()> {
        Ok(())
    }

    fn deinitialize(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldPhase {
    #[default]
    Boot,
    Loading,
    Travel,
    Ready,
}

impl WorldPhase {
    pub fn in_transition(self) -> bool {
        self != WorldPhase::Ready
    }
}

/// Shared phase slot. The host publishes through one clone while the world
/// observer polls another.
#[derive(Clone, Default)]
pub struct WorldSignal {
    phase: Rc<Cell<WorldPhase>>,
}

impl WorldSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, phase: WorldPhase) {
        self.phase.set(phase);
    }

    pub fn get(&self) -> WorldPhase {
        self.phase.get()
    }
}

pub const WORLD_LOAD_PROCESS: &str = "world-load";

/// Holds a loading process for as long as the world signal reports a
/// transition. Edge-triggered: one add when the world leaves Ready, one
/// remove when it comes back.
pub struct WorldLoadObserver {
    signal: WorldSignal,
    tag: String,
    reason: String,
    holding: bool,
}

impl WorldLoadObserver {
    pub fn new(signal: WorldSignal, tag: impl Into<String>) -> Self {
        Self { signal, tag: tag.into(), reason: "Loading World".to_string(), holding: false }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

impl LoadingObserver for WorldLoadObserver {
    fn name(&self) -> &'static str {
        "world-load"
    }

    fn tick(&mut self, ctx: &mut ObserverContext<'_>, _dt: f64) -> Result<()> {
        let transitioning = self.signal.get().in_transition();
        if transitioning == self.holding {
            return Ok(());
        }
        // Flip before calling out; a failed request is not retried.
        self.holding = transitioning;
        if transitioning {
            ctx.add_process(WORLD_LOAD_PROCESS, &self.tag, &self.reason)?;
        } else {
            ctx.remove_process(WORLD_LOAD_PROCESS)?;
        }
        Ok(())
    }

    fn deinitialize(&mut self) {
        self.holding = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenDefinition;
    use std::collections::HashMap;

    fn registry() -> LoadingRegistry {
        let mut definitions = HashMap::new();
        definitions.insert("travel".to_string(), ScreenDefinition::new("TravelOverlay"));
        LoadingRegistry::new(definitions)
    }

    #[test]
    fn world_observer_follows_phase_edges() {
        let signal = WorldSignal::new();
        let mut observer = WorldLoadObserver::new(signal.clone(), "travel");
        let mut registry = registry();

        let mut ctx = ObserverContext::new(&mut registry, 0.0);
        observer.tick(&mut ctx, 0.1).expect("boot phase holds a process");
        observer.tick(&mut ctx, 0.1).expect("steady phase is a no-op");
        drop(ctx);
        let state = registry.screen("travel").expect("travel screen live");
        assert_eq!(state.process_count(), 1, "exactly one hold per edge");
        assert!(state.has_process(WORLD_LOAD_PROCESS));
        assert_eq!(registry.reason_of(WORLD_LOAD_PROCESS), Some("Loading World"));

        signal.set(WorldPhase::Ready);
        let mut ctx = ObserverContext::new(&mut registry, 3.5);
        observer.tick(&mut ctx, 0.1).expect("ready phase releases the process");
        drop(ctx);
        assert_eq!(
            registry.pending_hide_started("travel"),
            Some(3.5),
            "release stamps the pass clock"
        );
    }

    #[test]
    fn custom_reason_is_reported() {
        let signal = WorldSignal::new();
        signal.set(WorldPhase::Travel);
        let mut observer =
            WorldLoadObserver::new(signal, "travel").with_reason("Travelling to the hub");
        let mut registry = registry();
        let mut ctx = ObserverContext::new(&mut registry, 0.0);
        observer.tick(&mut ctx, 0.1).expect("travel phase holds a process");
        drop(ctx);
        assert_eq!(registry.reason_of(WORLD_LOAD_PROCESS), Some("Travelling to the hub"));
    }
}
