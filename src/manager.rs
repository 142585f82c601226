use crate::clock::Clock;
use crate::config::LoadingConfig;
use crate::effects::EffectGate;
use crate::host::OverlayHost;
use crate::observer::{LoadingObserver, ObserverContext};
use crate::registry::{LoadingRegistry, ProcessError, ScreenState};
use anyhow::Result;
use log::{error, info};

struct ObserverSlot {
    name: &'static str,
    observer: Box<dyn LoadingObserver>,
}

/// Reconciles registered loading processes against the host once per tick.
pub struct LoadingManager {
    registry: LoadingRegistry,
    config: LoadingConfig,
    host: Box<dyn OverlayHost>,
    clock: Box<dyn Clock>,
    observers: Vec<ObserverSlot>,
    visibility_listeners: Vec<Box<dyn FnMut(bool)>>,
    input_block: EffectGate,
    performance_saving: EffectGate,
    visible: bool,
}

impl LoadingManager {
    pub fn new(
        mut config: LoadingConfig,
        host: Box<dyn OverlayHost>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let screens = std::mem::take(&mut config.screens);
        Self {
            registry: LoadingRegistry::new(screens),
            config,
            host,
            clock,
            observers: Vec::new(),
            visibility_listeners: Vec::new(),
            input_block: EffectGate::new("input block"),
            performance_saving: EffectGate::new("performance saving"),
            visible: false,
        }
    }

    /// Initializes and adopts an observer. Observers missing from the config
    /// enable-list are skipped; an empty list enables everything.
    pub fn register_observer(&mut self, mut observer: Box<dyn LoadingObserver>) -> Result<()> {
        let name = observer.name();
        if !self.config.observer_enabled(name) {
            info!("[loading] observer '{name}' disabled by config");
            return Ok(());
        }
        let now = self.clock.now();
        let mut ctx = ObserverContext::new(&mut self.registry, now);
        observer.initialize(&mut ctx)?;
        self.observers.push(ObserverSlot { name, observer });
        Ok(())
    }

    pub fn add_process(&mut self, name: &str, tag: &str, reason: &str) -> Result<(), ProcessError> {
        self.registry.add_process(name, tag, reason)
    }

    pub fn remove_process(&mut self, name: &str) -> Result<(), ProcessError> {
        let now = self.clock.now();
        self.registry.remove_process(name, now)
    }

    pub fn remove_screen(&mut self, tag: &str) -> bool {
        let now = self.clock.now();
        self.registry.remove_screen(tag, now)
    }

    pub fn set_widget_override(&mut self, tag: &str, widget: &str) -> bool {
        self.registry.set_widget_override(tag, widget)
    }

    pub fn reasons(&self, tag: &str) -> Vec<String> {
        self.registry.reasons(tag).into_iter().map(str::to_string).collect()
    }

    pub fn reason_of(&self, name: &str) -> Option<String> {
        self.registry.reason_of(name).map(str::to_string)
    }

    pub fn on_visibility_changed(&mut self, listener: impl FnMut(bool) + 'static) {
        self.visibility_listeners.push(Box::new(listener));
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn input_blocked(&self) -> bool {
        self.input_block.engaged()
    }

    pub fn saving_performance(&self) -> bool {
        self.performance_saving.engaged()
    }

    pub fn registry(&self) -> &LoadingRegistry {
        &self.registry
    }

    /// One reconciliation pass. Observers always run; while the host splash
    /// is up, queued shows and hides wait untouched.
    pub fn tick(&mut self, dt: f64) {
        self.tick_observers(dt);

        if self.host.splash_active() {
            return;
        }

        self.process_pending_shows();
        self.process_pending_hides();
        self.refresh_visibility();
    }

    /// Tears everything down: observers out, overlays destroyed, gates
    /// released, one final visibility event if a screen was showing.
    pub fn shutdown(&mut self) {
        for slot in &mut self.observers {
            slot.observer.deinitialize();
        }
        self.observers.clear();

        let drained = self.registry.drain();

        let was_visible = self.visible;
        self.visible = false;

        if let Some(engaged) = self.input_block.reset() {
            self.apply_input_block(engaged);
        }
        if let Some(engaged) = self.performance_saving.reset() {
            self.apply_performance_saving(engaged);
        }

        for state in drained {
            if let Some(handle) = state.overlay {
                self.host.destroy_overlay(handle);
            }
        }

        if was_visible {
            info!("[loading] screen visibility changed: false");
            for listener in &mut self.visibility_listeners {
                listener(false);
            }
        }
    }

    fn tick_observers(&mut self, dt: f64) {
        let now = self.clock.now();
        let mut ctx = ObserverContext::new(&mut self.registry, now);
        for slot in &mut self.observers {
            if let Err(err) = slot.observer.tick(&mut ctx, dt) {
                error!("[loading] observer '{}' tick failed: {err:?}", slot.name);
            }
        }
    }

    fn process_pending_shows(&mut self) {
        for tag in self.registry.take_pending_shows() {
            self.show_screen(&tag);
        }
    }

    fn show_screen(&mut self, tag: &str) {
        let (widget, z_order, block_input, save_performance, has_overlay) = {
            let Some(state) = self.registry.screen(tag) else { return };
            (
                state.definition.widget.clone(),
                state.definition.z_order,
                state.definition.block_input,
                state.definition.save_performance,
                state.overlay.is_some(),
            )
        };

        info!("[loading] screen shown (category '{tag}')");

        if !has_overlay {
            if let Some(handle) = self.host.create_overlay(tag, &widget, z_order) {
                if let Some(state) = self.registry.screen_mut(tag) {
                    state.overlay = Some(handle);
                }
            } else {
                error!("[loading] failed to create overlay '{widget}' (category '{tag}')");
            }
        }

        if block_input {
            self.adjust_input_block(true);
        }
        if save_performance {
            self.adjust_performance_saving(true);
        }
        if self.config.force_refresh {
            self.host.refresh();
        }
    }

    fn process_pending_hides(&mut self) {
        let now = self.clock.now();
        for (tag, state) in self.registry.expire_hides(now, self.config.hold_screens) {
            self.hide_screen(&tag, state);
        }
    }

    fn hide_screen(&mut self, tag: &str, state: ScreenState) {
        info!("[loading] screen hidden (category '{tag}')");
        if state.definition.block_input {
            self.adjust_input_block(false);
        }
        if state.definition.save_performance {
            self.adjust_performance_saving(false);
        }
        if let Some(handle) = state.overlay {
            self.host.destroy_overlay(handle);
        }
    }

    fn refresh_visibility(&mut self) {
        let now_visible = self.registry.live_overlay_count() > 0;
        if self.visible != now_visible {
            self.visible = now_visible;
            info!("[loading] screen visibility changed: {now_visible}");
            for listener in &mut self.visibility_listeners {
                listener(now_visible);
            }
        }
    }

    fn adjust_input_block(&mut self, engage: bool) {
        let edge =
            if engage { self.input_block.increment() } else { self.input_block.decrement() };
        if let Some(engaged) = edge {
            self.apply_input_block(engaged);
        }
    }

    fn adjust_performance_saving(&mut self, engage: bool) {
        let edge = if engage {
            self.performance_saving.increment()
        } else {
            self.performance_saving.decrement()
        };
        if let Some(engaged) = edge {
            self.apply_performance_saving(engaged);
        }
    }

    fn apply_input_block(&mut self, engaged: bool) {
        info!("[loading] input block {}", if engaged { "enabled" } else { "disabled" });
        self.host.set_input_blocked(engaged);
    }

    fn apply_performance_saving(&mut self, engaged: bool) {
        info!("[loading] performance saving {}", if engaged { "enabled" } else { "disabled" });
        self.host.set_performance_saving(engaged);
    }
}
