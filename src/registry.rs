use crate::config::ScreenDefinition;
use crate::host::OverlayHandle;
use log::{debug, error};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("no screen configured for category '{0}'")]
    UnconfiguredTag(String),
    #[error("loading reason not set")]
    EmptyReason,
    #[error("process name not set")]
    EmptyName,
    #[error("process '{0}' already registered for this category")]
    DuplicateProcess(String),
    #[error("process '{0}' not registered")]
    UnknownProcess(String),
}

/// Live record for one category. The definition is snapshotted when the
/// first process arrives.
#[derive(Debug, Clone)]
pub struct ScreenState {
    pub definition: ScreenDefinition,
    processes: BTreeMap<String, String>,
    pub overlay: Option<OverlayHandle>,
}

impl ScreenState {
    fn new(definition: ScreenDefinition) -> Self {
        Self { definition, processes: BTreeMap::new(), overlay: None }
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn has_process(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    pub fn reason_of(&self, name: &str) -> Option<&str> {
        self.processes.get(name).map(String::as_str)
    }

    pub fn reasons(&self) -> Vec<&str> {
        self.processes.values().map(String::as_str).collect()
    }
}

/// Category-keyed bookkeeping behind the manager: live processes, queued
/// shows, and hides waiting out their hold window.
pub struct LoadingRegistry {
    definitions: HashMap<String, ScreenDefinition>,
    widget_overrides: HashMap<String, String>,
    screens: BTreeMap<String, ScreenState>,
    pending_show: BTreeSet<String>,
    pending_hide: BTreeMap<String, f64>,
}

impl LoadingRegistry {
    pub fn new(definitions: HashMap<String, ScreenDefinition>) -> Self {
        Self {
            definitions,
            widget_overrides: HashMap::new(),
            screens: BTreeMap::new(),
            pending_show: BTreeSet::new(),
            pending_hide: BTreeMap::new(),
        }
    }

    /// Registers one named process under a category. The first process of a
    /// category queues its screen for display; any later one just joins the
    /// record and cancels a pending teardown.
    pub fn add_process(&mut self, name: &str, tag: &str, reason: &str) -> Result<(), ProcessError> {
        if tag.trim().is_empty() {
            return reject(ProcessError::UnconfiguredTag(tag.to_string()));
        }
        if reason.trim().is_empty() {
            return reject(ProcessError::EmptyReason);
        }
        if name.trim().is_empty() {
            return reject(ProcessError::EmptyName);
        }

        if let Some(state) = self.screens.get_mut(tag) {
            if state.processes.contains_key(name) {
                return reject(ProcessError::DuplicateProcess(name.to_string()));
            }
            state.processes.insert(name.to_string(), reason.to_string());
            self.pending_hide.remove(tag);
            debug!("[loading] add process '{name}' (category '{tag}', reason: {reason})");
            return Ok(());
        }

        let Some(definition) = self.definitions.get(tag) else {
            return reject(ProcessError::UnconfiguredTag(tag.to_string()));
        };
        let mut definition = definition.clone();
        if let Some(widget) = self.widget_overrides.get(tag) {
            definition.widget = widget.clone();
        }

        let mut state = ScreenState::new(definition);
        state.processes.insert(name.to_string(), reason.to_string());
        self.screens.insert(tag.to_string(), state);
        self.pending_show.insert(tag.to_string());
        self.pending_hide.remove(tag);
        debug!("[loading] add process '{name}' (new category '{tag}', reason: {reason})");
        Ok(())
    }

    /// Unregisters a process by name, wherever it lives. When its category
    /// empties, the screen is stamped pending-hide at `now`.
    pub fn remove_process(&mut self, name: &str, now: f64) -> Result<(), ProcessError> {
        for (tag, state) in self.screens.iter_mut() {
            if state.processes.remove(name).is_some() {
                debug!("[loading] remove process '{name}' (category '{tag}')");
                if state.processes.is_empty() {
                    self.pending_hide.insert(tag.clone(), now);
                }
                return Ok(());
            }
        }
        reject(ProcessError::UnknownProcess(name.to_string()))
    }

    /// Force-marks a whole category pending-hide, remaining processes
    /// included. They stay in the record, so an add before the hold expires
    /// revives the screen untouched. Repeat calls restamp the clock.
    pub fn remove_screen(&mut self, tag: &str, now: f64) -> bool {
        if self.screens.contains_key(tag) {
            self.pending_hide.insert(tag.to_string(), now);
            debug!("[loading] category '{tag}' marked for teardown");
            true
        } else {
            false
        }
    }

    pub fn reason_of(&self, name: &str) -> Option<&str> {
        self.screens.values().find_map(|state| state.reason_of(name))
    }

    pub fn reasons(&self, tag: &str) -> Vec<&str> {
        self.screens.get(tag).map(ScreenState::reasons).unwrap_or_default()
    }

    /// Overrides the widget used the next time `tag`'s screen is created.
    /// Screens already up keep their snapshot.
    pub fn set_widget_override(&mut self, tag: &str, widget: &str) -> bool {
        if tag.trim().is_empty() {
            error!("[loading] widget override rejected: empty category tag");
            return false;
        }
        if widget.trim().is_empty() {
            error!("[loading] widget override rejected: empty widget name");
            return false;
        }
        self.widget_overrides.insert(tag.to_string(), widget.to_string());
        true
    }

    /// Hands the reconciliation pass every category queued for display.
    pub fn take_pending_shows(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_show).into_iter().collect()
    }

    /// Removes and returns every pending-hide category whose hold window has
    /// elapsed against the single `now` sample. With holding disabled every
    /// pending entry expires immediately.
    pub fn expire_hides(&mut self, now: f64, hold_enabled: bool) -> Vec<(String, ScreenState)> {
        let due: Vec<String> = self
            .pending_hide
            .iter()
            .filter(|(tag, start)| {
                let hold = if hold_enabled {
                    self.screens.get(*tag).map(|s| s.definition.hold_secs).unwrap_or(0.0)
                } else {
                    0.0
                };
                hold <= now - **start
            })
            .map(|(tag, _)| tag.clone())
            .collect();

        let mut expired = Vec::with_capacity(due.len());
        for tag in due {
            self.pending_hide.remove(&tag);
            if let Some(state) = self.screens.remove(&tag) {
                expired.push((tag, state));
            }
        }
        expired
    }

    /// Empties everything and returns the states that were live so the caller
    /// can release their overlays and gate holds.
    pub fn drain(&mut self) -> Vec<ScreenState> {
        self.widget_overrides.clear();
        self.pending_show.clear();
        self.pending_hide.clear();
        std::mem::take(&mut self.screens).into_values().collect()
    }

    pub fn screen(&self, tag: &str) -> Option<&ScreenState> {
        self.screens.get(tag)
    }

    pub fn screen_mut(&mut self, tag: &str) -> Option<&mut ScreenState> {
        self.screens.get_mut(tag)
    }

    pub fn is_active(&self, tag: &str) -> bool {
        self.screens.contains_key(tag)
    }

    /// Live screens in tag order.
    pub fn screens(&self) -> impl Iterator<Item = (&str, &ScreenState)> {
        self.screens.iter().map(|(tag, state)| (tag.as_str(), state))
    }

    pub fn pending_hide_started(&self, tag: &str) -> Option<f64> {
        self.pending_hide.get(tag).copied()
    }

    pub fn live_overlay_count(&self) -> usize {
        self.screens.values().filter(|state| state.overlay.is_some()).count()
    }
}

fn reject<T>(err: ProcessError) -> Result<T, ProcessError> {
    error!("[loading] {err}");
    Err(err)
}
