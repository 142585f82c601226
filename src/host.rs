use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Opaque ticket for one live overlay widget. The manager never inspects the
/// widget itself, it only hands the ticket back on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayHandle(u64);

impl OverlayHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Seam between the manager and whatever UI layer actually owns widgets.
pub trait OverlayHost {
    /// Returns `None` when the widget cannot be built right now. The manager
    /// treats that category as shown anyway and will not retry.
    fn create_overlay(&mut self, tag: &str, widget: &str, z_order: i32) -> Option<OverlayHandle>;

    fn destroy_overlay(&mut self, handle: OverlayHandle);

    /// While the host's startup splash is still up, show/hide work is parked.
    fn splash_active(&self) -> bool {
        false
    }

    fn set_input_blocked(&mut self, _engaged: bool) {}

    fn set_performance_saving(&mut self, _engaged: bool) {}

    /// One synchronous paint so a freshly shown overlay reaches the screen
    /// before a blocking load stalls the frame loop.
    fn refresh(&mut self) {}
}

/// One recorded host interaction, in call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    Create { tag: String, widget: String, z_order: i32, handle: u64 },
    CreateFailed { tag: String, widget: String },
    Destroy { handle: u64 },
    InputBlock { engaged: bool },
    PerformanceSaving { engaged: bool },
    Refresh,
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u64,
    live: HashSet<u64>,
    fail_widgets: HashSet<String>,
    splash_active: bool,
    calls: Vec<HostCall>,
}

/// Widgetless host for tests and the scenario harness. Clones share state, so
/// a test can keep one handle for inspection while the manager drives another.
#[derive(Clone, Default)]
pub struct HeadlessHost {
    inner: Rc<RefCell<HeadlessState>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_splash_active(&self, active: bool) {
        self.inner.borrow_mut().splash_active = active;
    }

    /// Makes every `create_overlay` for `widget` report failure until
    /// `allow_creation_for` clears it.
    pub fn fail_creation_for(&self, widget: impl Into<String>) {
        self.inner.borrow_mut().fail_widgets.insert(widget.into());
    }

    pub fn allow_creation_for(&self, widget: &str) {
        self.inner.borrow_mut().fail_widgets.remove(widget);
    }

    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut self.inner.borrow_mut().calls)
    }

    pub fn active_overlay_count(&self) -> usize {
        self.inner.borrow().live.len()
    }
}

impl OverlayHost for HeadlessHost {
    fn create_overlay(&mut self, tag: &str, widget: &str, z_order: i32) -> Option<OverlayHandle> {
        let mut state = self.inner.borrow_mut();
        if state.fail_widgets.contains(widget) {
            state
                .calls
                .push(HostCall::CreateFailed { tag: tag.to_string(), widget: widget.to_string() });
            return None;
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.live.insert(handle);
        state.calls.push(HostCall::Create {
            tag: tag.to_string(),
            widget: widget.to_string(),
            z_order,
            handle,
        });
        Some(OverlayHandle::new(handle))
    }

    fn destroy_overlay(&mut self, handle: OverlayHandle) {
        let mut state = self.inner.borrow_mut();
        state.live.remove(&handle.raw());
        state.calls.push(HostCall::Destroy { handle: handle.raw() });
    }

    fn splash_active(&self) -> bool {
        self.inner.borrow().splash_active
    }

    fn set_input_blocked(&mut self, engaged: bool) {
        self.inner.borrow_mut().calls.push(HostCall::InputBlock { engaged });
    }

    fn set_performance_saving(&mut self, engaged: bool) {
        self.inner.borrow_mut().calls.push(HostCall::PerformanceSaving { engaged });
    }

    fn refresh(&mut self) {
        self.inner.borrow_mut().calls.push(HostCall::Refresh);
    }
}
