use log::warn;

/// Reference-counted latch for one host side effect. Several categories can
/// demand the same effect at once; the gate reports an edge only when the
/// count crosses zero in either direction.
#[derive(Debug)]
pub struct EffectGate {
    label: &'static str,
    count: u32,
    engaged: bool,
}

impl EffectGate {
    pub fn new(label: &'static str) -> Self {
        Self { label, count: 0, engaged: false }
    }

    /// Returns `Some(true)` when this increment engaged the effect.
    pub fn increment(&mut self) -> Option<bool> {
        self.count += 1;
        if self.engaged {
            None
        } else {
            self.engaged = true;
            Some(true)
        }
    }

    /// Returns `Some(false)` when this decrement released the effect.
    pub fn decrement(&mut self) -> Option<bool> {
        if self.count == 0 {
            debug_assert!(false, "effect gate '{}' decremented below zero", self.label);
            warn!("[loading] effect gate '{}' decremented below zero", self.label);
            return None;
        }
        self.count -= 1;
        if self.count == 0 && self.engaged {
            self.engaged = false;
            Some(false)
        } else {
            None
        }
    }

    /// Drops the count outright, as on shutdown. Returns `Some(false)` when
    /// the effect was engaged and must now be released.
    pub fn reset(&mut self) -> Option<bool> {
        self.count = 0;
        if self.engaged {
            self.engaged = false;
            Some(false)
        } else {
            None
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }
}
