use tracing::debug;

use super::timing::ease_factor;

pub const DIMMER_ACTIVE_OPACITY: f32 = 0.95;
pub const DIMMER_EASE: f32 = 0.1;
pub const DIMMER_VISIBLE_THRESHOLD: f32 = 0.01;
/// Distance of the dimmer plane in front of the camera.
pub const DIMMER_DISTANCE: f32 = 5.0;
pub const DIMMER_SIZE: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Unfocused,
    Focused(usize),
}

impl FocusState {
    pub fn index(self) -> Option<usize> {
        match self {
            FocusState::Unfocused => None,
            FocusState::Focused(idx) => Some(idx),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChange {
    pub from: FocusState,
    pub to: FocusState,
}

/// Exclusive focus over at most one gallery item.
#[derive(Debug, Default)]
pub struct FocusSM {
    state: FocusState,
}

impl FocusSM {
    pub fn current(&self) -> FocusState {
        self.state
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.state.index()
    }

    pub fn is_focused(&self) -> bool {
        self.state != FocusState::Unfocused
    }

    /// Select/deselect toggle: re-selecting the focused item clears focus,
    /// any other item takes focus directly.
    pub fn select(&mut self, index: usize) -> Option<FocusChange> {
        match self.state {
            FocusState::Focused(current) if current == index => self.goto(FocusState::Unfocused),
            _ => self.goto(FocusState::Focused(index)),
        }
    }

    pub fn clear(&mut self) -> Option<FocusChange> {
        self.goto(FocusState::Unfocused)
    }

    /// Drop focus when the item set shrinks below the focused index.
    pub fn retain(&mut self, total: usize) -> Option<FocusChange> {
        match self.state {
            FocusState::Focused(idx) if idx >= total => self.goto(FocusState::Unfocused),
            _ => None,
        }
    }

    fn goto(&mut self, to: FocusState) -> Option<FocusChange> {
        if self.state == to {
            return None;
        }
        let change = FocusChange {
            from: self.state,
            to,
        };
        debug!(from = ?change.from, to = ?change.to, "focus changed");
        self.state = to;
        Some(change)
    }
}

/// Background blackout that fades in while an item is focused.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dimmer {
    opacity: f32,
}

impl Dimmer {
    pub fn tick(&mut self, active: bool, steps: f32) {
        let target = if active { DIMMER_ACTIVE_OPACITY } else { 0.0 };
        self.opacity += (target - self.opacity) * ease_factor(DIMMER_EASE, steps);
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > DIMMER_VISIBLE_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_twice_clears() {
        let mut sm = FocusSM::default();
        let ch = sm.select(3).unwrap();
        assert_eq!((ch.from, ch.to), (FocusState::Unfocused, FocusState::Focused(3)));
        let ch = sm.select(3).unwrap();
        assert_eq!((ch.from, ch.to), (FocusState::Focused(3), FocusState::Unfocused));
        assert_eq!(sm.focused_index(), None);
    }

    #[test]
    fn select_other_switches_directly() {
        let mut sm = FocusSM::default();
        sm.select(1);
        let ch = sm.select(4).unwrap();
        assert_eq!((ch.from, ch.to), (FocusState::Focused(1), FocusState::Focused(4)));
        assert!(sm.is_focused());
    }

    #[test]
    fn clear_when_unfocused_is_noop() {
        let mut sm = FocusSM::default();
        assert!(sm.clear().is_none());
    }

    #[test]
    fn retain_drops_out_of_range_focus() {
        let mut sm = FocusSM::default();
        sm.select(5);
        assert!(sm.retain(6).is_none());
        assert!(sm.retain(5).is_some());
        assert_eq!(sm.current(), FocusState::Unfocused);
    }

    #[test]
    fn dimmer_eases_gradually() {
        let mut dimmer = Dimmer::default();
        assert!(!dimmer.is_visible());
        dimmer.tick(true, 1.0);
        assert!((dimmer.opacity() - 0.095).abs() < 1e-6);
        assert!(dimmer.is_visible());
        for _ in 0..100 {
            dimmer.tick(true, 1.0);
        }
        assert!((dimmer.opacity() - DIMMER_ACTIVE_OPACITY).abs() < 1e-3);
        for _ in 0..100 {
            dimmer.tick(false, 1.0);
        }
        assert!(!dimmer.is_visible());
    }
}
