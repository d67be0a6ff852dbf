use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a pointer button (primary button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerButton(u8);

impl PointerButton {
    pub const PRIMARY: Self = Self(0);
    pub const SECONDARY: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Pointer input forwarded by the embedding surface. Positions are in
/// pixels relative to the top-left corner of the render target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Vec2, button: PointerButton },
    Move { position: Vec2 },
    Up { position: Vec2, button: PointerButton },
    Wheel { position: Vec2, delta: f32 },
}

impl PointerEvent {
    pub fn position(&self) -> Vec2 {
        match *self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Wheel { position, .. } => position,
        }
    }
}

/// Tracks pressed buttons and the distance travelled since the last press.
#[derive(Debug, Default)]
pub struct PointerState {
    buttons: RwLock<HashSet<PointerButton>>,
    position: RwLock<Vec2>,
    press_origin: RwLock<Option<Vec2>>,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds an event into the state and returns the pointer movement it
    /// caused.
    pub fn record(&self, event: &PointerEvent) -> Vec2 {
        let previous = std::mem::replace(&mut *self.position.write(), event.position());
        match *event {
            PointerEvent::Down { position, button } => {
                self.buttons.write().insert(button);
                *self.press_origin.write() = Some(position);
            }
            // The press origin survives the release so the release can still
            // be classified as a click or the end of a drag.
            PointerEvent::Up { button, .. } => {
                self.buttons.write().remove(&button);
            }
            PointerEvent::Move { .. } | PointerEvent::Wheel { .. } => {}
        }
        event.position() - previous
    }

    pub fn is_pressed(&self, button: PointerButton) -> bool {
        self.buttons.read().contains(&button)
    }

    pub fn any_pressed(&self) -> bool {
        !self.buttons.read().is_empty()
    }

    pub fn position(&self) -> Vec2 {
        *self.position.read()
    }

    /// Distance between the current position and where the last press
    /// started, or zero when nothing was pressed yet.
    pub fn drag_distance(&self) -> f32 {
        self.press_origin
            .read()
            .map(|origin| origin.distance(self.position()))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_buttons_and_drag_distance() {
        let state = PointerState::new();
        state.record(&PointerEvent::Down {
            position: Vec2::new(10.0, 10.0),
            button: PointerButton::PRIMARY,
        });
        assert!(state.is_pressed(PointerButton::PRIMARY));
        let delta = state.record(&PointerEvent::Move {
            position: Vec2::new(13.0, 14.0),
        });
        assert_eq!(delta, Vec2::new(3.0, 4.0));
        assert_eq!(state.drag_distance(), 5.0);
        state.record(&PointerEvent::Up {
            position: Vec2::new(13.0, 14.0),
            button: PointerButton::PRIMARY,
        });
        assert!(!state.any_pressed());
        assert_eq!(state.drag_distance(), 5.0);
    }

    #[test]
    fn button_indices_round_trip() {
        assert_eq!(PointerButton::new(2), PointerButton::MIDDLE);
        assert_eq!(PointerButton::SECONDARY.index(), 1);
    }
}
