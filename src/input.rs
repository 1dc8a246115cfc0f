use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::camera::DragMode;

/// Pointer and scroll input in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { x: f64, y: f64 },
    /// `pan` carries the modifier flag that selects panning over orbiting.
    Move { x: f64, y: f64, pan: bool },
    Up,
    Wheel { delta: f64 },
}

/// Camera gesture derived from a pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Drag {
        delta_x: f64,
        delta_y: f64,
        mode: DragMode,
    },
    Scroll {
        delta: f64,
    },
}

/// Tracks the held button and last pointer position between events.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerTracker {
    last: Option<DVec2>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }

    /// Updates tracking state and returns the gesture, if any, the event produces.
    pub fn handle(&mut self, event: PointerEvent) -> Option<Gesture> {
        match event {
            PointerEvent::Down { x, y } => {
                self.last = Some(DVec2::new(x, y));
                None
            }
            PointerEvent::Up => {
                self.last = None;
                None
            }
            PointerEvent::Move { x, y, pan } => {
                let last = self.last?;
                let position = DVec2::new(x, y);
                self.last = Some(position);
                let delta = position - last;
                Some(Gesture::Drag {
                    delta_x: delta.x,
                    delta_y: delta.y,
                    mode: if pan { DragMode::Pan } else { DragMode::Rotate },
                })
            }
            PointerEvent::Wheel { delta } => Some(Gesture::Scroll { delta }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_without_a_held_button_are_ignored() {
        let mut tracker = PointerTracker::new();
        assert_eq!(
            tracker.handle(PointerEvent::Move {
                x: 5.0,
                y: 5.0,
                pan: false
            }),
            None
        );
        assert!(!tracker.is_dragging());
    }

    #[test]
    fn drag_reports_deltas_since_last_move() {
        let mut tracker = PointerTracker::new();
        tracker.handle(PointerEvent::Down { x: 10.0, y: 10.0 });
        let first = tracker.handle(PointerEvent::Move {
            x: 14.0,
            y: 7.0,
            pan: false,
        });
        assert_eq!(
            first,
            Some(Gesture::Drag {
                delta_x: 4.0,
                delta_y: -3.0,
                mode: DragMode::Rotate
            })
        );
        let second = tracker.handle(PointerEvent::Move {
            x: 15.0,
            y: 7.0,
            pan: true,
        });
        assert_eq!(
            second,
            Some(Gesture::Drag {
                delta_x: 1.0,
                delta_y: 0.0,
                mode: DragMode::Pan
            })
        );
        tracker.handle(PointerEvent::Up);
        assert!(!tracker.is_dragging());
    }

    #[test]
    fn wheel_always_scrolls() {
        let mut tracker = PointerTracker::new();
        assert_eq!(
            tracker.handle(PointerEvent::Wheel { delta: -120.0 }),
            Some(Gesture::Scroll { delta: -120.0 })
        );
    }
}
