//! Swipe-to-reveal recognizer for comment rows.

use std::collections::HashMap;

use reel_shared::domain::CommentId;

/// Leftward travel needed to reveal the delete affordance.
pub const REVEAL_DISTANCE: f32 = 50.0;
/// Vertical drift tolerated while revealing.
pub const VERTICAL_TOLERANCE: f32 = 30.0;
/// Rightward travel that hides the affordance again.
pub const HIDE_DISTANCE: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwipeOutcome {
    Revealed(CommentId),
    Hidden(CommentId),
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct SwipeTracker {
    starts: HashMap<CommentId, TouchPoint>,
    revealed: Option<CommentId>,
}

impl SwipeTracker {
    pub fn revealed(&self) -> Option<&CommentId> {
        self.revealed.as_ref()
    }

    pub fn touch_start(&mut self, id: &CommentId, at: TouchPoint) {
        self.starts.insert(id.clone(), at);
    }

    pub fn touch_end(&mut self, id: &CommentId, at: TouchPoint) -> SwipeOutcome {
        let Some(start) = self.starts.remove(id) else {
            return SwipeOutcome::Ignored;
        };
        // positive when the finger moved left
        let delta_x = start.x - at.x;
        let delta_y = at.y - start.y;

        if delta_x > REVEAL_DISTANCE && delta_y.abs() < VERTICAL_TOLERANCE {
            self.revealed = Some(id.clone());
            return SwipeOutcome::Revealed(id.clone());
        }
        if delta_x < -HIDE_DISTANCE {
            if let Some(hidden) = self.revealed.take() {
                return SwipeOutcome::Hidden(hidden);
            }
        }
        SwipeOutcome::Ignored
    }

    pub fn hide(&mut self) -> Option<CommentId> {
        self.revealed.take()
    }

    /// Drops all tracking for a row that left the list.
    pub fn forget(&mut self, id: &CommentId) {
        self.starts.remove(id);
        if self.revealed.as_ref() == Some(id) {
            self.revealed = None;
        }
    }
}
