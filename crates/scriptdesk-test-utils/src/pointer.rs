//! Fake pointer platform.

use std::sync::Mutex;

use scriptdesk_core::{Point, PointerPlatform};

#[derive(Debug)]
struct State {
    position: Option<Point>,
    moves: Vec<Point>,
}

/// In-memory pointer that records every move request.
///
/// Moves land `skew` pixels right and down of the requested point, which
/// lets tests exercise the calibration tolerance.
#[derive(Debug)]
pub struct FakePointer {
    state: Mutex<State>,
    skew: i32,
    screens: Vec<Point>,
}

impl FakePointer {
    /// Pointer at `start` on a single 1920x1080 screen.
    pub fn at(start: Point) -> Self {
        Self {
            state: Mutex::new(State {
                position: Some(start),
                moves: Vec::new(),
            }),
            skew: 0,
            screens: vec![Point::new(960, 540)],
        }
    }

    /// Pointer that is never available.
    pub fn detached() -> Self {
        let pointer = Self::at(Point::default());
        if let Ok(mut state) = pointer.state.lock() {
            state.position = None;
        }
        pointer
    }

    /// Builder: offset applied to every move.
    pub fn with_skew(mut self, skew: i32) -> Self {
        self.skew = skew;
        self
    }

    /// Builder: replace the screen centres.
    pub fn with_screens(mut self, screens: Vec<Point>) -> Self {
        self.screens = screens;
        self
    }

    /// Every point passed to `move_pointer`, in order.
    pub fn moves(&self) -> Vec<Point> {
        self.state
            .lock()
            .map(|state| state.moves.clone())
            .unwrap_or_default()
    }
}

impl PointerPlatform for FakePointer {
    fn pointer_location(&self) -> Option<Point> {
        self.state.lock().ok().and_then(|state| state.position)
    }

    fn move_pointer(&self, to: Point) {
        if let Ok(mut state) = self.state.lock() {
            state.moves.push(to);
            if state.position.is_some() {
                state.position = Some(Point::new(to.x + self.skew, to.y + self.skew));
            }
        }
    }

    fn screen_centers(&self) -> Vec<Point> {
        self.screens.clone()
    }
}
