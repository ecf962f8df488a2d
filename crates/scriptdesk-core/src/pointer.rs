//! Mouse pointer probing and calibration.
//!
//! [`PointerDevice`] wraps a platform pointer API ([`PointerPlatform`]) with
//! the few operations automation scripts need: read the current position,
//! move to a point, and compare positions within a tolerance. Before
//! declaring pointer control usable, [`calibrate`](PointerDevice::calibrate)
//! moves the pointer to a known screen centre and checks the platform really
//! put it there.
//!
//! A missing pointer (headless or disconnected session) is reported as
//! `None`, never as an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use scriptdesk_config::PointerConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A screen coordinate in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Whether `a` and `b` differ by at most `delta` on each axis (inclusive).
pub fn is_nearby(a: Point, b: Point, delta: i32) -> bool {
    let delta = i64::from(delta);
    (i64::from(a.x) - i64::from(b.x)).abs() <= delta
        && (i64::from(a.y) - i64::from(b.y)).abs() <= delta
}

/// Platform pointer API.
pub trait PointerPlatform: Send + Sync {
    /// Current pointer location, or `None` if the platform has no pointer.
    fn pointer_location(&self) -> Option<Point>;

    /// Ask the platform to move the pointer.
    fn move_pointer(&self, to: Point);

    /// Block until queued input events have been processed.
    fn wait_for_idle(&self) {}

    /// Centre point of every attached screen, primary first.
    fn screen_centers(&self) -> Vec<Point>;
}

/// Platform with no pointer and no screens.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPointer;

impl PointerPlatform for HeadlessPointer {
    fn pointer_location(&self) -> Option<Point> {
        None
    }

    fn move_pointer(&self, _to: Point) {}

    fn screen_centers(&self) -> Vec<Point> {
        Vec::new()
    }
}

/// Interval between the two samples taken by [`PointerDevice::is_moving`].
pub const MOVING_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Pointer control on top of a [`PointerPlatform`].
pub struct PointerDevice<P> {
    platform: P,
    delta: i32,
    usable: AtomicBool,
}

impl<P: PointerPlatform> PointerDevice<P> {
    /// Create a device comparing positions with tolerance `delta`.
    pub fn new(platform: P, delta: i32) -> Self {
        Self {
            platform,
            delta,
            usable: AtomicBool::new(false),
        }
    }

    /// Create a device using the `[pointer]` config section.
    pub fn from_config(platform: P, config: &PointerConfig) -> Self {
        Self::new(platform, config.position_delta)
    }

    /// The wrapped platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Configured position tolerance.
    pub fn delta(&self) -> i32 {
        self.delta
    }

    /// Current pointer position, `None` when no pointer is available.
    pub fn current_position(&self) -> Option<Point> {
        let position = self.platform.pointer_location();
        if position.is_none() {
            debug!("Pointer position unavailable");
        }
        position
    }

    /// Move the pointer and return where the platform reports it ended up.
    pub fn move_to(&self, to: Point) -> Option<Point> {
        self.platform.move_pointer(to);
        self.platform.wait_for_idle();
        self.current_position()
    }

    /// [`is_nearby`] with the configured tolerance.
    pub fn is_nearby(&self, target: Point, actual: Point) -> bool {
        is_nearby(target, actual, self.delta)
    }

    /// Whether the pointer moved between two samples taken
    /// [`MOVING_SAMPLE_INTERVAL`] apart. `false` when no pointer is available.
    pub async fn is_moving(&self) -> bool {
        let Some(before) = self.current_position() else {
            return false;
        };
        tokio::time::sleep(MOVING_SAMPLE_INTERVAL).await;
        match self.current_position() {
            Some(after) => before != after,
            None => false,
        }
    }

    /// Check that the platform actually moves the pointer where asked.
    ///
    /// Moves to the centre of the primary screen, reads the position back,
    /// and on success restores the original position. The outcome is
    /// stored and returned.
    pub fn calibrate(&self) -> bool {
        let usable = self.probe_control();
        self.usable.store(usable, Ordering::Release);
        usable
    }

    fn probe_control(&self) -> bool {
        let Some(original) = self.current_position() else {
            warn!("Pointer calibration skipped: no pointer available");
            return false;
        };
        let Some(center) = self.platform.screen_centers().first().copied() else {
            warn!("Pointer calibration skipped: no screen reported");
            return false;
        };

        let landed = self.move_to(center);
        match landed {
            Some(actual) if self.is_nearby(center, actual) => {
                self.move_to(original);
                info!(x = center.x, y = center.y, "Pointer control usable");
                true
            }
            Some(actual) => {
                warn!(
                    expected = ?center,
                    actual = ?actual,
                    delta = self.delta,
                    "Pointer did not reach calibration target"
                );
                false
            }
            None => {
                warn!("Pointer lost during calibration");
                false
            }
        }
    }

    /// Result of the last [`calibrate`](Self::calibrate) (false before any).
    pub fn is_usable(&self) -> bool {
        self.usable.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Pointer that lands `offset` pixels away from every requested point.
    struct Skewed {
        position: Mutex<Option<Point>>,
        offset: i32,
        screens: Vec<Point>,
    }

    impl Skewed {
        fn at(start: Point, offset: i32) -> Self {
            Self {
                position: Mutex::new(Some(start)),
                offset,
                screens: vec![Point::new(960, 540)],
            }
        }
    }

    impl PointerPlatform for Skewed {
        fn pointer_location(&self) -> Option<Point> {
            *self.position.lock().unwrap()
        }

        fn move_pointer(&self, to: Point) {
            *self.position.lock().unwrap() = Some(Point::new(to.x + self.offset, to.y));
        }

        fn screen_centers(&self) -> Vec<Point> {
            self.screens.clone()
        }
    }

    #[test]
    fn test_is_nearby_within_delta() {
        assert!(is_nearby(Point::new(0, 0), Point::new(3, 3), 5));
    }

    #[test]
    fn test_is_nearby_outside_delta() {
        assert!(!is_nearby(Point::new(0, 0), Point::new(6, 0), 5));
        assert!(!is_nearby(Point::new(0, 0), Point::new(0, -6), 5));
    }

    #[test]
    fn test_is_nearby_boundary_inclusive() {
        assert!(is_nearby(Point::new(0, 0), Point::new(5, 0), 5));
        assert!(is_nearby(Point::new(0, 0), Point::new(-5, -5), 5));
    }

    #[test]
    fn test_is_nearby_extreme_coordinates() {
        assert!(!is_nearby(Point::new(i32::MIN, 0), Point::new(i32::MAX, 0), 5));
    }

    #[test]
    fn test_point_from_tuple() {
        assert_eq!(Point::from((4, 7)), Point::new(4, 7));
    }

    #[test]
    fn test_headless_position_unavailable() {
        let device = PointerDevice::new(HeadlessPointer, 5);
        assert_eq!(device.current_position(), None);
        assert_eq!(device.move_to(Point::new(1, 1)), None);
    }

    #[test]
    fn test_calibration_succeeds_and_restores() {
        let device = PointerDevice::new(Skewed::at(Point::new(10, 20), 0), 5);
        assert!(!device.is_usable());
        assert!(device.calibrate());
        assert!(device.is_usable());
        assert_eq!(device.current_position(), Some(Point::new(10, 20)));
    }

    #[test]
    fn test_calibration_tolerates_small_skew() {
        let device = PointerDevice::new(Skewed::at(Point::new(0, 0), 5), 5);
        assert!(device.calibrate());
    }

    #[test]
    fn test_calibration_fails_on_large_skew() {
        let device = PointerDevice::new(Skewed::at(Point::new(0, 0), 40), 5);
        assert!(!device.calibrate());
        assert!(!device.is_usable());
    }

    #[test]
    fn test_calibration_headless_unusable() {
        let device = PointerDevice::from_config(HeadlessPointer, &PointerConfig::default());
        assert_eq!(device.delta(), 5);
        assert!(!device.calibrate());
    }

    #[test]
    fn test_calibration_without_screens() {
        let mut platform = Skewed::at(Point::new(0, 0), 0);
        platform.screens.clear();
        let device = PointerDevice::new(platform, 5);
        assert!(!device.calibrate());
    }

    #[tokio::test]
    async fn test_is_moving_on_still_pointer() {
        let device = PointerDevice::new(Skewed::at(Point::new(3, 3), 0), 5);
        assert!(!device.is_moving().await);
        let headless = PointerDevice::new(HeadlessPointer, 5);
        assert!(!headless.is_moving().await);
    }
}
