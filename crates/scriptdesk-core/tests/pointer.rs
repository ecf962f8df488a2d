//! Pointer calibration against the fake platform.

use pretty_assertions::assert_eq;
use scriptdesk_core::{Point, PointerDevice};
use scriptdesk_test_utils::FakePointer;
use scriptdesk_test_utils::config::TestConfigBuilder;

#[test]
fn test_calibration_moves_to_center_and_back() {
    let device = PointerDevice::new(FakePointer::at(Point::new(100, 200)), 5);

    assert!(device.calibrate());
    assert!(device.is_usable());
    assert_eq!(
        device.platform().moves(),
        vec![Point::new(960, 540), Point::new(100, 200)]
    );
    assert_eq!(device.current_position(), Some(Point::new(100, 200)));
}

#[test]
fn test_calibration_uses_primary_screen() {
    let platform = FakePointer::at(Point::new(0, 0))
        .with_screens(vec![Point::new(640, 400), Point::new(2560, 720)]);
    let device = PointerDevice::new(platform, 5);

    assert!(device.calibrate());
    assert_eq!(device.platform().moves()[0], Point::new(640, 400));
}

#[test]
fn test_skew_beyond_configured_delta_is_unusable() {
    let config = TestConfigBuilder::new().position_delta(2).build();
    let device = PointerDevice::from_config(
        FakePointer::at(Point::new(0, 0)).with_skew(3),
        &config.pointer,
    );

    assert!(!device.calibrate());
    assert!(!device.is_usable());
    // The original position is only restored after a successful probe.
    assert_eq!(device.platform().moves(), vec![Point::new(960, 540)]);
}

#[test]
fn test_skew_within_delta_is_usable() {
    let device = PointerDevice::new(FakePointer::at(Point::new(0, 0)).with_skew(5), 5);
    assert!(device.calibrate());
}

#[test]
fn test_detached_pointer_is_unusable() {
    let device = PointerDevice::new(FakePointer::detached(), 5);

    assert_eq!(device.current_position(), None);
    assert!(!device.calibrate());
    assert!(device.platform().moves().is_empty());
}

#[test]
fn test_no_screens_is_unusable() {
    let device = PointerDevice::new(
        FakePointer::at(Point::new(1, 1)).with_screens(Vec::new()),
        5,
    );
    assert!(!device.calibrate());
}

#[test]
fn test_recalibration_overwrites_result() {
    let device = PointerDevice::new(FakePointer::at(Point::new(0, 0)), 5);
    assert!(device.calibrate());
    assert!(device.calibrate());
    assert!(device.is_usable());
    assert_eq!(device.platform().moves().len(), 4);
}

#[test]
fn test_move_to_reports_landing_point() {
    let device = PointerDevice::new(FakePointer::at(Point::new(0, 0)).with_skew(1), 5);
    let landed = device.move_to(Point::new(10, 10)).unwrap();
    assert_eq!(landed, Point::new(11, 11));
    assert!(device.is_nearby(Point::new(10, 10), landed));
}

#[tokio::test]
async fn test_is_moving_still_pointer() {
    let device = PointerDevice::new(FakePointer::at(Point::new(5, 5)), 5);
    assert!(!device.is_moving().await);
}
