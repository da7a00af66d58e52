//! Integration tests for device discovery, configuration and script output

use std::sync::Arc;
use touch_injector::app::config::Config;
use touch_injector::device::codes::EventCode;
use touch_injector::device::discovery::find_touchscreen;
use touch_injector::time::timebase::ManualClock;
use touch_injector::transport::{DeviceTransport, ScriptSink};
use touch_injector::{DurationBounds, GestureSpec, Injector, Point};

const LISTING: &str = r#"add device 1: /dev/input/event0
  name:     "qpnp_pon"
  events:
    KEY (0001): KEY_POWER
add device 2: /dev/input/event3
  name:     "synaptics_dsx"
  events:
    KEY (0001): BTN_TOUCH
    ABS (0003): ABS_MT_SLOT           : value 0, min 0, max 4, fuzz 0, flat 0, resolution 0
                ABS_MT_POSITION_X     : value 0, min 0, max 719, fuzz 0, flat 0, resolution 0
                ABS_MT_POSITION_Y     : value 0, min 0, max 1279, fuzz 0, flat 0, resolution 0
                ABS_MT_TRACKING_ID    : value 0, min 0, max 65535, fuzz 0, flat 0, resolution 0
                ABS_MT_PRESSURE       : value 0, min 0, max 63, fuzz 0, flat 0, resolution 0
"#;

#[test]
fn test_discovered_device_drives_script() {
    let device = find_touchscreen(LISTING).unwrap();
    assert_eq!(device.path, "/dev/input/event3");
    let caps = device.capabilities().unwrap();
    assert_eq!(caps.max_slots, 5);
    assert!(!caps.supports(EventCode::MT_TOUCH_MAJOR));

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("tap.sh");
    let sink = ScriptSink::create(&script, device.path.clone()).unwrap();
    let clock = ManualClock::new();
    let transport = DeviceTransport::new(sink, Default::default()).with_clock(Arc::new(clock.clone()));

    let mut injector = Injector::new(caps).with_clock(Arc::new(clock));
    let spec = GestureSpec::swipe(Point::new(100.0, 100.0), Point::new(600.0, 1200.0))
        .humanized(false)
        .with_duration(DurationBounds::from_millis(400, 400));
    let outcome = injector.perform(&spec, transport);
    assert!(outcome.is_done(), "{}", outcome);

    let text = std::fs::read_to_string(&script).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "#!/system/bin/sh");
    assert!(lines.contains(&"sendevent /dev/input/event3 3 57 -1"));
    assert_eq!(lines.last(), Some(&"sendevent /dev/input/event3 0 0 0"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("sleep ")).count(), 2);

    // No TOUCH_MAJOR (code 48) on a node that does not report it
    assert!(!lines.iter().any(|l| l.contains(" 3 48 ")));
}

#[test]
fn test_config_file_declares_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[device]
path = "/dev/input/event7"
x_max = 1439
y_max = 3199
max_slots = 1

[humanize]
tap_jitter_radius = 2.0
lead_in_ms = [0, 0]
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.device.path, "/dev/input/event7");
    assert!(config.lead_in().is_none());
    // untouched sections keep their defaults
    assert_eq!(config.transport.max_retries, 3);

    let caps = config.declared_capabilities().unwrap().unwrap();
    assert_eq!(caps.x.max, 1439);
    assert!(!caps.has_slots());

    let injector = Injector::new(caps).with_planner(config.planner_settings());
    let timeline = injector
        .prepare(&GestureSpec::tap(Point::new(700.0, 1600.0)).with_seed(1))
        .unwrap();
    for point in &timeline.points {
        assert!((698..=702).contains(&point.x));
        assert!((1598..=1602).contains(&point.y));
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[timing]\npoint_rate_hz = 0.0\n").unwrap();

    assert!(Config::load(&path).is_err());
}
