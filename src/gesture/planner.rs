//! Geometry Planner
//!
//! Turns a gesture request into an ordered path of device-unit points.
//!
//! Exact mode reproduces the request literally: one point for a tap, start
//! and end for a swipe. Humanized mode adds what a finger does:
//!
//! - Taps land slightly off target and settle onto it in a few
//!   micro-movements before the lift.
//! - Swipes follow a quadratic Bézier curve bowed to one side of the chord,
//!   sampled at the panel's report rate, with tremor on every intermediate
//!   point.
//!
//! Points are clamped into device bounds, never dropped.

use super::types::{DurationBounds, GestureKind, GestureSpec, Mode, Plan, PlannedPoint, Point};
use crate::device::capabilities::DeviceCapabilities;
use rand::Rng;
use std::f64::consts::TAU;
use std::time::Duration;
use tracing::{debug, warn};

/// Minimum number of points on a humanized swipe.
const MIN_SWIPE_POINTS: usize = 3;

/// Upper bound on planned points, whatever the rate and duration.
const MAX_PLANNED_POINTS: usize = 4096;

/// Humanization policy for the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    /// Radius of the tap landing disc (device units)
    pub tap_jitter_radius: f64,
    /// Upper bound on settle micro-movements between landing and lift
    pub settle_max_moves: u32,
    /// Radius around the target for the last settle point
    pub settle_final_radius: f64,
    /// Maximum perpendicular displacement of the swipe control point
    pub swipe_curve_radius: f64,
    /// Per-axis tremor bound on intermediate swipe points
    pub tremor_amplitude: f64,
    /// Per-axis displacement bound on swipe endpoints
    pub endpoint_jitter: f64,
    /// Base pressure as a fraction of the device maximum
    pub pressure_range: (f64, f64),
    /// Base contact size as a fraction of the device maximum
    pub contact_size_range: (f64, f64),
    /// Path sampling rate (points per second)
    pub point_rate_hz: f64,
    /// Nominal swipe speed (device units per millisecond)
    pub swipe_speed: f64,
    /// Relative variation of the swipe duration
    pub timing_jitter: f64,
    /// Default bounds for taps
    pub tap_duration: DurationBounds,
    /// Default bounds for swipes
    pub swipe_duration: DurationBounds,
    /// How far outside the axis bounds a request may lie and still be clamped
    pub clamp_tolerance: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            tap_jitter_radius: 3.0,
            settle_max_moves: 2,
            settle_final_radius: 0.5,
            swipe_curve_radius: 40.0,
            tremor_amplitude: 1.5,
            endpoint_jitter: 2.0,
            pressure_range: (0.7, 1.0),
            contact_size_range: (0.3, 0.6),
            point_rate_hz: 120.0,
            swipe_speed: 1.5,
            timing_jitter: 0.15,
            tap_duration: DurationBounds::from_millis(80, 180),
            swipe_duration: DurationBounds::from_millis(300, 1200),
            clamp_tolerance: 8.0,
        }
    }
}

/// Geometry planner
pub struct GeometryPlanner {
    pub settings: PlannerSettings,
}

impl GeometryPlanner {
    /// Create with default settings
    pub fn new() -> Self {
        Self::with_settings(PlannerSettings::default())
    }

    pub fn with_settings(settings: PlannerSettings) -> Self {
        Self { settings }
    }

    /// Plan the path for one gesture.
    ///
    /// `rng` is only drawn from in humanized mode.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        spec: &GestureSpec,
        caps: &DeviceCapabilities,
        rng: &mut R,
    ) -> crate::Result<Plan> {
        let kind = spec.kind.normalized();
        self.check_endpoint(kind.start(), caps)?;
        self.check_endpoint(kind.end(), caps)?;

        let bounds = spec.duration.unwrap_or(match kind {
            GestureKind::Tap { .. } => self.settings.tap_duration,
            GestureKind::Swipe { .. } => self.settings.swipe_duration,
        });

        let plan = match (kind, spec.mode) {
            (GestureKind::Tap { at }, Mode::Exact) => Plan {
                points: vec![self.exact_point(at, 0, caps)],
                target: bounds.midpoint(),
                bounds,
                mode: Mode::Exact,
            },
            (GestureKind::Swipe { from, to }, Mode::Exact) => Plan {
                points: vec![self.exact_point(from, 0, caps), self.exact_point(to, 1, caps)],
                target: self.swipe_duration(from, to, bounds, 1.0),
                bounds,
                mode: Mode::Exact,
            },
            (GestureKind::Tap { at }, Mode::Humanized) => self.plan_settle(at, bounds, caps, rng),
            (GestureKind::Swipe { from, to }, Mode::Humanized) => {
                self.plan_curve(from, to, bounds, caps, rng)
            }
        };

        debug!(
            "Planned {} point(s), target {:?} within [{:?}, {:?}]",
            plan.points.len(),
            plan.target,
            plan.bounds.min,
            plan.bounds.max
        );
        Ok(plan)
    }

    /// Reject non-finite points and points too far outside the device.
    fn check_endpoint(&self, point: Point, caps: &DeviceCapabilities) -> crate::Result<()> {
        if !point.is_finite() {
            return Err(crate::Error::InvalidCoordinate(format!(
                "({}, {}) is not a finite coordinate",
                point.x, point.y
            )));
        }
        let overshoot = caps.overshoot(point);
        if overshoot > self.settings.clamp_tolerance {
            return Err(crate::Error::InvalidCoordinate(format!(
                "({}, {}) lies {:.1} units outside x=[{}, {}] y=[{}, {}]",
                point.x, point.y, overshoot, caps.x.min, caps.x.max, caps.y.min, caps.y.max
            )));
        }
        if overshoot > 0.0 {
            warn!("({}, {}) is outside device bounds, clamping", point.x, point.y);
        }
        Ok(())
    }

    fn exact_point(&self, at: Point, index: usize, caps: &DeviceCapabilities) -> PlannedPoint {
        let (x, y) = caps.clamp(at);
        PlannedPoint {
            x,
            y,
            pressure: caps.pressure_max.max(1),
            touch_major: (caps.touch_major_max / 2).max(1),
            index,
        }
    }

    /// Duration from chord length and nominal speed, scaled and clamped.
    fn swipe_duration(&self, from: Point, to: Point, bounds: DurationBounds, factor: f64) -> Duration {
        let millis = from.distance_to(&to) / self.settings.swipe_speed.max(f64::EPSILON) * factor;
        bounds.clamp(Duration::from_secs_f64((millis / 1_000.0).clamp(0.0, 3_600.0)))
    }

    /// Base pressure and contact size for a humanized contact.
    fn contact<R: Rng + ?Sized>(&self, caps: &DeviceCapabilities, rng: &mut R) -> (i32, i32) {
        let pressure = uniform(rng, self.settings.pressure_range) * caps.pressure_max as f64;
        let major = uniform(rng, self.settings.contact_size_range) * caps.touch_major_max as f64;
        (
            (pressure.round() as i32).clamp(1, caps.pressure_max.max(1)),
            (major.round() as i32).clamp(1, caps.touch_major_max.max(1)),
        )
    }

    /// Tap: landing point, converging micro-movements, final rest point.
    fn plan_settle<R: Rng + ?Sized>(
        &self,
        at: Point,
        bounds: DurationBounds,
        caps: &DeviceCapabilities,
        rng: &mut R,
    ) -> Plan {
        let radius = self.settings.tap_jitter_radius.max(0.0);
        let (pressure, touch_major) = self.contact(caps, rng);
        let target = uniform_duration(rng, bounds);

        let landing = disc_sample(rng, at, radius);
        let moves = rng.gen_range(0..=self.settings.settle_max_moves) as usize;

        let mut path = Vec::with_capacity(moves + 2);
        path.push(landing);
        for i in 1..=moves {
            let frac = i as f64 / (moves + 1) as f64;
            let noise = radius * 0.25;
            let candidate = Point::new(
                at.x + (landing.x - at.x) * (1.0 - frac) + symmetric(rng, noise),
                at.y + (landing.y - at.y) * (1.0 - frac) + symmetric(rng, noise),
            );
            path.push(constrain_to_disc(candidate, at, radius));
        }
        path.push(disc_sample(rng, at, self.settings.settle_final_radius.min(radius)));

        Plan {
            points: self.to_planned(&path, pressure, touch_major, caps),
            target,
            bounds,
            mode: Mode::Humanized,
        }
    }

    /// Swipe: tremored quadratic Bézier from a jittered start to a jittered end.
    fn plan_curve<R: Rng + ?Sized>(
        &self,
        from: Point,
        to: Point,
        bounds: DurationBounds,
        caps: &DeviceCapabilities,
        rng: &mut R,
    ) -> Plan {
        let s = &self.settings;
        let (pressure, touch_major) = self.contact(caps, rng);

        let jitter = s.timing_jitter.clamp(0.0, 0.9);
        let factor = rng.gen_range((1.0 - jitter)..=(1.0 + jitter));
        let target = self.swipe_duration(from, to, bounds, factor);

        let start = Point::new(
            from.x + symmetric(rng, s.endpoint_jitter),
            from.y + symmetric(rng, s.endpoint_jitter),
        );
        let end = Point::new(
            to.x + symmetric(rng, s.endpoint_jitter),
            to.y + symmetric(rng, s.endpoint_jitter),
        );

        let (dx, dy) = (end.x - start.x, end.y - start.y);
        let len = (dx * dx + dy * dy).sqrt();
        let (nx, ny) = if len > 1e-9 { (-dy / len, dx / len) } else { (0.0, 0.0) };
        let bow = symmetric(rng, s.swipe_curve_radius);
        let control = Point::new(
            (start.x + end.x) / 2.0 + nx * bow,
            (start.y + end.y) / 2.0 + ny * bow,
        );

        let count = ((target.as_secs_f64() * s.point_rate_hz).ceil() as usize + 1)
            .clamp(MIN_SWIPE_POINTS, MAX_PLANNED_POINTS);

        let mut path = Vec::with_capacity(count);
        for i in 0..count {
            let t = i as f64 / (count - 1) as f64;
            let mut p = quadratic_bezier(start, control, end, t);
            if i > 0 && i < count - 1 {
                p.x += symmetric(rng, s.tremor_amplitude);
                p.y += symmetric(rng, s.tremor_amplitude);
            }
            path.push(p);
        }

        Plan {
            points: self.to_planned(&path, pressure, touch_major, caps),
            target,
            bounds,
            mode: Mode::Humanized,
        }
    }

    fn to_planned(
        &self,
        path: &[Point],
        pressure: i32,
        touch_major: i32,
        caps: &DeviceCapabilities,
    ) -> Vec<PlannedPoint> {
        path.iter()
            .enumerate()
            .map(|(index, p)| {
                let (x, y) = caps.clamp(*p);
                PlannedPoint {
                    x,
                    y,
                    pressure,
                    touch_major,
                    index,
                }
            })
            .collect()
    }
}

impl Default for GeometryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn quadratic_bezier(p0: Point, p1: Point, p2: Point, t: f64) -> Point {
    let u = 1.0 - t;
    Point::new(
        u * u * p0.x + 2.0 * u * t * p1.x + t * t * p2.x,
        u * u * p0.y + 2.0 * u * t * p1.y + t * t * p2.y,
    )
}

/// Uniform in `[-bound, bound]`; zero when the bound is not positive.
fn symmetric<R: Rng + ?Sized>(rng: &mut R, bound: f64) -> f64 {
    if bound > 0.0 {
        rng.gen_range(-bound..=bound)
    } else {
        0.0
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, range: (f64, f64)) -> f64 {
    let (lo, hi) = if range.0 <= range.1 { range } else { (range.1, range.0) };
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

pub(crate) fn uniform_duration<R: Rng + ?Sized>(rng: &mut R, bounds: DurationBounds) -> Duration {
    let (lo, hi) = (bounds.min.as_micros() as u64, bounds.max.as_micros() as u64);
    Duration::from_micros(rng.gen_range(lo..=hi))
}

/// Uniform sample from the disc of `radius` around `center`.
fn disc_sample<R: Rng + ?Sized>(rng: &mut R, center: Point, radius: f64) -> Point {
    if radius <= 0.0 {
        return center;
    }
    let angle = rng.gen_range(0.0..TAU);
    let r = radius * rng.gen::<f64>().sqrt();
    Point::new(center.x + r * angle.cos(), center.y + r * angle.sin())
}

/// Pull `p` back onto the disc of `radius` around `center` if outside it.
fn constrain_to_disc(p: Point, center: Point, radius: f64) -> Point {
    let d = p.distance_to(&center);
    if d <= radius || d < f64::EPSILON {
        return p;
    }
    let scale = radius / d;
    Point::new(
        center.x + (p.x - center.x) * scale,
        center.y + (p.y - center.y) * scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities::touchscreen(1080, 2400)
    }

    #[test]
    fn test_exact_tap_is_single_point() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::tap(Point::new(500.0, 800.0)).humanized(false);
        let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(plan.points.len(), 1);
        assert_eq!((plan.points[0].x, plan.points[0].y), (500, 800));
        assert_eq!(plan.points[0].pressure, 255);
        assert_eq!(plan.points[0].touch_major, 127);
        assert_eq!(plan.target, Duration::from_millis(130));
    }

    #[test]
    fn test_exact_swipe_is_two_points() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::swipe(Point::new(100.0, 100.0), Point::new(100.0, 900.0))
            .humanized(false);
        let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(plan.points.len(), 2);
        assert_eq!((plan.points[0].x, plan.points[0].y), (100, 100));
        assert_eq!((plan.points[1].x, plan.points[1].y), (100, 900));
        // 800 units at 1.5 units/ms
        assert_eq!(plan.target.as_millis(), 533);
    }

    #[test]
    fn test_exact_plan_ignores_seed() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::swipe(Point::new(10.0, 10.0), Point::new(600.0, 1200.0))
            .humanized(false);
        let a = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(1)).unwrap();
        let b = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_humanized_tap_stays_in_landing_disc() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::tap(Point::new(500.0, 800.0));
        for seed in 0..200 {
            let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(seed)).unwrap();
            assert!(plan.points.len() >= 2);
            assert!(plan.points.len() <= 4);
            for p in &plan.points {
                assert!((497..=503).contains(&p.x), "seed {} x={}", seed, p.x);
                assert!((797..=803).contains(&p.y), "seed {} y={}", seed, p.y);
            }
            let last = plan.points.last().unwrap();
            assert!((last.x - 500).abs() <= 1 && (last.y - 800).abs() <= 1);
        }
    }

    #[test]
    fn test_humanized_tap_target_within_bounds() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::tap(Point::new(500.0, 800.0));
        let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(plan.bounds.contains(plan.target));
    }

    #[test]
    fn test_humanized_swipe_point_count_follows_duration() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::swipe(Point::new(100.0, 300.0), Point::new(900.0, 2000.0));
        let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(11)).unwrap();

        let expected = (plan.target.as_secs_f64() * 120.0).ceil() as usize + 1;
        assert_eq!(plan.points.len(), expected);
        assert!(plan.points.len() >= MIN_SWIPE_POINTS);
    }

    #[test]
    fn test_humanized_swipe_endpoints_near_request() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::swipe(Point::new(100.0, 300.0), Point::new(900.0, 2000.0));
        for seed in 0..50 {
            let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(seed)).unwrap();
            let first = plan.points.first().unwrap();
            let last = plan.points.last().unwrap();
            assert!((first.x - 100).abs() <= 2 && (first.y - 300).abs() <= 2);
            assert!((last.x - 900).abs() <= 2 && (last.y - 2000).abs() <= 2);
        }
    }

    #[test]
    fn test_humanized_swipe_is_curved() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::swipe(Point::new(100.0, 100.0), Point::new(100.0, 2000.0));
        let curved = (0..20).any(|seed| {
            let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(seed)).unwrap();
            plan.points.iter().any(|p| (p.x - 100).abs() > 5)
        });
        assert!(curved, "no seed produced a visible bow");
    }

    #[test]
    fn test_points_near_edge_are_clamped_not_dropped() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::swipe(Point::new(0.0, 0.0), Point::new(1080.0, 0.0));
        let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(5)).unwrap();
        let expected = (plan.target.as_secs_f64() * 120.0).ceil() as usize + 1;
        assert_eq!(plan.points.len(), expected);
        for p in &plan.points {
            assert!(caps().x.contains(p.x));
            assert!(caps().y.contains(p.y));
        }
    }

    #[test]
    fn test_out_of_bounds_request_rejected() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::tap(Point::new(1200.0, 800.0));
        let err = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidCoordinate(_)));
    }

    #[test]
    fn test_slightly_out_of_bounds_request_clamped() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::tap(Point::new(1085.0, -4.0)).humanized(false);
        let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!((plan.points[0].x, plan.points[0].y), (1080, 0));
    }

    #[test]
    fn test_non_finite_request_rejected() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::swipe(Point::new(10.0, 10.0), Point::new(f64::INFINITY, 10.0));
        let err = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidCoordinate(_)));
    }

    #[test]
    fn test_humanized_pressure_in_configured_range() {
        let planner = GeometryPlanner::new();
        let spec = GestureSpec::tap(Point::new(500.0, 800.0));
        for seed in 0..50 {
            let plan = planner.plan(&spec, &caps(), &mut StdRng::seed_from_u64(seed)).unwrap();
            let p = plan.points[0];
            assert!((178..=255).contains(&p.pressure), "pressure {}", p.pressure);
            assert!((76..=153).contains(&p.touch_major), "major {}", p.touch_major);
        }
    }

    #[test]
    fn test_constrain_to_disc() {
        let c = Point::new(0.0, 0.0);
        let p = constrain_to_disc(Point::new(6.0, 8.0), c, 5.0);
        assert!((p.distance_to(&c) - 5.0).abs() < 1e-9);
        let inside = Point::new(1.0, 1.0);
        assert_eq!(constrain_to_disc(inside, c, 5.0), inside);
    }
}
