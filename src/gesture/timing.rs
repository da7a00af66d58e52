//! Timing Model
//!
//! Assigns each planned point an emission time and its final pressure and
//! contact size.
//!
//! A plan with `n` points has `n` gaps: `n - 1` between points plus the
//! hold before lift. All of them follow an ease-in/ease-out profile
//! (longer near the ends of the path, shorter in the middle) and together
//! span the planned duration. If the total falls outside the duration
//! bounds, or a gap is shorter than the device can register, the gaps are
//! redistributed proportionally above the minimum interval. Points are
//! never dropped.

use super::types::{Mode, Plan, Timeline, TimedPoint};
use crate::device::capabilities::DeviceCapabilities;
use crate::time::timebase::Timestamp;
use rand::Rng;
use std::f64::consts::PI;
use std::time::Duration;
use tracing::{debug, warn};

/// Timing policy.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSettings {
    /// Shortest gap the panel can report
    pub min_frame_interval: Duration,
    /// Nominal report rate (points per second)
    pub point_rate_hz: f64,
    /// Extra weight given to gaps at the ends of the path
    pub easing_strength: f64,
    /// Relative per-gap variation in humanized mode
    pub timing_jitter: f64,
    /// Random-walk step for pressure and contact size (fraction of max)
    pub pressure_walk: f64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            min_frame_interval: Duration::from_micros(5_000),
            point_rate_hz: 120.0,
            easing_strength: 1.5,
            timing_jitter: 0.15,
            pressure_walk: 0.02,
        }
    }
}

/// Timing model
pub struct TimingModel {
    pub settings: TimingSettings,
}

impl TimingModel {
    /// Create with default settings
    pub fn new() -> Self {
        Self::with_settings(TimingSettings::default())
    }

    pub fn with_settings(settings: TimingSettings) -> Self {
        Self { settings }
    }

    /// Time a plan. `rng` is only drawn from in humanized mode.
    pub fn assign<R: Rng + ?Sized>(
        &self,
        plan: &Plan,
        caps: &DeviceCapabilities,
        rng: &mut R,
    ) -> Timeline {
        let n = plan.points.len();
        if n == 0 {
            return Timeline {
                points: Vec::new(),
                lift_at: Timestamp::ZERO,
            };
        }

        let naive = self.naive_gaps(plan, rng);
        let gaps = self.fit_gaps(&naive, plan);

        let mut points = Vec::with_capacity(n);
        let mut at = 0u64;
        let mut walk = PressureWalk::new(self.settings.pressure_walk, caps);
        for (i, planned) in plan.points.iter().enumerate() {
            let (pressure, touch_major) = match plan.mode {
                Mode::Exact => (planned.pressure, planned.touch_major),
                Mode::Humanized => walk.step(planned.pressure, planned.touch_major, rng),
            };
            points.push(TimedPoint::new(planned, Timestamp::from_micros(at), pressure, touch_major));
            at += gaps[i];
        }

        let timeline = Timeline {
            points,
            lift_at: Timestamp::from_micros(at),
        };
        debug!(
            "Timed {} point(s), lift at {}ms",
            n,
            timeline.lift_at.as_millis()
        );
        timeline
    }

    /// Per-gap delays before bounds and hardware limits are applied (µs).
    ///
    /// Every gap, the hold included, gets the eased weight
    /// `1 + e·(1 − sin(π·(i+½)/n))`; the weights are then scaled so the
    /// gaps add up to the planned target.
    fn naive_gaps<R: Rng + ?Sized>(&self, plan: &Plan, rng: &mut R) -> Vec<f64> {
        let n = plan.points.len();
        let target = plan.target.as_micros() as f64;
        if n == 1 {
            return vec![target];
        }

        let easing = self.settings.easing_strength.max(0.0);
        let jitter = self.settings.timing_jitter.clamp(0.0, 0.9);
        let weights: Vec<f64> = (0..n)
            .map(|i| {
                let u = (i as f64 + 0.5) / n as f64;
                let noise = match plan.mode {
                    Mode::Humanized if jitter > 0.0 => rng.gen_range((1.0 - jitter)..=(1.0 + jitter)),
                    _ => 1.0,
                };
                (1.0 + easing * (1.0 - (PI * u).sin())) * noise
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total <= 0.0 || target <= 0.0 {
            let base = 1_000_000.0 / self.settings.point_rate_hz.max(1.0);
            return vec![base; n];
        }
        weights.iter().map(|w| target * w / total).collect()
    }

    /// Fit naive gaps to the duration bounds and minimum interval, in whole µs.
    fn fit_gaps(&self, naive: &[f64], plan: &Plan) -> Vec<u64> {
        let n = naive.len() as u64;
        let min_gap = (self.settings.min_frame_interval.as_micros() as u64).max(1);
        let lo = plan.bounds.min.as_micros() as u64;
        let hi = plan.bounds.max.as_micros() as u64;
        let naive_sum: f64 = naive.iter().sum();

        let floor_total = n * min_gap;
        if floor_total > hi {
            warn!(
                "{} gaps of {}us exceed the {}us maximum duration; using the hardware floor",
                n, min_gap, hi
            );
            return vec![min_gap; naive.len()];
        }

        let within = naive_sum >= lo as f64
            && naive_sum <= hi as f64
            && naive.iter().all(|g| *g >= min_gap as f64);

        let (real, total) = if within {
            (naive.to_vec(), naive_sum.round() as u64)
        } else {
            let total = (naive_sum.round() as u64).clamp(lo.max(floor_total), hi);
            let spare = (total - floor_total) as f64;
            let real = naive
                .iter()
                .map(|g| min_gap as f64 + spare * g / naive_sum.max(f64::EPSILON))
                .collect();
            debug!("Rescaled {} gaps from {:.0}us to {}us", n, naive_sum, total);
            (real, total)
        };

        let mut gaps: Vec<u64> = real.iter().map(|g| (g.floor() as u64).max(min_gap)).collect();
        let assigned: u64 = gaps.iter().sum();
        if let Some(last) = gaps.last_mut() {
            if total > assigned {
                *last += total - assigned;
            }
        }
        gaps
    }
}

impl Default for TimingModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded random walk around the planned contact values.
struct PressureWalk {
    step_pressure: f64,
    step_major: f64,
    drift_pressure: f64,
    drift_major: f64,
    pressure_max: i32,
    major_max: i32,
}

impl PressureWalk {
    /// Drift never exceeds this many steps from the base value.
    const MAX_STEPS: f64 = 4.0;

    fn new(walk: f64, caps: &DeviceCapabilities) -> Self {
        let walk = walk.max(0.0);
        Self {
            step_pressure: walk * caps.pressure_max as f64,
            step_major: walk * caps.touch_major_max as f64,
            drift_pressure: 0.0,
            drift_major: 0.0,
            pressure_max: caps.pressure_max.max(1),
            major_max: caps.touch_major_max.max(1),
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, pressure: i32, major: i32, rng: &mut R) -> (i32, i32) {
        self.drift_pressure = walk_once(rng, self.drift_pressure, self.step_pressure);
        self.drift_major = walk_once(rng, self.drift_major, self.step_major);
        (
            ((pressure as f64 + self.drift_pressure).round() as i32).clamp(1, self.pressure_max),
            ((major as f64 + self.drift_major).round() as i32).clamp(1, self.major_max),
        )
    }
}

fn walk_once<R: Rng + ?Sized>(rng: &mut R, drift: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return drift;
    }
    let limit = step * PressureWalk::MAX_STEPS;
    (drift + rng.gen_range(-step..=step)).clamp(-limit, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::planner::GeometryPlanner;
    use crate::gesture::types::{DurationBounds, GestureSpec, PlannedPoint, Point};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities::touchscreen(1080, 2400)
    }

    fn planned(n: usize) -> Vec<PlannedPoint> {
        (0..n)
            .map(|i| PlannedPoint {
                x: 100,
                y: 100 + i as i32 * 10,
                pressure: 200,
                touch_major: 100,
                index: i,
            })
            .collect()
    }

    fn gaps(timeline: &Timeline) -> Vec<u64> {
        let mut stamps: Vec<u64> = timeline.points.iter().map(|p| p.at.as_micros()).collect();
        stamps.push(timeline.lift_at.as_micros());
        stamps.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_single_point_holds_for_target() {
        let plan = Plan {
            points: planned(1),
            target: Duration::from_millis(130),
            bounds: DurationBounds::from_millis(80, 180),
            mode: Mode::Exact,
        };
        let timeline = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(0));
        assert_eq!(timeline.points.len(), 1);
        assert_eq!(timeline.points[0].at, Timestamp::ZERO);
        assert_eq!(timeline.duration(), Duration::from_millis(130));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let plan = Plan {
            points: planned(40),
            target: Duration::from_millis(400),
            bounds: DurationBounds::from_millis(300, 1200),
            mode: Mode::Humanized,
        };
        let timeline = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(9));
        for g in gaps(&timeline) {
            assert!(g >= 5_000, "gap {}us below minimum interval", g);
        }
    }

    #[test]
    fn test_total_duration_within_bounds() {
        let bounds = DurationBounds::from_millis(300, 1200);
        for n in [2usize, 3, 10, 60, 150] {
            let plan = Plan {
                points: planned(n),
                target: Duration::from_millis(500),
                bounds,
                mode: Mode::Humanized,
            };
            let timeline =
                TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(n as u64));
            assert!(bounds.contains(timeline.duration()), "n={} {:?}", n, timeline.duration());
            assert_eq!(timeline.points.len(), n);
        }
    }

    #[test]
    fn test_rescale_preserves_point_count_when_too_long() {
        // 200 gaps at the 5ms floor need the whole 1s maximum.
        let plan = Plan {
            points: planned(200),
            target: Duration::from_millis(500),
            bounds: DurationBounds::from_millis(300, 1000),
            mode: Mode::Exact,
        };
        let timeline = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(0));
        assert_eq!(timeline.points.len(), 200);
        assert_eq!(timeline.duration(), Duration::from_millis(1000));
        assert!(gaps(&timeline).iter().all(|g| *g >= 5_000));
    }

    #[test]
    fn test_hardware_floor_wins_over_impossible_bounds() {
        let plan = Plan {
            points: planned(10),
            target: Duration::from_millis(20),
            bounds: DurationBounds::from_millis(10, 20),
            mode: Mode::Exact,
        };
        let timeline = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(0));
        assert!(gaps(&timeline).iter().all(|g| *g == 5_000));
    }

    #[test]
    fn test_ease_in_ease_out_profile() {
        let plan = Plan {
            points: planned(61),
            target: Duration::from_millis(500),
            bounds: DurationBounds::from_millis(300, 1200),
            mode: Mode::Exact,
        };
        let timeline = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(0));
        let g = gaps(&timeline);
        let middle = g[30];
        assert!(g[0] > middle, "first gap {} should exceed middle {}", g[0], middle);
        assert!(g[59] > middle, "last movement gap {} should exceed middle {}", g[59], middle);
    }

    #[test]
    fn test_exact_mode_is_deterministic_and_constant_pressure() {
        let plan = Plan {
            points: planned(2),
            target: Duration::from_millis(533),
            bounds: DurationBounds::from_millis(300, 1200),
            mode: Mode::Exact,
        };
        let a = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(1));
        let b = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(2));
        assert_eq!(a, b);
        assert!(a.points.iter().all(|p| p.pressure == 200 && p.touch_major == 100));
        assert_eq!(a.duration(), Duration::from_millis(533));
    }

    #[test]
    fn test_exact_swipe_spreads_motion_over_duration() {
        let caps = caps();
        let mut rng = StdRng::seed_from_u64(0);
        let spec = GestureSpec::swipe(Point::new(100.0, 100.0), Point::new(100.0, 900.0))
            .humanized(false);
        let plan = GeometryPlanner::new().plan(&spec, &caps, &mut rng).unwrap();
        let timeline = TimingModel::new().assign(&plan, &caps, &mut rng);

        assert_eq!(timeline.points.len(), 2);
        let reached = timeline.points[1].at.as_duration();
        assert!(
            reached >= plan.bounds.min / 2,
            "end reached after {:?}, hold {:?}",
            reached,
            timeline.duration() - reached
        );
        // two equally weighted gaps
        let g = gaps(&timeline);
        assert!(g[0].abs_diff(g[1]) <= 1, "{:?}", g);
        assert_eq!(timeline.lift_at.as_micros(), plan.target.as_micros() as u64);
    }

    #[test]
    fn test_humanized_pressure_wanders_within_limits() {
        let plan = Plan {
            points: planned(80),
            target: Duration::from_millis(700),
            bounds: DurationBounds::from_millis(300, 1200),
            mode: Mode::Humanized,
        };
        let timeline = TimingModel::new().assign(&plan, &caps(), &mut StdRng::seed_from_u64(4));
        let distinct: std::collections::BTreeSet<i32> =
            timeline.points.iter().map(|p| p.pressure).collect();
        assert!(distinct.len() > 1, "pressure never varied");
        // 4 steps of 2% of 255
        for p in &timeline.points {
            assert!((p.pressure - 200).abs() <= 21, "pressure {} drifted too far", p.pressure);
            assert!((1..=255).contains(&p.pressure));
        }
    }

    #[test]
    fn test_planned_swipe_timeline_matches_target() {
        let caps = caps();
        let mut rng = StdRng::seed_from_u64(21);
        let spec = GestureSpec::swipe(Point::new(100.0, 300.0), Point::new(900.0, 2000.0));
        let plan = GeometryPlanner::new().plan(&spec, &caps, &mut rng).unwrap();
        let timeline = TimingModel::new().assign(&plan, &caps, &mut rng);

        assert_eq!(timeline.points.len(), plan.points.len());
        assert!(plan.bounds.contains(timeline.duration()));
    }
}
