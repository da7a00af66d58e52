//! Gesture orchestrator
//!
//! Drives one gesture through `Idle → Planning → Emitting → Releasing →
//! Done | Failed`:
//!
//! 1. **Planning**: geometry and timing are computed up front; nothing
//!    touches the device if they fail.
//! 2. **Emitting**: a slot is taken, an optional lead-in delay elapses
//!    (humanized only), then each batch is paced to its planned instant and
//!    flushed before the next one is produced. Cancellation is polled
//!    before every batch and during waits.
//! 3. **Releasing**: the lift is written on success, a forced release on
//!    every other path. This phase ignores cancellation.
//!
//! The slot and the on-device contact are held by a [`ContactGuard`]; if
//! the emission scope unwinds without an explicit release, dropping the
//! guard sends the forced release and returns the slot.

use super::cancel::CancelToken;
use super::outcome::{GestureFailure, GestureOutcome, GesturePhase, GestureReport};
use crate::device::capabilities::DeviceCapabilities;
use crate::gesture::planner::{uniform_duration, GeometryPlanner, PlannerSettings};
use crate::gesture::timing::{TimingModel, TimingSettings};
use crate::gesture::types::{DurationBounds, GestureKind, GestureSpec, Timeline, TimedPoint};
use crate::protocol::encoder::{ProtocolEncoder, SlotTable, TouchSlot};
use crate::protocol::frame::{FrameBatch, RecordLayout};
use crate::time::timebase::{Clock, MonotonicClock, Timestamp};
use crate::transport::retry::is_partial_write;
use crate::transport::{DeviceTransport, EvdevSink, FrameSink, RetryPolicy};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest single sleep while pacing, so cancellation is noticed promptly.
const PACING_POLL: Duration = Duration::from_millis(2);

/// Runs gestures against one device.
pub struct Injector {
    caps: DeviceCapabilities,
    planner: GeometryPlanner,
    timing: TimingModel,
    slots: SlotTable,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    retry: RetryPolicy,
    lead_in: Option<DurationBounds>,
}

impl Injector {
    /// Create with default humanization and a wall clock.
    pub fn new(caps: DeviceCapabilities) -> Self {
        Self {
            slots: SlotTable::new(&caps),
            caps,
            planner: GeometryPlanner::new(),
            timing: TimingModel::new(),
            clock: Arc::new(MonotonicClock::new()),
            cancel: CancelToken::new(),
            retry: RetryPolicy::default(),
            lead_in: Some(DurationBounds::from_millis(50, 150)),
        }
    }

    pub fn with_planner(mut self, settings: PlannerSettings) -> Self {
        self.planner = GeometryPlanner::with_settings(settings);
        self
    }

    pub fn with_timing(mut self, settings: TimingSettings) -> Self {
        self.timing = TimingModel::with_settings(settings);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Policy used by transports this injector opens.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Delay before touch-down on humanized gestures; `None` disables it.
    pub fn with_lead_in(mut self, lead_in: Option<DurationBounds>) -> Self {
        self.lead_in = lead_in;
        self
    }

    pub fn caps(&self) -> &DeviceCapabilities {
        &self.caps
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Plan and time a gesture without touching any device.
    pub fn prepare(&self, spec: &GestureSpec) -> Result<Timeline> {
        let mut rng = seeded_rng(spec.seed);
        self.plan_timeline(spec, &mut rng)
    }

    /// Run one gesture to completion on `transport`, then close it.
    ///
    /// With a seed, a fresh injector writes the same frames on every run.
    /// Tracking ids advance per injector, so later gestures on the same
    /// injector differ in `ABS_MT_TRACKING_ID`.
    pub fn perform<S: FrameSink>(
        &mut self,
        spec: &GestureSpec,
        mut transport: DeviceTransport<S>,
    ) -> GestureOutcome {
        let outcome = self.run(spec, &mut transport);
        close_into(outcome, transport)
    }

    /// Open the evdev node at `path` and run one gesture on it.
    ///
    /// An unusable node fails with `DeviceUnavailable` before any planning.
    pub fn perform_on_path(&mut self, spec: &GestureSpec, path: impl AsRef<Path>) -> GestureOutcome {
        match self.open_evdev(path.as_ref()) {
            Ok(transport) => self.perform(spec, transport),
            Err(reason) => {
                warn!("{}", reason);
                GestureOutcome::Failed(GestureFailure {
                    reason,
                    phase: GesturePhase::Idle,
                    cleanup_error: None,
                    frames: 0,
                    trace: vec![GesturePhase::Idle, GesturePhase::Failed],
                })
            }
        }
    }

    /// Run gestures back to back on one transport, idling a random gap
    /// from `gap` between them. Stops at the first failure.
    pub fn perform_sequence<S: FrameSink>(
        &mut self,
        specs: &[GestureSpec],
        gap: DurationBounds,
        mut transport: DeviceTransport<S>,
    ) -> Vec<GestureOutcome> {
        let mut outcomes: Vec<GestureOutcome> = Vec::with_capacity(specs.len());
        let mut rng = seeded_rng(specs.first().and_then(|s| s.seed));

        for (i, spec) in specs.iter().enumerate() {
            if i > 0 {
                let pause = uniform_duration(&mut rng, gap);
                if let Err(reason) = self.idle(pause, &mut transport) {
                    outcomes.push(GestureOutcome::Failed(GestureFailure {
                        reason,
                        phase: GesturePhase::Idle,
                        cleanup_error: None,
                        frames: 0,
                        trace: vec![GesturePhase::Idle, GesturePhase::Failed],
                    }));
                    break;
                }
            }
            let outcome = self.run(spec, &mut transport);
            let done = outcome.is_done();
            outcomes.push(outcome);
            if !done {
                break;
            }
        }

        if let Some(last) = outcomes.pop() {
            outcomes.push(close_into(last, transport));
        }
        outcomes
    }

    fn open_evdev(&self, path: &Path) -> Result<DeviceTransport<EvdevSink>> {
        let transport = DeviceTransport::open_evdev_with(path, RecordLayout::native(), self.retry)?;
        Ok(transport.with_clock(self.clock.clone()))
    }

    fn idle<S: FrameSink>(&self, pause: Duration, transport: &mut DeviceTransport<S>) -> Result<()> {
        let deadline = self.clock.elapsed() + pause;
        wait_until(self.clock.as_ref(), Some(&self.cancel), deadline)?;
        transport.pause(pause)
    }

    fn plan_timeline(&self, spec: &GestureSpec, rng: &mut StdRng) -> Result<Timeline> {
        let plan = self.planner.plan(spec, &self.caps, rng)?;
        let timeline = self.timing.assign(&plan, &self.caps, rng);
        debug!(
            "timeline: {} points, lift at {}",
            timeline.points.len(),
            timeline.lift_at
        );
        Ok(timeline)
    }

    fn run<S: FrameSink>(
        &mut self,
        spec: &GestureSpec,
        transport: &mut DeviceTransport<S>,
    ) -> GestureOutcome {
        let kind = kind_name(spec);
        let frames_before = transport.frames_written();
        let batches_before = transport.batches_written();
        let mut trace = PhaseTrace::new();
        info!("{} ({:?}) starting", kind, spec.mode);

        // Planning
        trace.enter(GesturePhase::Planning);
        let mut rng = seeded_rng(spec.seed);
        let timeline = match self.plan_timeline(spec, &mut rng) {
            Ok(timeline) => timeline,
            Err(reason) => {
                return trace.fail(reason, GesturePhase::Planning, None, 0);
            }
        };
        let slot = match self.slots.acquire() {
            Ok(slot) => slot,
            Err(reason) => {
                return trace.fail(reason, GesturePhase::Planning, None, 0);
            }
        };
        let (slot_id, tracking_id) = (slot.id(), slot.tracking_id());

        // Emitting
        trace.enter(GesturePhase::Emitting);
        let lead_in = match self.lead_in {
            Some(bounds) if spec.is_humanized() => uniform_duration(&mut rng, bounds),
            _ => Duration::ZERO,
        };
        let origin = self.clock.elapsed() + lead_in;
        let clock = self.clock.as_ref();

        let mut guard = ContactGuard::new(&self.caps, slot, &mut self.slots, transport);
        let emitted = emit(&timeline, &mut guard, clock, &self.cancel, origin);

        // Releasing
        trace.enter(GesturePhase::Releasing);
        let released = match emitted {
            Ok(()) => {
                let lift = wait_until(clock, None, origin + timeline.lift_at.as_duration())
                    .and_then(|()| guard.lift(timeline.lift_at));
                match lift {
                    Ok(()) => Ok(()),
                    Err(reason) => {
                        let cleanup = guard.force_release(now_offset(clock, origin)).err();
                        Err((reason, GesturePhase::Releasing, cleanup))
                    }
                }
            }
            Err(reason) => {
                let cleanup = guard.force_release(now_offset(clock, origin)).err();
                Err((reason, GesturePhase::Emitting, cleanup))
            }
        };
        guard.finish();

        let frames = transport.frames_written() - frames_before;
        let batches = transport.batches_written() - batches_before;

        match released {
            Ok(()) => {
                trace.enter(GesturePhase::Done);
                let report = GestureReport {
                    kind,
                    mode: spec.mode,
                    points: timeline.points.len(),
                    batches,
                    frames,
                    duration: timeline.duration(),
                    lead_in,
                    slot: slot_id,
                    tracking_id,
                    trace: trace.into_vec(),
                };
                info!("{}", GestureOutcome::Done(report.clone()));
                GestureOutcome::Done(report)
            }
            Err((reason, phase, cleanup)) => {
                if let Some(cleanup) = &cleanup {
                    error!("forced release failed: {}", cleanup);
                }
                trace.fail(reason, phase, cleanup, frames)
            }
        }
    }
}

/// Stream touch-down and motion batches, paced to their planned instants.
fn emit<S: FrameSink>(
    timeline: &Timeline,
    guard: &mut ContactGuard<'_, S>,
    clock: &dyn Clock,
    cancel: &CancelToken,
    origin: Duration,
) -> Result<()> {
    let Some((first, rest)) = timeline.points.split_first() else {
        return Ok(());
    };

    wait_until(clock, Some(cancel), origin + first.at.as_duration())?;
    guard.touch_down(first)?;

    for point in rest {
        wait_until(clock, Some(cancel), origin + point.at.as_duration())?;
        guard.motion(point)?;
    }
    Ok(())
}

/// Block until `clock` reaches `deadline`, polling `cancel` if given.
fn wait_until(clock: &dyn Clock, cancel: Option<&CancelToken>, deadline: Duration) -> Result<()> {
    loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(Error::Cancelled);
        }
        let now = clock.elapsed();
        if now >= deadline {
            return Ok(());
        }
        let step = (deadline - now).min(if cancel.is_some() {
            PACING_POLL
        } else {
            Duration::MAX
        });
        clock.sleep(step);
    }
}

fn now_offset(clock: &dyn Clock, origin: Duration) -> Timestamp {
    Timestamp::from_duration(clock.elapsed().saturating_sub(origin))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn kind_name(spec: &GestureSpec) -> &'static str {
    match spec.kind.normalized() {
        GestureKind::Tap { .. } => "tap",
        GestureKind::Swipe { .. } => "swipe",
    }
}

/// Close the transport, folding a close error into the outcome.
fn close_into<S: FrameSink>(outcome: GestureOutcome, transport: DeviceTransport<S>) -> GestureOutcome {
    let closed = transport.close();
    match (outcome, closed) {
        (outcome, Ok(_)) => outcome,
        (GestureOutcome::Done(report), Err(reason)) => {
            warn!("closing device failed: {}", reason);
            let mut trace = report.trace;
            trace.pop();
            trace.push(GesturePhase::Failed);
            GestureOutcome::Failed(GestureFailure {
                reason,
                phase: GesturePhase::Releasing,
                cleanup_error: None,
                frames: report.frames,
                trace,
            })
        }
        (GestureOutcome::Failed(mut failure), Err(err)) => {
            warn!("closing device failed: {}", err);
            if failure.cleanup_error.is_none() {
                failure.cleanup_error = Some(err);
            }
            GestureOutcome::Failed(failure)
        }
    }
}

/// Ordered record of the phases a run went through.
struct PhaseTrace {
    phases: Vec<GesturePhase>,
}

impl PhaseTrace {
    fn new() -> Self {
        Self {
            phases: vec![GesturePhase::Idle],
        }
    }

    fn current(&self) -> GesturePhase {
        self.phases.last().copied().unwrap_or(GesturePhase::Idle)
    }

    fn enter(&mut self, next: GesturePhase) {
        debug_assert!(
            self.current().can_transition_to(next),
            "illegal transition {} -> {}",
            self.current(),
            next
        );
        debug!("phase {} -> {}", self.current(), next);
        self.phases.push(next);
    }

    fn into_vec(self) -> Vec<GesturePhase> {
        self.phases
    }

    fn fail(
        mut self,
        reason: Error,
        phase: GesturePhase,
        cleanup_error: Option<Error>,
        frames: usize,
    ) -> GestureOutcome {
        self.enter(GesturePhase::Failed);
        warn!("gesture failed while {}: {}", phase, reason);
        GestureOutcome::Failed(GestureFailure {
            reason,
            phase,
            cleanup_error,
            frames,
            trace: self.phases,
        })
    }
}

/// Owns the slot and the on-device contact for the emission scope.
struct ContactGuard<'a, S: FrameSink> {
    encoder: ProtocolEncoder,
    slot: Option<TouchSlot>,
    table: &'a mut SlotTable,
    transport: &'a mut DeviceTransport<S>,
    /// Touch-down reached the device and no release has yet
    on_device: bool,
}

impl<'a, S: FrameSink> ContactGuard<'a, S> {
    fn new(
        caps: &DeviceCapabilities,
        slot: TouchSlot,
        table: &'a mut SlotTable,
        transport: &'a mut DeviceTransport<S>,
    ) -> Self {
        Self {
            encoder: ProtocolEncoder::new(caps),
            slot: Some(slot),
            table,
            transport,
            on_device: false,
        }
    }

    fn touch_down(&mut self, point: &TimedPoint) -> Result<()> {
        let Some(slot) = self.slot.as_mut() else {
            return Ok(());
        };
        let batch = self.encoder.touch_down(slot, point)?;
        if let Err(e) = self.send(&batch) {
            // a partly written activation still needs its release
            self.on_device = is_partial_write(&e);
            return Err(e);
        }
        self.on_device = true;
        Ok(())
    }

    fn motion(&mut self, point: &TimedPoint) -> Result<()> {
        match self.encoder.motion(point) {
            Some(batch) => self.send(&batch),
            None => Ok(()),
        }
    }

    fn lift(&mut self, at: Timestamp) -> Result<()> {
        let Some(slot) = self.slot.as_mut() else {
            return Ok(());
        };
        if let Some(batch) = self.encoder.lift(slot, at) {
            self.send(&batch)?;
        }
        self.on_device = false;
        Ok(())
    }

    /// Release the contact if the device may still see it.
    fn force_release(&mut self, at: Timestamp) -> Result<()> {
        if !self.on_device {
            return Ok(());
        }
        let Some(slot) = self.slot.as_mut() else {
            return Ok(());
        };
        let batch = self.encoder.force_release(slot, at);
        warn!("forcing release of slot {}", slot.id());
        self.send(&batch)?;
        self.on_device = false;
        Ok(())
    }

    fn send(&mut self, batch: &FrameBatch) -> Result<()> {
        debug!("batch at {}: {} frames", batch.at(), batch.len());
        self.transport.write_batch(batch)
    }

    /// Return the slot to the table.
    fn finish(mut self) {
        if let Some(slot) = self.slot.take() {
            self.table.release(slot);
        }
    }
}

impl<S: FrameSink> Drop for ContactGuard<'_, S> {
    fn drop(&mut self) {
        if self.on_device {
            let at = self
                .encoder
                .last_at()
                .map(|t| t.advanced_by(Duration::from_micros(1)))
                .unwrap_or_default();
            if let Err(e) = self.force_release(at) {
                error!("release on unwind failed: {}", e);
            }
        }
        if let Some(slot) = self.slot.take() {
            self.table.release(slot);
        }
    }
}
