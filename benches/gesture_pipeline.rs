//! Criterion benchmarks for the gesture hot paths
//!
//! Covers: planning and timing of taps and swipes, protocol encoding of a
//! timeline, and serialization of batches to `input_event` records.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use touch_injector::protocol::encoder::{ProtocolEncoder, SlotTable};
use touch_injector::protocol::frame::RecordLayout;
use touch_injector::time::timebase::ManualClock;
use touch_injector::transport::{DeviceTransport, MemorySink, RetryPolicy};
use touch_injector::{DeviceCapabilities, GestureSpec, Injector, Point};

fn panel() -> DeviceCapabilities {
    DeviceCapabilities::touchscreen(1080, 2400)
}

fn vertical_swipe(distance: f64, seed: u64) -> GestureSpec {
    GestureSpec::swipe(Point::new(540.0, 200.0), Point::new(540.0, 200.0 + distance)).with_seed(seed)
}

// ---------------------------------------------------------------------------
// Planning benchmarks
// ---------------------------------------------------------------------------

fn bench_prepare_tap(c: &mut Criterion) {
    let injector = Injector::new(panel());
    let spec = GestureSpec::tap(Point::new(500.0, 800.0)).with_seed(7);

    c.bench_function("prepare_tap_humanized", |b| {
        b.iter(|| {
            let timeline = injector.prepare(black_box(&spec));
            black_box(timeline.ok());
        });
    });
}

fn bench_prepare_swipe(c: &mut Criterion) {
    let injector = Injector::new(panel());
    let mut group = c.benchmark_group("prepare_swipe");

    for distance in [200.0, 800.0, 2000.0] {
        let spec = vertical_swipe(distance, 11);
        group.bench_with_input(
            BenchmarkId::from_parameter(distance as u32),
            &spec,
            |b, spec| {
                b.iter(|| black_box(injector.prepare(black_box(spec)).ok()));
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Encoding benchmarks
// ---------------------------------------------------------------------------

fn bench_encode_swipe(c: &mut Criterion) {
    let caps = panel();
    let injector = Injector::new(caps.clone());
    let mut group = c.benchmark_group("encode_swipe");

    for distance in [200.0, 2000.0] {
        let timeline = match injector.prepare(&vertical_swipe(distance, 5)) {
            Ok(timeline) => timeline,
            Err(_) => continue,
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(timeline.points.len()),
            &timeline,
            |b, timeline| {
                let mut slots = SlotTable::new(&caps);
                b.iter(|| {
                    let Ok(mut slot) = slots.acquire() else {
                        return;
                    };
                    let mut encoder = ProtocolEncoder::new(&caps);
                    let batches = encoder.encode(black_box(timeline), &mut slot);
                    slots.release(slot);
                    black_box(batches.ok());
                });
            },
        );
    }
    group.finish();
}

fn bench_batch_to_bytes(c: &mut Criterion) {
    let caps = panel();
    let injector = Injector::new(caps.clone());
    let Ok(timeline) = injector.prepare(&vertical_swipe(1200.0, 9)) else {
        return;
    };
    let mut slots = SlotTable::new(&caps);
    let Ok(mut slot) = slots.acquire() else {
        return;
    };
    let Ok(batches) = ProtocolEncoder::new(&caps).encode(&timeline, &mut slot) else {
        return;
    };

    c.bench_function("batches_to_bytes_64", |b| {
        b.iter(|| {
            let total: usize = batches
                .iter()
                .map(|batch| batch.to_bytes(black_box(RecordLayout::Bits64)).len())
                .sum();
            black_box(total);
        });
    });
}

// ---------------------------------------------------------------------------
// End-to-end benchmarks
// ---------------------------------------------------------------------------

fn bench_perform_exact_swipe(c: &mut Criterion) {
    let spec = vertical_swipe(1000.0, 3).humanized(false);

    c.bench_function("perform_exact_swipe_memory", |b| {
        let clock = ManualClock::new();
        let mut injector = Injector::new(panel()).with_clock(Arc::new(clock.clone()));
        b.iter(|| {
            let sink = MemorySink::new();
            let transport = DeviceTransport::new(sink, RetryPolicy::none())
                .with_clock(Arc::new(clock.clone()));
            black_box(injector.perform(black_box(&spec), transport).is_done());
        });
    });
}

criterion_group!(
    benches,
    bench_prepare_tap,
    bench_prepare_swipe,
    bench_encode_swipe,
    bench_batch_to_bytes,
    bench_perform_exact_swipe,
);
criterion_main!(benches);
