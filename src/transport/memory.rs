//! In-memory sink for dry runs and tests.
//!
//! Clones share one recording, so a test can keep a handle while the
//! transport owns another. Faults can be scheduled per batch, and a hook
//! runs after every recorded batch (e.g. to trigger cancellation at a
//! precise point of a gesture).

use super::FrameSink;
use crate::protocol::frame::EventFrame;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

type BatchHook = Box<dyn FnMut(usize, &[EventFrame]) + Send>;

#[derive(Debug, Clone, Copy)]
struct Fault {
    /// Fires once this many batches are recorded
    after: usize,
    remaining: u32,
    kind: io::ErrorKind,
}

#[derive(Default)]
struct Recording {
    batches: Vec<Vec<EventFrame>>,
    faults: Vec<Fault>,
    attempts: usize,
    hook: Option<BatchHook>,
}

#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Recording>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` submissions with `kind`.
    pub fn fail_next(&self, count: u32, kind: io::ErrorKind) {
        let mut rec = self.inner.lock();
        let after = rec.batches.len();
        rec.faults.push(Fault {
            after,
            remaining: count,
            kind,
        });
    }

    /// Fail `count` submissions with `kind` once `after` batches are recorded.
    pub fn fail_after(&self, after: usize, count: u32, kind: io::ErrorKind) {
        self.inner.lock().faults.push(Fault {
            after,
            remaining: count,
            kind,
        });
    }

    /// Run `hook(index, frames)` after each recorded batch.
    pub fn on_batch<F>(&self, hook: F)
    where
        F: FnMut(usize, &[EventFrame]) + Send + 'static,
    {
        self.inner.lock().hook = Some(Box::new(hook));
    }

    /// Recorded batches, in submission order.
    pub fn batches(&self) -> Vec<Vec<EventFrame>> {
        self.inner.lock().batches.clone()
    }

    /// All recorded frames, flattened.
    pub fn frames(&self) -> Vec<EventFrame> {
        self.inner.lock().batches.iter().flatten().copied().collect()
    }

    pub fn batch_count(&self) -> usize {
        self.inner.lock().batches.len()
    }

    /// Submissions seen, failed ones included.
    pub fn attempts(&self) -> usize {
        self.inner.lock().attempts
    }

    pub fn clear(&self) {
        let mut rec = self.inner.lock();
        rec.batches.clear();
        rec.faults.clear();
        rec.attempts = 0;
    }
}

impl FrameSink for MemorySink {
    fn submit(&mut self, frames: &[EventFrame]) -> io::Result<()> {
        let (index, hook) = {
            let mut rec = self.inner.lock();
            rec.attempts += 1;
            let recorded = rec.batches.len();
            if let Some(fault) = rec
                .faults
                .iter_mut()
                .find(|f| f.remaining > 0 && recorded >= f.after)
            {
                fault.remaining -= 1;
                return Err(io::Error::new(fault.kind, "injected fault"));
            }
            rec.batches.push(frames.to_vec());
            (recorded, rec.hook.take())
        };

        // run outside the lock so the hook may inspect the sink
        if let Some(mut hook) = hook {
            hook(index, frames);
            let mut rec = self.inner.lock();
            if rec.hook.is_none() {
                rec.hook = Some(hook);
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
