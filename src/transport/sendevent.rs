//! `sendevent` script sink
//!
//! Renders batches as an Android shell script, one
//! `sendevent <dev> <type> <code> <value>` line per frame, with a `sleep`
//! between batches reproducing the planned gaps. Useful on devices where
//! the node is only writable from `adb shell`.

use super::FrameSink;
use crate::protocol::frame::EventFrame;
use crate::time::timebase::Timestamp;
use crate::Result;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

pub struct ScriptSink<W: Write + Send> {
    out: W,
    device: String,
    last_at: Option<Timestamp>,
    started: bool,
}

impl ScriptSink<BufWriter<File>> {
    /// Create (or truncate) a script file.
    pub fn create(path: &Path, device: impl Into<String>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), device))
    }
}

impl<W: Write + Send> ScriptSink<W> {
    /// `device` is the node path as seen on the target.
    pub fn new(out: W, device: impl Into<String>) -> Self {
        Self {
            out,
            device: device.into(),
            last_at: None,
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> FrameSink for ScriptSink<W> {
    fn submit(&mut self, frames: &[EventFrame]) -> io::Result<()> {
        if !self.started {
            writeln!(self.out, "#!/system/bin/sh")?;
            self.started = true;
        }

        let at = frames.last().map(|f| f.at).unwrap_or_default();
        if let Some(last) = self.last_at {
            let gap = at.duration_since(last);
            if !gap.is_zero() {
                writeln!(self.out, "sleep {:.6}", gap.as_secs_f64())?;
            }
        }
        self.last_at = Some(at);

        let mut block = String::with_capacity(frames.len() * 40);
        for frame in frames {
            block.push_str(&frame.to_sendevent(&self.device));
            block.push('\n');
        }
        self.out.write_all(block.as_bytes())
    }

    fn idle(&mut self, d: Duration) -> io::Result<()> {
        if self.started && !d.is_zero() {
            writeln!(self.out, "sleep {:.6}", d.as_secs_f64())?;
        }
        // the next gesture restarts its timestamps at zero
        self.last_at = None;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn describe(&self) -> String {
        format!("sendevent script for {}", self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::codes::EventCode;

    #[test]
    fn test_script_lines_and_sleeps() {
        let mut sink = ScriptSink::new(Vec::new(), "/dev/input/event2");
        let t0 = Timestamp::ZERO;
        let t1 = Timestamp::from_micros(12_500);

        sink.submit(&[EventFrame::new(EventCode::MT_POSITION_X, 5, t0), EventFrame::sync(t0)])
            .unwrap();
        sink.submit(&[EventFrame::new(EventCode::MT_POSITION_Y, 7, t1), EventFrame::sync(t1)])
            .unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "#!/system/bin/sh",
                "sendevent /dev/input/event2 3 53 5",
                "sendevent /dev/input/event2 0 0 0",
                "sleep 0.012500",
                "sendevent /dev/input/event2 3 54 7",
                "sendevent /dev/input/event2 0 0 0",
            ]
        );
    }

    #[test]
    fn test_idle_inserts_pause_between_gestures() {
        let mut sink = ScriptSink::new(Vec::new(), "/dev/input/event2");
        let late = Timestamp::from_micros(90_000);
        sink.submit(&[EventFrame::sync(late)]).unwrap();
        sink.idle(Duration::from_millis(80)).unwrap();
        sink.submit(&[EventFrame::sync(Timestamp::ZERO)]).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let sleeps: Vec<&str> = text.lines().filter(|l| l.starts_with("sleep")).collect();
        assert_eq!(sleeps, vec!["sleep 0.080000"]);
    }

    #[test]
    fn test_create_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tap.sh");
        let mut sink = ScriptSink::create(&path, "/dev/input/event1").unwrap();
        sink.submit(&[EventFrame::sync(Timestamp::ZERO)]).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("sendevent /dev/input/event1 0 0 0\n"));
    }
}
