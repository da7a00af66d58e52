//! Binary evdev sink
//!
//! Writes `struct input_event` records straight into a `/dev/input/eventN`
//! node. The whole batch goes out in one `write(2)`, which the input core
//! processes atomically up to the trailing `SYN_REPORT`.

use super::FrameSink;
use crate::protocol::frame::{EventFrame, RecordLayout};
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct EvdevSink {
    file: File,
    path: PathBuf,
    layout: RecordLayout,
    buf: Vec<u8>,
}

impl EvdevSink {
    /// Open `path` for writing after checking it is a writable, non-directory
    /// node.
    pub fn open(path: &Path, layout: RecordLayout) -> Result<Self> {
        let unavailable = |reason: String| Error::DeviceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => unavailable("no such device node".to_string()),
            _ => unavailable(e.to_string()),
        })?;
        if meta.is_dir() {
            return Err(unavailable("is a directory".to_string()));
        }
        if meta.permissions().readonly() {
            return Err(unavailable("node is read-only".to_string()));
        }

        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => unavailable("permission denied".to_string()),
                _ => unavailable(e.to_string()),
            })?;

        debug!("opened {} ({:?} records)", path.display(), layout);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            layout,
            buf: Vec::with_capacity(16 * layout.record_size()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }
}

/// Write `buf` fully, continuing after short writes with the remainder only.
///
/// An error before any byte is written is returned as is and may be
/// retried. Once part of the batch is on the device, a failure becomes
/// `WriteZero` so the caller never resends the records already written.
fn write_records<W: Write>(out: &mut W, buf: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match out.write(&buf[written..]) {
            Ok(0) => return Err(short_write(written, buf.len(), None)),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if written == 0 => return Err(e),
            Err(e) => return Err(short_write(written, buf.len(), Some(e))),
        }
    }
    Ok(())
}

fn short_write(written: usize, total: usize, cause: Option<io::Error>) -> io::Error {
    let msg = match cause {
        Some(e) => format!("short write: {} of {} bytes ({})", written, total, e),
        None => format!("short write: {} of {} bytes", written, total),
    };
    io::Error::new(io::ErrorKind::WriteZero, msg)
}

impl FrameSink for EvdevSink {
    fn submit(&mut self, frames: &[EventFrame]) -> io::Result<()> {
        self.buf.clear();
        for frame in frames {
            frame.write_record(self.layout, &mut self.buf);
        }
        write_records(&mut self.file, &self.buf)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::codes::EventCode;
    use crate::time::timebase::Timestamp;

    #[test]
    fn test_missing_node_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = EvdevSink::open(&dir.path().join("event9"), RecordLayout::Bits64)
            .err()
            .unwrap();
        assert!(matches!(err, Error::DeviceUnavailable { .. }));
        assert!(err.to_string().contains("no such device node"));
    }

    #[test]
    fn test_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = EvdevSink::open(dir.path(), RecordLayout::Bits64).err().unwrap();
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn test_submit_writes_whole_batch() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut sink = EvdevSink::open(file.path(), RecordLayout::Bits64).unwrap();

        let at = Timestamp::from_micros(1_500);
        let frames = [
            EventFrame::new(EventCode::MT_POSITION_X, 42, at),
            EventFrame::sync(at),
        ];
        sink.submit(&frames).unwrap();
        sink.finish().unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(bytes.len(), 48);
        let first = EventFrame::read_record(RecordLayout::Bits64, &bytes[..24]).unwrap();
        assert_eq!(first, frames[0]);
        let second = EventFrame::read_record(RecordLayout::Bits64, &bytes[24..]).unwrap();
        assert!(second.is_sync());
    }

    /// Accepts at most `chunk` bytes per call, then fails once `limit` is reached.
    struct ChokedWriter {
        data: Vec<u8>,
        chunk: usize,
        limit: usize,
        kind: io::ErrorKind,
    }

    impl Write for ChokedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() >= self.limit {
                return Err(io::Error::from(self.kind));
            }
            let n = buf.len().min(self.chunk).min(self.limit - self.data.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn touch_down_bytes() -> Vec<u8> {
        let at = Timestamp::from_micros(10);
        let mut buf = Vec::new();
        for frame in [
            EventFrame::new(EventCode::MT_SLOT, 0, at),
            EventFrame::new(EventCode::MT_TRACKING_ID, 7, at),
            EventFrame::new(EventCode::MT_POSITION_X, 100, at),
            EventFrame::new(EventCode::MT_POSITION_Y, 200, at),
            EventFrame::new(EventCode::MT_PRESSURE, 255, at),
            EventFrame::sync(at),
        ] {
            frame.write_record(RecordLayout::Bits64, &mut buf);
        }
        buf
    }

    #[test]
    fn test_short_writes_continue_with_remainder() {
        let buf = touch_down_bytes();
        let mut out = ChokedWriter {
            data: Vec::new(),
            chunk: 48,
            limit: usize::MAX,
            kind: io::ErrorKind::WouldBlock,
        };
        write_records(&mut out, &buf).unwrap();
        assert_eq!(out.data, buf);
    }

    #[test]
    fn test_partial_touch_down_is_not_rewritten() {
        let buf = touch_down_bytes();
        let mut out = ChokedWriter {
            data: Vec::new(),
            chunk: 48,
            limit: 48,
            kind: io::ErrorKind::WouldBlock,
        };
        let err = write_records(&mut out, &buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(out.data, buf[..48].to_vec());

        // nothing written yet: the original error survives for retry
        let mut blocked = ChokedWriter {
            data: Vec::new(),
            chunk: 48,
            limit: 0,
            kind: io::ErrorKind::WouldBlock,
        };
        let err = write_records(&mut blocked, &buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
