#![allow(dead_code)]

use recorder::device::{CaptureDevice, DeviceInfo, ReadResult};
use recorder::errors::{ReadError, SinkError, UploadError};
use recorder::frame::Frame;
use recorder::sink::{SinkOpener, VideoSink};
use recorder::upload::Uploader;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Synthetic camera producing uniform frames where every byte equals the
/// frame counter. Any mixed buffer seen by a reader is a torn read.
pub struct SyntheticDevice {
    width: u32,
    height: u32,
    frame_rate: f64,
    period: Duration,
    /// Number of frames to produce; `None` means unlimited. Once exhausted
    /// the device reports no data.
    limit: Option<u64>,
    pub pumping: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicBool>,
}

impl SyntheticDevice {
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            frame_rate,
            period: Duration::from_secs_f64(1.0 / frame_rate),
            limit: None,
            pumping: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// A device that never produces a frame.
    pub fn silent(width: u32, height: u32, frame_rate: f64) -> Self {
        Self::new(width, height, frame_rate).with_limit(0)
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

struct PumpGuard(Arc<AtomicUsize>);

impl Drop for PumpGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CaptureDevice for SyntheticDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        }
    }

    fn pump(
        &mut self,
        running: &AtomicBool,
        deliver: &mut dyn FnMut(ReadResult),
    ) -> Result<(), ReadError> {
        self.pumping.fetch_add(1, Ordering::SeqCst);
        let _guard = PumpGuard(Arc::clone(&self.pumping));

        let mut counter = 0u64;
        while running.load(Ordering::Relaxed) {
            std::thread::sleep(self.period);
            if self.limit.is_some_and(|limit| counter >= limit) {
                deliver(Ok(None));
                continue;
            }
            counter += 1;
            deliver(Ok(Some(Frame::solid(
                self.width,
                self.height,
                (counter % 256) as u8,
            ))));
        }
        Ok(())
    }
}

pub type SinkRecord = (PathBuf, u64);

/// Sink writing raw RGB bytes to a plain file, recording frame counts per
/// finished segment.
pub struct RawFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
    log: Arc<Mutex<Vec<SinkRecord>>>,
}

impl VideoSink for RawFileSink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        self.writer.write_all(&frame.pixels)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), SinkError> {
        self.writer
            .flush()
            .map_err(|e| SinkError::Finalize(e.to_string()))?;
        self.log.lock().unwrap().push((self.path.clone(), self.frames));
        Ok(())
    }
}

#[derive(Default)]
pub struct RawFileOpener {
    pub finished: Arc<Mutex<Vec<SinkRecord>>>,
}

impl SinkOpener for RawFileOpener {
    fn open(
        &self,
        path: &Path,
        _width: u32,
        _height: u32,
        _frame_rate: u32,
    ) -> Result<Box<dyn VideoSink>, SinkError> {
        let file = File::create(path).map_err(|e| SinkError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(RawFileSink {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            frames: 0,
            log: Arc::clone(&self.finished),
        }))
    }
}

/// Uploader recording every handoff, optionally refusing them all.
#[derive(Default)]
pub struct StubUploader {
    pub uploads: Arc<Mutex<Vec<PathBuf>>>,
    pub fail: bool,
}

impl Uploader for StubUploader {
    fn upload(&self, path: &Path) -> Result<(), UploadError> {
        self.uploads.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            Err(UploadError::Transport("synthetic outage".into()))
        } else {
            Ok(())
        }
    }
}
