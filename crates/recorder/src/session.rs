use crate::display::{Display, DisplayStatus};
use crate::errors::SinkError;
use crate::frame::{Frame, compose_side_by_side};
use crate::pacing::TickPacer;
use crate::segment::{CompletedSegment, SegmentRecorder};
use crate::source::FrameSource;
use crate::supervisor::SourcePair;
use crate::upload::Uploader;
use std::fs;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub frame_rate: u32,
    pub max_segment: Duration,
    /// Keep segment files on disk even after a successful upload.
    pub keep_local: bool,
}

/// Why the inner recording loop stopped.
enum SegmentEnd {
    /// Segment duration reached, or a source reported no valid frame yet;
    /// rotate and start the next segment.
    Rotate,
    /// Operator or signal requested exit.
    Exit,
}

/// Process-wide capture state: both camera sources, the segment recorder,
/// and the collaborators. Drives the tick loop and guarantees a single,
/// idempotent teardown on every exit path.
pub struct CaptureSession {
    sources: SourcePair,
    recorder: SegmentRecorder,
    uploader: Box<dyn Uploader>,
    display: Box<dyn Display>,
    pacer: TickPacer,
    max_segment: Duration,
    keep_local: bool,
    shutdown: Arc<AtomicBool>,
    torn_down: bool,
}

impl CaptureSession {
    pub fn new(
        sources: SourcePair,
        recorder: SegmentRecorder,
        uploader: Box<dyn Uploader>,
        display: Box<dyn Display>,
        options: SessionOptions,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sources,
            recorder,
            uploader,
            display,
            pacer: TickPacer::new(options.frame_rate),
            max_segment: options.max_segment,
            keep_local: options.keep_local,
            shutdown,
            torn_down: false,
        }
    }

    /// Run until an exit condition or a fatal sink error. Teardown runs on
    /// both paths.
    pub fn run(&mut self) -> Result<(), SinkError> {
        let result = self.capture_loop();
        self.teardown();
        result
    }

    fn capture_loop(&mut self) -> Result<(), SinkError> {
        while !self.exit_requested() {
            self.recorder.begin_segment()?;
            let end = self.record_segment()?;
            let completed = self.recorder.finalize()?;
            let was_empty = completed.frames == 0;
            self.handoff(completed);
            if matches!(end, SegmentEnd::Exit) {
                break;
            }
            if was_empty {
                // Both sources are still warming up (or have gone away);
                // don't spin opening and closing empty segments.
                self.pacer.wait();
            }
        }
        Ok(())
    }

    /// One segment's worth of ticks.
    fn record_segment(&mut self) -> Result<SegmentEnd, SinkError> {
        loop {
            if self.exit_requested() {
                return Ok(SegmentEnd::Exit);
            }

            let (left, right) = match (
                snapshot(self.sources.left()),
                snapshot(self.sources.right()),
            ) {
                (Some(left), Some(right)) => (left, right),
                _ => {
                    // End-of-stream on either camera: rotate out the current
                    // segment and try again with a fresh one.
                    tracing::debug!("No valid frame pair available, rotating segment");
                    return Ok(SegmentEnd::Rotate);
                }
            };

            self.recorder.write(&left)?;

            let composed = compose_side_by_side(&left, &right);
            if self.display.present(&composed) == DisplayStatus::Closed {
                tracing::info!("Display closed, shutting down");
                return Ok(SegmentEnd::Exit);
            }

            if self.recorder.elapsed() >= self.max_segment {
                return Ok(SegmentEnd::Rotate);
            }

            self.pacer.wait();
        }
    }

    /// Hand a finalized segment to the uploader. The local file is deleted
    /// only after the uploader confirms success; on failure it stays on disk
    /// and capture moves on to the next segment.
    fn handoff(&mut self, segment: CompletedSegment) {
        if segment.frames == 0 {
            tracing::warn!("Discarding empty segment {}", segment.path.display());
            remove_file(&segment.path);
            return;
        }

        match self.uploader.upload(&segment.path) {
            Ok(()) => {
                tracing::info!(
                    "Uploaded segment {} ({} frames)",
                    segment.path.display(),
                    segment.frames
                );
                if !self.keep_local {
                    remove_file(&segment.path);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Upload failed for {}: {} (keeping local file)",
                    segment.path.display(),
                    e
                );
            }
        }
    }

    /// Single teardown path for normal and error exit: stop and release both
    /// sources first, then finalize any open segment. Idempotent.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.sources.shutdown();
        match self.recorder.close() {
            Ok(Some(completed)) => self.handoff(completed),
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to finalize segment during teardown: {}", e),
        }
    }

    fn exit_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn snapshot(source: &FrameSource) -> Option<Frame> {
    match source.read() {
        (true, frame) => frame,
        _ => None,
    }
}

fn remove_file(path: &std::path::Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!("Failed to remove {}: {}", path.display(), e);
    }
}
