use crate::errors::SinkError;
use crate::frame::Frame;
use crate::sink::{SinkOpener, VideoSink};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A finalized segment, ready for upload handoff.
#[derive(Debug)]
pub struct CompletedSegment {
    pub path: PathBuf,
    pub frames: u64,
}

struct ActiveSegment {
    path: PathBuf,
    sink: Box<dyn VideoSink>,
    started: Instant,
    frames: u64,
}

enum State {
    Idle,
    Recording(ActiveSegment),
    Closed,
}

/// Writes frames into bounded-duration segment files, one sink at a time.
///
/// State machine: Idle -> Recording -> Idle (finalize), looping; Closed is
/// terminal. Finalizing happens inside `finalize()`: the old sink is fully
/// flushed and closed before `begin_segment` can succeed again, so at no
/// instant are two sinks open.
pub struct SegmentRecorder {
    opener: Box<dyn SinkOpener>,
    output_dir: PathBuf,
    width: u32,
    height: u32,
    frame_rate: u32,
    state: State,
    last_timestamp: u64,
}

impl SegmentRecorder {
    pub fn new(
        opener: Box<dyn SinkOpener>,
        output_dir: PathBuf,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Self {
        Self {
            opener,
            output_dir,
            width,
            height,
            frame_rate,
            state: State::Idle,
            last_timestamp: 0,
        }
    }

    /// Open a new segment sink. Fails unless the recorder is idle.
    pub fn begin_segment(&mut self) -> Result<&Path, SinkError> {
        if !matches!(self.state, State::Idle) {
            return Err(SinkError::InvalidState { expected: "Idle" });
        }

        fs::create_dir_all(&self.output_dir).map_err(|e| SinkError::Open {
            path: self.output_dir.clone(),
            reason: e.to_string(),
        })?;

        let path = self.next_segment_path();
        let sink = self
            .opener
            .open(&path, self.width, self.height, self.frame_rate)?;

        tracing::info!("Recording segment {}", path.display());
        self.state = State::Recording(ActiveSegment {
            path,
            sink,
            started: Instant::now(),
            frames: 0,
        });

        match &self.state {
            State::Recording(active) => Ok(&active.path),
            _ => unreachable!("state was just set to Recording"),
        }
    }

    /// Segment files are named by capture timestamp in seconds since epoch.
    /// The timestamp is bumped on collision so that sub-second rotation
    /// still yields unique, ordered names.
    fn next_segment_path(&mut self) -> PathBuf {
        let mut timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if timestamp <= self.last_timestamp {
            timestamp = self.last_timestamp + 1;
        }
        self.last_timestamp = timestamp;
        self.output_dir.join(format!("{timestamp}.mp4"))
    }

    /// Append a frame to the active segment. A failure here is fatal for the
    /// whole session; video must not be dropped silently.
    pub fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        match &mut self.state {
            State::Recording(active) => {
                active.sink.write(frame)?;
                active.frames += 1;
                Ok(())
            }
            _ => Err(SinkError::InvalidState {
                expected: "Recording",
            }),
        }
    }

    /// Time since `begin_segment`, zero when idle.
    pub fn elapsed(&self) -> Duration {
        match &self.state {
            State::Recording(active) => active.started.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn frames(&self) -> u64 {
        match &self.state {
            State::Recording(active) => active.frames,
            _ => 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }

    /// Close the active sink, flushing all buffered data, and hand back the
    /// completed path for upload.
    pub fn finalize(&mut self) -> Result<CompletedSegment, SinkError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Recording(active) => {
                active.sink.finish()?;
                tracing::info!(
                    "Finalized segment {} ({} frames)",
                    active.path.display(),
                    active.frames
                );
                Ok(CompletedSegment {
                    path: active.path,
                    frames: active.frames,
                })
            }
            State::Closed => {
                self.state = State::Closed;
                Err(SinkError::InvalidState {
                    expected: "Recording",
                })
            }
            State::Idle => Err(SinkError::InvalidState {
                expected: "Recording",
            }),
        }
    }

    /// Terminal shutdown. Finalizes the active segment if one is open.
    pub fn close(&mut self) -> Result<Option<CompletedSegment>, SinkError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Recording(active) => {
                active.sink.finish()?;
                tracing::info!(
                    "Finalized segment {} ({} frames) on shutdown",
                    active.path.display(),
                    active.frames
                );
                Ok(Some(CompletedSegment {
                    path: active.path,
                    frames: active.frames,
                }))
            }
            _ => Ok(None),
        }
    }
}
