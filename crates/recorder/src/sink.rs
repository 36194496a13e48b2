use crate::errors::SinkError;
use crate::frame::Frame;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// One segment's encoding sink. Exclusively owned and written by the
/// capture loop; there is no write concurrency.
pub trait VideoSink: Send {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError>;

    /// Flush all buffered data and close the sink.
    fn finish(self: Box<Self>) -> Result<(), SinkError>;
}

/// Opens a fresh sink for each segment.
pub trait SinkOpener: Send {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<Box<dyn VideoSink>, SinkError>;
}

/// H.264 MP4 sink backed by a child ffmpeg process consuming raw RGB24 on
/// stdin. Encoder posture matches the recording profile this pipeline has
/// always used: zerolatency tune, superfast preset, 3000 kbps.
pub struct FfmpegSink {
    path: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
    frame_size: usize,
}

pub struct FfmpegOpener;

impl SinkOpener for FfmpegOpener {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<Box<dyn VideoSink>, SinkError> {
        let open_err = |reason: String| SinkError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{width}x{height}"),
                "-r",
                &frame_rate.to_string(),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                "superfast",
                "-tune",
                "zerolatency",
                "-b:v",
                "3000k",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| open_err(format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| open_err("ffmpeg stdin not captured".into()))?;

        Ok(Box::new(FfmpegSink {
            path: path.to_path_buf(),
            child,
            stdin: Some(stdin),
            frame_size: (width * height * Frame::CHANNELS) as usize,
        }))
    }
}

impl VideoSink for FfmpegSink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        if frame.pixels.len() != self.frame_size {
            return Err(SinkError::FrameSize {
                expected: self.frame_size,
                got: frame.pixels.len(),
            });
        }
        match &mut self.stdin {
            Some(stdin) => {
                stdin.write_all(&frame.pixels)?;
                Ok(())
            }
            None => Err(SinkError::InvalidState {
                expected: "Recording",
            }),
        }
    }

    fn finish(mut self: Box<Self>) -> Result<(), SinkError> {
        // Closing stdin signals end-of-stream; ffmpeg then writes the moov
        // atom and exits.
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| SinkError::Finalize(format!("failed to wait for ffmpeg: {e}")))?;
        if !status.success() {
            return Err(SinkError::Finalize(format!(
                "ffmpeg exited with {} for {}",
                status,
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Reached only if finish() was never called (error paths). Close the
        // pipe and reap the child so no zombie is left behind.
        drop(self.stdin.take());
        if let Err(e) = self.child.wait() {
            tracing::warn!("Failed to reap ffmpeg for {}: {}", self.path.display(), e);
        }
    }
}
