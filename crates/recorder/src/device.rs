use crate::config::CameraConfig;
use crate::decoder::{FrameDecoder, MjpegDecoder, YuyvDecoder};
use crate::errors::{OpenError, ReadError};
use crate::frame::{FlipMethod, Frame};
use anyhow::{Context, Result, anyhow};
use common::retry_with_backoff;
use std::sync::atomic::{AtomicBool, Ordering};
use v4l::{
    Device, FourCC,
    buffer::Type,
    io::{mmap::Stream, traits::CaptureStream},
    video::Capture,
};

const BUFFER_COUNT: u32 = 4;

const FOURCC_YUYV: FourCC = FourCC { repr: *b"YUYV" };
const FOURCC_MJPG: FourCC = FourCC { repr: *b"MJPG" };

pub type ReadResult = Result<Option<Frame>, ReadError>;

#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// Hardware capture boundary.
///
/// The blocking read loop lives inside the device because the underlying
/// capture stream borrows the device handle; the producer thread calls
/// `pump` once and receives every read result through `deliver`.
pub trait CaptureDevice: Send + 'static {
    fn info(&self) -> DeviceInfo;

    /// Blocking read loop. Delivers `Ok(Some(frame))` per decoded frame,
    /// `Ok(None)` when the hardware returned no data, and `Err` on a
    /// transient read failure. Returns once `running` is cleared, or with an
    /// error if the stream itself cannot be brought up.
    fn pump(
        &mut self,
        running: &AtomicBool,
        deliver: &mut dyn FnMut(ReadResult),
    ) -> Result<(), ReadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    Yuyv,
    Mjpeg,
}

fn open_device(sensor_id: u32) -> Result<Device> {
    let device = Device::new(sensor_id as usize)
        .with_context(|| format!("failed to open /dev/video{sensor_id}"))?;
    device.query_caps().context("failed to query capabilities")?;
    Ok(device)
}

/// Select best pixel format: prefer YUYV (faster decode), fallback to MJPEG
fn select_format(device: &Device) -> Result<PixelFormat> {
    let formats = device.enum_formats()?;

    tracing::debug!("Available formats:");
    for fmt in &formats {
        tracing::debug!("  {:?}: {}", fmt.fourcc, fmt.description);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_YUYV) {
        return Ok(PixelFormat::Yuyv);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_MJPG) {
        return Ok(PixelFormat::Mjpeg);
    }

    Err(anyhow!(
        "Camera supports neither YUYV nor MJPEG - available: {:?}",
        formats.iter().map(|f| f.fourcc).collect::<Vec<_>>()
    ))
}

/// A V4L2-backed capture device.
///
/// Each sensor is position-bound (left/right), so there is no fallback
/// scanning to other video devices: opening the wrong sensor would silently
/// record the wrong viewpoint.
pub struct V4lDevice {
    sensor_id: u32,
    device: Device,
    capture_width: u32,
    capture_height: u32,
    output_width: u32,
    output_height: u32,
    frame_rate: f64,
    flip: FlipMethod,
    decoder: Box<dyn FrameDecoder>,
}

impl V4lDevice {
    pub fn open(config: &CameraConfig) -> Result<Self, OpenError> {
        let sensor_id = config.sensor_id;
        let unavailable = |e: &dyn std::fmt::Display| OpenError::Unavailable {
            sensor_id,
            reason: e.to_string(),
        };

        let device = retry_with_backoff(|| open_device(sensor_id), 5, 200, "Camera open")
            .map_err(|e| unavailable(&e))?;

        let caps = device.query_caps().map_err(|e| unavailable(&e))?;
        tracing::info!("Camera {} opened: {} ({})", sensor_id, caps.card, caps.driver);

        let pixel_format = select_format(&device).map_err(|e| unavailable(&e))?;
        let fourcc = match pixel_format {
            PixelFormat::Yuyv => FOURCC_YUYV,
            PixelFormat::Mjpeg => FOURCC_MJPG,
        };

        let mut format = device.format().map_err(|e| unavailable(&e))?;
        format.fourcc = fourcc;
        format.width = config.capture_width;
        format.height = config.capture_height;
        let format = device.set_format(&format).map_err(|e| unavailable(&e))?;

        tracing::info!(
            "Camera {} capture format: {}x{} {:?} ({:?})",
            sensor_id,
            format.width,
            format.height,
            format.fourcc,
            pixel_format
        );

        let decoder: Box<dyn FrameDecoder> = match pixel_format {
            PixelFormat::Yuyv => Box::new(YuyvDecoder),
            PixelFormat::Mjpeg => Box::new(MjpegDecoder::new().map_err(|e| unavailable(&e))?),
        };

        // The driver reports the rate it actually granted; fall back to the
        // configured rate if the query fails.
        let frame_rate = device
            .params()
            .ok()
            .map(|p| p.interval.denominator as f64 / p.interval.numerator as f64)
            .unwrap_or(config.frame_rate as f64);
        tracing::info!("Camera {} frame rate: {:.1} fps", sensor_id, frame_rate);

        // Probe read: opening succeeds only if the first frame comes back.
        {
            let mut stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
                .map_err(|e| OpenError::ProbeFailed {
                    sensor_id,
                    reason: e.to_string(),
                })?;
            stream.next().map_err(|e| OpenError::ProbeFailed {
                sensor_id,
                reason: e.to_string(),
            })?;
        }

        Ok(Self {
            sensor_id,
            device,
            capture_width: format.width,
            capture_height: format.height,
            output_width: config.output_width,
            output_height: config.output_height,
            frame_rate,
            flip: config.flip,
            decoder,
        })
    }
}

impl CaptureDevice for V4lDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            width: self.output_width,
            height: self.output_height,
            frame_rate: self.frame_rate,
        }
    }

    fn pump(
        &mut self,
        running: &AtomicBool,
        deliver: &mut dyn FnMut(ReadResult),
    ) -> Result<(), ReadError> {
        let Self {
            sensor_id,
            device,
            capture_width,
            capture_height,
            output_width,
            output_height,
            flip,
            decoder,
            ..
        } = self;

        let mut stream = Stream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| ReadError(format!("failed to create capture stream: {e}")))?;

        tracing::info!(
            "Camera {} streaming at {}x{}",
            sensor_id,
            capture_width,
            capture_height
        );

        while running.load(Ordering::Relaxed) {
            match stream.next() {
                Ok((data, _meta)) => {
                    if data.is_empty() {
                        deliver(Ok(None));
                        continue;
                    }
                    match decoder.decode(data, *capture_width, *capture_height) {
                        Ok(frame) => {
                            let frame = frame
                                .flipped(*flip)
                                .resized_nearest(*output_width, *output_height);
                            deliver(Ok(Some(frame)));
                        }
                        Err(e) => deliver(Err(ReadError(format!("decode error: {e}")))),
                    }
                }
                Err(e) => deliver(Err(ReadError(e.to_string()))),
            }
        }

        Ok(())
    }
}
