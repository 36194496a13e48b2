use crate::config::CameraConfig;
use crate::device::{CaptureDevice, DeviceInfo, ReadResult, V4lDevice};
use crate::errors::{OpenError, StartError};
use crate::frame::Frame;
use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};

#[derive(Default)]
struct Slot {
    frame: Option<Frame>,
    valid: bool,
}

type DeviceCell = Mutex<Option<Box<dyn CaptureDevice>>>;

fn lock_device(cell: &DeviceCell) -> MutexGuard<'_, Option<Box<dyn CaptureDevice>>> {
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // A producer panic while holding the lock leaves the previous complete
    // frame behind, which is still safe to read.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One camera's latest-frame buffer.
///
/// A background producer thread blocks on the hardware read and publishes
/// each result into a single lock-protected slot; the capture loop snapshots
/// the slot without ever touching hardware I/O.
///
/// Slot policy: the buffer is only overwritten when a read actually returned
/// data. A read that fails or comes back empty clears the validity flag but
/// keeps the stale frame around for diagnostics.
pub struct FrameSource {
    camera_id: u32,
    info: DeviceInfo,
    device: Option<Box<dyn CaptureDevice>>,
    slot: Arc<Mutex<Slot>>,
    running: Arc<AtomicBool>,
    producer: Option<JoinHandle<Box<dyn CaptureDevice>>>,
}

impl FrameSource {
    /// Open the hardware handle for one sensor. Fails if the device cannot
    /// be opened or its first read fails; nothing is left held on failure.
    pub fn open(config: &CameraConfig) -> Result<Self, OpenError> {
        let device = V4lDevice::open(config)?;
        Ok(Self::from_device(config.sensor_id, Box::new(device)))
    }

    /// Wrap an already-opened capture device. This is the seam the tests use
    /// to substitute synthetic devices.
    pub fn from_device(camera_id: u32, device: Box<dyn CaptureDevice>) -> Self {
        let info = device.info();
        Self {
            camera_id,
            info,
            device: Some(device),
            slot: Arc::new(Mutex::new(Slot::default())),
            running: Arc::new(AtomicBool::new(false)),
            producer: None,
        }
    }

    pub fn camera_id(&self) -> u32 {
        self.camera_id
    }

    pub fn info(&self) -> DeviceInfo {
        self.info
    }

    pub fn is_running(&self) -> bool {
        self.producer.is_some()
    }

    /// Spawn the producer loop.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.producer.is_some() {
            return Err(StartError::AlreadyRunning);
        }
        let device = self.device.take().ok_or(StartError::NotOpened)?;

        self.running.store(true, Ordering::Relaxed);
        let slot = Arc::clone(&self.slot);
        let running = Arc::clone(&self.running);
        let camera_id = self.camera_id;

        // Held in a shared cell so the device can be recovered if the spawn
        // itself fails (the closure would otherwise own it either way).
        let device_cell = Arc::new(Mutex::new(Some(device)));
        let worker_cell = Arc::clone(&device_cell);

        let spawned = thread::Builder::new()
            .name(format!("camera-{camera_id}"))
            .spawn(move || {
                let mut device = lock_device(&worker_cell)
                    .take()
                    .expect("device is present until the producer takes it");
                let mut deliver = |result: ReadResult| publish(&slot, camera_id, result);
                if let Err(e) = device.pump(&running, &mut deliver) {
                    tracing::error!("Camera {} producer stopped: {}", camera_id, e);
                    lock_slot(&slot).valid = false;
                }
                device
            });

        match spawned {
            Ok(handle) => {
                self.producer = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                self.device = lock_device(&device_cell).take();
                Err(StartError::Spawn(e.to_string()))
            }
        }
    }

    /// Snapshot the latest frame. Never blocks on hardware I/O, and the
    /// returned copy is never torn: it is either entirely the previous or
    /// entirely the newest completed frame.
    ///
    /// Returns `(false, None)` before the first successful read.
    pub fn read(&self) -> (bool, Option<Frame>) {
        let slot = lock_slot(&self.slot);
        (slot.valid, slot.frame.clone())
    }

    /// Stop the producer. Joins the thread, so no further slot writes happen
    /// after this returns. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.producer.take() {
            match handle.join() {
                Ok(device) => self.device = Some(device),
                Err(_) => tracing::error!("Camera {} producer panicked", self.camera_id),
            }
        }
    }

    /// Release the hardware handle. Stops the producer first if it is still
    /// running. Idempotent.
    pub fn release(&mut self) {
        if self.producer.is_some() {
            self.stop();
        }
        if self.device.take().is_some() {
            tracing::debug!("Camera {} released", self.camera_id);
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

fn publish(slot: &Mutex<Slot>, camera_id: u32, result: ReadResult) {
    match result {
        Ok(Some(frame)) => {
            let mut slot = lock_slot(slot);
            slot.frame = Some(frame);
            slot.valid = true;
        }
        Ok(None) => {
            lock_slot(slot).valid = false;
        }
        Err(e) => {
            tracing::warn!("Camera {} frame read failed: {}", camera_id, e);
            lock_slot(slot).valid = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReadError;
    use std::time::Duration;

    /// Delivers a fixed number of solid frames, then reports no data.
    struct ScriptedDevice {
        frames: u64,
        fail_read: bool,
    }

    impl CaptureDevice for ScriptedDevice {
        fn info(&self) -> DeviceInfo {
            DeviceInfo {
                width: 4,
                height: 2,
                frame_rate: 30.0,
            }
        }

        fn pump(
            &mut self,
            running: &AtomicBool,
            deliver: &mut dyn FnMut(ReadResult),
        ) -> Result<(), ReadError> {
            let mut produced = 0;
            while running.load(Ordering::Relaxed) {
                if produced < self.frames {
                    deliver(Ok(Some(Frame::solid(4, 2, produced as u8))));
                    produced += 1;
                } else if self.fail_read {
                    deliver(Err(ReadError("synthetic failure".into())));
                } else {
                    deliver(Ok(None));
                }
                thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) {
        for _ in 0..500 {
            if predicate() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached within timeout");
    }

    #[test]
    fn test_read_before_first_frame_is_invalid() {
        let source = FrameSource::from_device(
            0,
            Box::new(ScriptedDevice {
                frames: 0,
                fail_read: false,
            }),
        );
        let (valid, frame) = source.read();
        assert!(!valid);
        assert!(frame.is_none());
    }

    #[test]
    fn test_start_twice_fails() {
        let mut source = FrameSource::from_device(
            0,
            Box::new(ScriptedDevice {
                frames: 1,
                fail_read: false,
            }),
        );
        source.start().unwrap();
        assert!(matches!(source.start(), Err(StartError::AlreadyRunning)));
        source.stop();
    }

    #[test]
    fn test_start_without_device_fails() {
        let mut source = FrameSource::from_device(
            0,
            Box::new(ScriptedDevice {
                frames: 1,
                fail_read: false,
            }),
        );
        source.release();
        assert!(matches!(source.start(), Err(StartError::NotOpened)));
    }

    #[test]
    fn test_failed_read_keeps_stale_frame() {
        let mut source = FrameSource::from_device(
            0,
            Box::new(ScriptedDevice {
                frames: 1,
                fail_read: true,
            }),
        );
        source.start().unwrap();

        // One good frame, then failures clear validity but keep the buffer
        wait_for(|| {
            let (valid, frame) = source.read();
            !valid && frame.is_some()
        });
        source.stop();
    }

    #[test]
    fn test_stop_then_restart() {
        let mut source = FrameSource::from_device(
            0,
            Box::new(ScriptedDevice {
                frames: u64::MAX,
                fail_read: false,
            }),
        );
        source.start().unwrap();
        wait_for(|| source.read().0);
        source.stop();
        assert!(!source.is_running());

        // stop() handed the device back, so a restart is possible
        source.start().unwrap();
        source.stop();
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut source = FrameSource::from_device(
            0,
            Box::new(ScriptedDevice {
                frames: 1,
                fail_read: false,
            }),
        );
        source.start().unwrap();
        source.release();
        source.release();
        assert!(!source.is_running());
    }
}
