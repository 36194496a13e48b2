use crate::config::CameraConfig;
use crate::errors::PairError;
use crate::source::FrameSource;

/// Owns both camera sources and drives their lifecycle together.
///
/// The pair either comes up whole or not at all: on any partial failure the
/// source that did start is stopped and released before the error surfaces,
/// so no threads or handles leak.
pub struct SourcePair {
    left: FrameSource,
    right: FrameSource,
}

impl SourcePair {
    pub fn open_and_start(configs: &[CameraConfig; 2]) -> Result<Self, PairError> {
        let left = FrameSource::open(&configs[0]).map_err(|e| PairError::Open {
            sensor_id: configs[0].sensor_id,
            source: e,
        })?;

        let right = match FrameSource::open(&configs[1]) {
            Ok(right) => right,
            Err(e) => {
                // left is not started yet; dropping it releases the handle
                return Err(PairError::Open {
                    sensor_id: configs[1].sensor_id,
                    source: e,
                });
            }
        };

        Self::start_pair(left, right)
    }

    /// Start two already-opened sources as a pair.
    pub fn start_pair(mut left: FrameSource, mut right: FrameSource) -> Result<Self, PairError> {
        if let Err(e) = left.start() {
            let sensor_id = left.camera_id();
            left.release();
            right.release();
            return Err(PairError::Start {
                sensor_id,
                source: e,
            });
        }

        if let Err(e) = right.start() {
            let sensor_id = right.camera_id();
            left.stop();
            left.release();
            right.release();
            return Err(PairError::Start {
                sensor_id,
                source: e,
            });
        }

        tracing::info!(
            "Camera pair running (left={}, right={})",
            left.camera_id(),
            right.camera_id()
        );
        Ok(Self { left, right })
    }

    pub fn left(&self) -> &FrameSource {
        &self.left
    }

    pub fn right(&self) -> &FrameSource {
        &self.right
    }

    /// Stop and release both sources. Idempotent.
    pub fn shutdown(&mut self) {
        self.left.stop();
        self.left.release();
        self.right.stop();
        self.right.release();
    }
}
