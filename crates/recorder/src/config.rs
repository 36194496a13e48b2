use crate::frame::FlipMethod;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use common::Environment;

/// Per-camera capture descriptor.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub sensor_id: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub frame_rate: u32,
    pub flip: FlipMethod,
}

impl CameraConfig {
    pub fn sensor(sensor_id: u32) -> Self {
        Self {
            sensor_id,
            capture_width: 1920,
            capture_height: 1080,
            output_width: 640,
            output_height: 360,
            frame_rate: 30,
            flip: FlipMethod::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub environment: Environment,
    pub cameras: [CameraConfig; 2],
    pub output_dir: PathBuf,
    pub max_segment: Duration,
    pub upload_url: Option<String>,
    pub keep_local: bool,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl RecorderConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let capture_width = env_parse("CAPTURE_WIDTH", 1920);
        let capture_height = env_parse("CAPTURE_HEIGHT", 1080);
        let output_width = env_parse("OUTPUT_WIDTH", 640);
        let output_height = env_parse("OUTPUT_HEIGHT", 360);
        let frame_rate = env_parse("FRAME_RATE", 30);

        let flip_code: u32 = env_parse("FLIP_METHOD", 0);
        let flip = FlipMethod::from_code(flip_code).unwrap_or_else(|| {
            tracing::warn!("Unsupported FLIP_METHOD {}, using none", flip_code);
            FlipMethod::None
        });

        let camera = |sensor_id| CameraConfig {
            sensor_id,
            capture_width,
            capture_height,
            output_width,
            output_height,
            frame_rate,
            flip,
        };

        let left = env_parse("LEFT_SENSOR_ID", 0);
        let right = env_parse("RIGHT_SENSOR_ID", 1);
        anyhow::ensure!(
            left != right,
            "LEFT_SENSOR_ID and RIGHT_SENSOR_ID must name different sensors"
        );

        let output_dir = PathBuf::from(env_parse("OUTPUT_DIR", "cam".to_string()));
        let max_segment = Duration::from_secs(env_parse("MAX_SEGMENT_SECS", 10u64));
        anyhow::ensure!(frame_rate > 0, "FRAME_RATE must be positive");
        anyhow::ensure!(!max_segment.is_zero(), "MAX_SEGMENT_SECS must be positive");

        let upload_url = env::var("UPLOAD_URL").ok().filter(|s| !s.is_empty());
        let keep_local = env_parse("KEEP_LOCAL", false);

        Ok(Self {
            environment,
            cameras: [camera(left), camera(right)],
            output_dir,
            max_segment,
            upload_url,
            keep_local,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults_match_capture_profile() {
        let config = CameraConfig::sensor(1);
        assert_eq!(config.sensor_id, 1);
        assert_eq!(config.capture_width, 1920);
        assert_eq!(config.capture_height, 1080);
        assert_eq!(config.output_width, 640);
        assert_eq!(config.output_height, 360);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.flip, FlipMethod::None);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        // Key that is never set in the test environment
        assert_eq!(env_parse("RECORDER_TEST_UNSET_KEY", 7u32), 7);
    }
}
