use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Startup failure of a single hardware source. Fatal for the session.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("camera {sensor_id} unavailable: {reason}")]
    Unavailable { sensor_id: u32, reason: String },

    #[error("camera {sensor_id} first read failed: {reason}")]
    ProbeFailed { sensor_id: u32, reason: String },
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("producer is already running")]
    AlreadyRunning,

    #[error("source was never opened")]
    NotOpened,

    #[error("failed to spawn producer thread: {0}")]
    Spawn(String),
}

/// Transient single-frame miss. Logged and retried, never fatal.
#[derive(Error, Debug)]
#[error("frame read failed: {0}")]
pub struct ReadError(pub String);

/// Dual-source startup failure. The source that did come up has been stopped
/// and released by the time this surfaces.
#[derive(Error, Debug)]
pub enum PairError {
    #[error("camera {sensor_id} failed to open: {source}")]
    Open {
        sensor_id: u32,
        #[source]
        source: OpenError,
    },

    #[error("camera {sensor_id} failed to start: {source}")]
    Start {
        sensor_id: u32,
        #[source]
        source: StartError,
    },
}

/// Encoding sink failure. Fatal for the session: recording cannot proceed
/// without a writable sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to open sink at {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("sink write failed: {0}")]
    Write(#[from] io::Error),

    #[error("frame size mismatch: expected {expected} bytes, got {got}")]
    FrameSize { expected: usize, got: usize },

    #[error("sink finalize failed: {0}")]
    Finalize(String),

    #[error("recorder is not in the {expected} state")]
    InvalidState { expected: &'static str },
}

/// Upload failure. Does not stop capture, but the local file is kept.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server rejected upload: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_display() {
        let err = OpenError::Unavailable {
            sensor_id: 1,
            reason: "no such device".into(),
        };
        assert_eq!(err.to_string(), "camera 1 unavailable: no such device");

        let err = OpenError::ProbeFailed {
            sensor_id: 0,
            reason: "timeout".into(),
        };
        assert_eq!(err.to_string(), "camera 0 first read failed: timeout");
    }

    #[test]
    fn test_pair_error_carries_source() {
        let err = PairError::Start {
            sensor_id: 1,
            source: StartError::NotOpened,
        };
        assert_eq!(
            err.to_string(),
            "camera 1 failed to start: source was never opened"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_sink_error_from_io() {
        fn broken_pipe() -> Result<(), io::Error> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn propagates() -> Result<(), SinkError> {
            broken_pipe()?;
            Ok(())
        }

        match propagates().unwrap_err() {
            SinkError::Write(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn test_invalid_state_display() {
        let err = SinkError::InvalidState {
            expected: "Recording",
        };
        assert_eq!(err.to_string(), "recorder is not in the Recording state");
    }
}
