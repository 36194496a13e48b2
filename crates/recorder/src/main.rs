use anyhow::Context;
use common::setup_logging;
use recorder::config::RecorderConfig;
use recorder::display::HeadlessDisplay;
use recorder::segment::SegmentRecorder;
use recorder::session::{CaptureSession, SessionOptions};
use recorder::sink::FfmpegOpener;
use recorder::supervisor::SourcePair;
use recorder::upload::{HttpUploader, NullUploader, Uploader};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let config = RecorderConfig::from_env()?;
    setup_logging(config.environment);
    let shutdown = Arc::new(AtomicBool::new(false));

    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;

    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    let sources = SourcePair::open_and_start(&config.cameras)
        .context("Failed to start camera pair - check V4L2 device availability")?;
    let info = sources.left().info();

    let recorder = SegmentRecorder::new(
        Box::new(FfmpegOpener),
        config.output_dir.clone(),
        info.width,
        info.height,
        config.cameras[0].frame_rate,
    );

    // Without an endpoint there is nothing to confirm, so local files are
    // always kept.
    let (uploader, keep_local): (Box<dyn Uploader>, bool) = match &config.upload_url {
        Some(url) => (
            Box::new(HttpUploader::new(url.clone()).map_err(anyhow::Error::new)?),
            config.keep_local,
        ),
        None => (Box::new(NullUploader), true),
    };

    let options = SessionOptions {
        frame_rate: config.cameras[0].frame_rate,
        max_segment: config.max_segment,
        keep_local,
    };

    let mut session = CaptureSession::new(
        sources,
        recorder,
        uploader,
        Box::new(HeadlessDisplay),
        options,
        Arc::clone(&shutdown),
    );

    match session.run() {
        Ok(()) => {
            tracing::info!("Recorder stopped gracefully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Recorder failed: {}", e);
            anyhow::bail!("Recorder error: {}", e)
        }
    }
}
