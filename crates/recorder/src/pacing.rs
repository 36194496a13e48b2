use std::time::{Duration, Instant};

/// Paces the capture loop at the display tick rate.
pub struct TickPacer {
    period: Duration,
    tick_start: Instant,
}

impl TickPacer {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64),
            tick_start: Instant::now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep out the remainder of the current tick and arm the next one.
    pub fn wait(&mut self) {
        let elapsed = self.tick_start.elapsed();
        if elapsed < self.period {
            std::thread::sleep(self.period - elapsed);
        } else {
            tracing::trace!("Tick took longer than its budget: {:?}", elapsed);
        }
        self.tick_start = Instant::now();
    }
}
