use std::time::{Duration, Instant};

/// Measures how much of a per-frame work budget has been spent.
pub struct UpdateTimer {
    start_time: Option<Instant>,
    elapsed: Duration,
}

#[allow(dead_code)]
impl UpdateTimer {
    pub fn new() -> UpdateTimer {
        UpdateTimer {
            start_time: None,
            elapsed: Duration::new(0, 0),
        }
    }

    /// Start (or restart) measuring from now.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.elapsed = Duration::new(0, 0);
    }

    pub fn stop(&mut self) {
        if self.start_time.is_some() {
            self.elapsed = self.elapsed_duration();
            self.start_time = None;
        }
    }

    pub fn elapsed_duration(&self) -> Duration {
        match self.start_time {
            Some(start_time) => start_time.elapsed(),
            None => self.elapsed,
        }
    }

    pub fn elapsed_seconds_f32(&self) -> f32 {
        self.elapsed_duration().as_secs_f32()
    }

    /// True while there is budget left. A budget of zero never runs out.
    pub fn within_budget(&self, budget_secs: f32) -> bool {
        budget_secs <= 0.0 || self.elapsed_seconds_f32() < budget_secs
    }
}

impl Default for UpdateTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic frame clock. Patches stamp their last height change with it.
pub struct FrameClock {
    epoch: Instant,
    frame: u64,
    frame_time_us: u64,
}

#[allow(dead_code)]
impl FrameClock {
    pub fn new() -> FrameClock {
        FrameClock {
            epoch: Instant::now(),
            frame: 0,
            frame_time_us: 0,
        }
    }

    /// Latch the time for the next frame.
    pub fn advance(&mut self) {
        self.frame += 1;
        let now = self.epoch.elapsed().as_micros() as u64;
        // Keep stamps strictly increasing even on coarse clocks.
        self.frame_time_us = now.max(self.frame_time_us + 1);
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Microseconds since the clock was created, as latched by the last `advance`.
    pub fn frame_time_us(&self) -> u64 {
        self.frame_time_us
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
