use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Wall clock for realtime runs: the gap between ticks and time since start.
pub struct Time {
    start: Instant,
    last: Instant,
    delta: Duration,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, delta: Duration::ZERO }
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now.duration_since(self.last);
        self.last = now;
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Seconds from construction to the latest tick.
    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

const FPS_WINDOW: usize = 10;

/// Frame-rate meter averaged over the last few frames.
#[derive(Debug, Default)]
pub struct FrameStats {
    samples: VecDeque<f32>,
    frames: u64,
    simulated: f32,
}

impl FrameStats {
    pub fn record(&mut self, dt: f32) {
        if self.samples.len() == FPS_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(dt);
        self.frames += 1;
        self.simulated += dt;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn simulated_seconds(&self) -> f32 {
        self.simulated
    }

    pub fn fps(&self) -> Option<f32> {
        let total: f32 = self.samples.iter().sum();
        (total > 0.0).then(|| self.samples.len() as f32 / total)
    }
}
