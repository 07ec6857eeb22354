use std::time::Duration;

use crate::time::Time;

/// Converts wall-clock time into whole fixed simulation steps.
pub(crate) struct FixedStepper {
    clock: Time,
    step: f32,
    max_backlog: f32,
    pending: f32,
}

/// What one poll of the clock produced.
pub(crate) struct Steps {
    pub count: u32,
    pub dt: f32,
    /// Backlog thrown away because the host fell too far behind.
    pub discarded: f32,
}

impl FixedStepper {
    pub(crate) fn new(clock: Time, step: f32, max_backlog: f32) -> Self {
        Self { clock, step, max_backlog, pending: 0.0 }
    }

    pub(crate) fn clock(&self) -> &Time {
        &self.clock
    }

    pub(crate) fn poll(&mut self) -> Steps {
        self.clock.tick();
        self.feed(self.clock.delta_seconds())
    }

    fn feed(&mut self, elapsed: f32) -> Steps {
        self.pending += elapsed;
        let discarded = (self.pending - self.max_backlog).max(0.0);
        self.pending -= discarded;
        let count = if self.step > 0.0 { (self.pending / self.step).floor() as u32 } else { 0 };
        self.pending -= count as f32 * self.step;
        Steps { count, dt: self.step, discarded }
    }

    /// Wall-clock time left before another step is due.
    pub(crate) fn until_next_step(&self) -> Duration {
        Duration::from_secs_f32((self.step - self.pending).max(0.0))
    }
}
