use std::time::{Duration, Instant};

use super::systems::SystemId;

/// Wall-clock cost of one pipeline system, in milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct SystemTimings {
    pub system: SystemId,
    pub last_ms: f32,
    pub average_ms: f32,
    pub max_ms: f32,
    pub samples: u64,
}

#[derive(Clone, Copy, Default)]
struct Samples {
    last: Duration,
    total: Duration,
    max: Duration,
    count: u64,
}

impl Samples {
    fn push(&mut self, elapsed: Duration) {
        self.last = elapsed;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
        self.count += 1;
    }

    fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total / count,
            Err(_) => self.total.div_f64(self.count as f64),
        }
    }
}

fn ms(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}

/// Per-system and whole-frame timings for the pipeline.
#[derive(Default)]
pub struct SystemProfiler {
    systems: [Samples; SystemId::ORDER.len()],
    frames: Samples,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f`, charging its wall-clock time to `system`.
    pub fn measure<R>(&mut self, system: SystemId, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.systems[system as usize].push(start.elapsed());
        result
    }

    pub(crate) fn finish_frame(&mut self, elapsed: Duration) {
        self.frames.push(elapsed);
    }

    pub fn timings(&self, system: SystemId) -> Option<SystemTimings> {
        let samples = &self.systems[system as usize];
        (samples.count > 0).then(|| SystemTimings {
            system,
            last_ms: ms(samples.last),
            average_ms: ms(samples.average()),
            max_ms: ms(samples.max),
            samples: samples.count,
        })
    }

    /// Systems that have run at least once, in pipeline order.
    pub fn summaries(&self) -> Vec<SystemTimings> {
        SystemId::ORDER.iter().filter_map(|&system| self.timings(system)).collect()
    }

    /// Average and worst full-pipeline time per frame.
    pub fn frame_ms(&self) -> (f32, f32) {
        (ms(self.frames.average()), ms(self.frames.max))
    }

    pub fn frames(&self) -> u64 {
        self.frames.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measured_systems_accumulate_samples() {
        let mut profiler = SystemProfiler::new();
        for _ in 0..3 {
            profiler.measure(SystemId::Movement, || ());
        }
        let timings = profiler.timings(SystemId::Movement).expect("movement recorded");
        assert_eq!(timings.samples, 3);
        assert!(timings.max_ms >= timings.average_ms);
        assert!(profiler.timings(SystemId::Collision).is_none());
    }

    #[test]
    fn summaries_follow_pipeline_order() {
        let mut profiler = SystemProfiler::new();
        profiler.measure(SystemId::FireDamage, || ());
        profiler.measure(SystemId::Movement, || ());
        let order: Vec<SystemId> = profiler.summaries().iter().map(|t| t.system).collect();
        assert_eq!(order, vec![SystemId::Movement, SystemId::FireDamage]);
    }

    #[test]
    fn measure_passes_through_the_result() {
        let mut profiler = SystemProfiler::new();
        let value = profiler.measure(SystemId::Detection, || 41 + 1);
        assert_eq!(value, 42);
        profiler.finish_frame(Duration::from_millis(4));
        profiler.finish_frame(Duration::from_millis(2));
        assert_eq!(profiler.frames(), 2);
        let (average, worst) = profiler.frame_ms();
        assert!((average - 3.0).abs() < 1e-3);
        assert!((worst - 4.0).abs() < 1e-3);
    }
}
