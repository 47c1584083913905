use std::time::{Duration, Instant};

pub trait Clock {
    /// Milliseconds since an arbitrary epoch.
    fn millis(&self) -> u64;
    fn delay_ms(&mut self, ms: u64);
    /// Called on every pass of a poll loop.
    fn relax(&mut self);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    t0: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { t0: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        self.t0.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn relax(&mut self) {
        std::thread::sleep(Duration::from_micros(200));
    }
}

/// Clock that only moves when told to. `relax` advances it by `step_ms` so
/// poll loops make progress.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    pub now: u64,
    pub step_ms: u64,
    pub slept: Vec<u64>,
}

#[cfg(test)]
impl ManualClock {
    pub fn stepping(step_ms: u64) -> Self {
        Self {
            step_ms,
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u64) {
        self.slept.push(ms);
        self.now += ms;
    }

    fn relax(&mut self) {
        self.now += self.step_ms;
    }
}
