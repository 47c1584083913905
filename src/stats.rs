use std::time::Instant;

use crate::engine::TickOutcome;

#[derive(Debug, Clone)]
pub struct LinkStats {
    pub sent: u64,
    pub echoed: u64,
    pub timeouts: u64,
    pub corrupt: u64,
    pub unconfirmed: u64,
    pub bytes: u64,
    t0: Instant,
    last: Instant,
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            sent: 0,
            echoed: 0,
            timeouts: 0,
            corrupt: 0,
            unconfirmed: 0,
            bytes: 0,
            t0: Instant::now(),
            last: Instant::now(),
        }
    }

    pub fn record(&mut self, outcome: &TickOutcome) {
        match *outcome {
            TickOutcome::Echoed { sent, confirmed, .. } => {
                self.count_send(sent, confirmed);
                self.echoed += 1;
            }
            TickOutcome::TimedOut { sent, confirmed } => {
                self.count_send(sent, confirmed);
                self.timeouts += 1;
            }
            TickOutcome::Corrupt { sent, confirmed } => {
                self.count_send(sent, confirmed);
                self.corrupt += 1;
            }
            TickOutcome::Responded {
                echoed,
                discarded,
                unconfirmed,
                bytes,
            } => {
                self.sent += echoed;
                self.echoed += echoed;
                self.corrupt += discarded;
                self.unconfirmed += unconfirmed;
                self.bytes += bytes;
            }
        }
    }

    fn count_send(&mut self, len: usize, confirmed: bool) {
        self.sent += 1;
        self.bytes += len as u64;
        if !confirmed {
            self.unconfirmed += 1;
        }
    }

    /// Percentage of initiator sends that came back.
    pub fn echo_rate(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        100.0 * self.echoed as f64 / self.sent as f64
    }

    pub fn summary(&self, tag: &str) -> String {
        let dur = self.t0.elapsed().as_secs_f64().max(1e-3);
        format!(
            "[{}] sent={} echoed={} ({:.1}%) timeouts={} corrupt={} unconfirmed={} bytes={} over {:.1}s",
            tag,
            self.sent,
            self.echoed,
            self.echo_rate(),
            self.timeouts,
            self.corrupt,
            self.unconfirmed,
            self.bytes,
            dur
        )
    }

    pub fn maybe_print(&mut self, tag: &str, stats_int: f64) {
        if stats_int > 0.0 && self.last.elapsed().as_secs_f64() >= stats_int {
            log::info!("{}", self.summary(tag));
            self.last = Instant::now();
        }
    }
}
