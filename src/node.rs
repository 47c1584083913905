use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cli::{RoleChoice, SerialOpts};
use crate::clock::{Clock, SystemClock};
use crate::diag::{DiagSink, Diagnostic, LogSink};
use crate::engine::{PingPongEngine, TickOutcome};
use crate::port::{SerialRadio, open_port};
use crate::radio::{FixedStrap, RadioConfig, RadioError, Transceiver};
use crate::role::{STRAP_SETTLE_MS, select_role};
use crate::stats::LinkStats;

#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Stop after this many initiator ticks, or this many echoes on a responder.
    pub ticks: Option<u64>,
    /// Seconds between stats lines, 0 to disable.
    pub stats_interval: f64,
}

/// Drives the engine until the limit is hit or `stop` is raised.
pub fn run_loop(
    engine: &mut PingPongEngine,
    radio: &mut dyn Transceiver,
    clock: &mut dyn Clock,
    diag: &mut dyn DiagSink,
    limits: &RunLimits,
    stop: &AtomicBool,
    tag: &str,
) -> Result<LinkStats, RadioError> {
    let mut stats = LinkStats::new();
    let mut done: u64 = 0;

    while !stop.load(Ordering::Acquire) {
        if let Some(max) = limits.ticks
            && done >= max
        {
            break;
        }
        let outcome = engine.tick(radio, clock, diag)?;
        stats.record(&outcome);
        match outcome {
            TickOutcome::Responded { echoed: 0, .. } => clock.relax(),
            TickOutcome::Responded { echoed, .. } => done += echoed,
            _ => done += 1,
        }
        stats.maybe_print(tag, limits.stats_interval);
    }
    Ok(stats)
}

/// Serial node: strap on CTS (unless forced), direction on RTS.
pub fn run(opts: SerialOpts) -> Result<()> {
    log::debug!("[serial] {:?}", opts);
    let port = open_port(&opts)?;
    let mut radio = SerialRadio::new(port, &opts.dev);
    let mut clock = SystemClock::new();
    let mut diag = LogSink::new(&opts.dev);

    // let the strap pull-up settle before sampling it
    clock.delay_ms(opts.settle_ms.unwrap_or(STRAP_SETTLE_MS));
    diag.emit(Diagnostic::Preamble);
    let role = match opts.role {
        RoleChoice::Auto => select_role(&mut radio, &mut diag),
        RoleChoice::Ping => select_role(&mut FixedStrap(true), &mut diag),
        RoleChoice::Pong => select_role(&mut FixedStrap(false), &mut diag),
    }
    .context("reading role strap")?;

    let mut engine = PingPongEngine::new(role);
    engine
        .setup(&mut radio, &RadioConfig::default(), &mut diag)
        .with_context(|| format!("configuring {}", opts.dev))?;

    let limits = RunLimits {
        ticks: opts.ticks,
        stats_interval: opts.stats,
    };
    let never = AtomicBool::new(false);
    let stats = run_loop(
        &mut engine,
        &mut radio,
        &mut clock,
        &mut diag,
        &limits,
        &never,
        &opts.dev,
    )
    .with_context(|| format!("link on {}", opts.dev))?;
    log::info!("{}", stats.summary(&opts.dev));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::radio::PipeAddr;
    use crate::role::Role;
    use std::collections::VecDeque;

    /// Hands every sent frame straight back.
    #[derive(Default)]
    struct Loopback {
        queue: VecDeque<Vec<u8>>,
    }

    impl Transceiver for Loopback {
        fn begin(&mut self, _: &RadioConfig) -> Result<(), RadioError> {
            Ok(())
        }
        fn open_pipes(&mut self, _: PipeAddr, _: PipeAddr) -> Result<(), RadioError> {
            Ok(())
        }
        fn set_transmit_mode(&mut self) -> Result<(), RadioError> {
            Ok(())
        }
        fn set_receive_mode(&mut self) -> Result<(), RadioError> {
            Ok(())
        }
        fn send(&mut self, payload: &[u8]) -> Result<bool, RadioError> {
            self.queue.push_back(payload.to_vec());
            Ok(true)
        }
        fn frame_available(&mut self) -> Result<bool, RadioError> {
            Ok(!self.queue.is_empty())
        }
        fn received_frame_len(&mut self) -> Result<usize, RadioError> {
            Ok(self.queue.front().map_or(0, Vec::len))
        }
        fn receive(&mut self, buf: &mut [u8]) -> Result<(), RadioError> {
            if let Some(p) = self.queue.pop_front() {
                buf.copy_from_slice(&p[..buf.len()]);
            }
            Ok(())
        }
        fn details(&self) -> String {
            "loopback".into()
        }
    }

    #[test]
    fn initiator_stops_after_tick_limit() {
        let mut engine = PingPongEngine::new(Role::Initiator);
        let mut radio = Loopback::default();
        let mut clock = ManualClock::stepping(1);
        let mut diag: Vec<Diagnostic> = Vec::new();
        let limits = RunLimits {
            ticks: Some(3),
            stats_interval: 0.0,
        };
        let stop = AtomicBool::new(false);
        let stats = run_loop(
            &mut engine,
            &mut radio,
            &mut clock,
            &mut diag,
            &limits,
            &stop,
            "t",
        )
        .unwrap();
        assert_eq!(stats.sent, 3);
        assert_eq!(stats.echoed, 3);
        assert_eq!(engine.cursor().get(), 7);
        let sends = diag
            .iter()
            .filter(|d| matches!(d, Diagnostic::Sending { .. }))
            .count();
        assert_eq!(sends, 3);
    }

    #[test]
    fn raised_stop_flag_ends_responder() {
        let mut engine = PingPongEngine::new(Role::Responder);
        let mut radio = Loopback::default();
        let mut clock = ManualClock::default();
        let mut diag: Vec<Diagnostic> = Vec::new();
        let limits = RunLimits {
            ticks: None,
            stats_interval: 0.0,
        };
        let stop = AtomicBool::new(true);
        let stats = run_loop(
            &mut engine,
            &mut radio,
            &mut clock,
            &mut diag,
            &limits,
            &stop,
            "t",
        )
        .unwrap();
        assert_eq!(stats.sent, 0);
        assert!(diag.is_empty());
    }
}
