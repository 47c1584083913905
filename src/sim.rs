//! Two nodes in one process sharing a simulated half-duplex air channel.
//!
//! Each [`SimRadio`] behaves like a radio with auto-retransmit: a frame sent
//! while the peer is transmitting (not listening) is lost and retried up to
//! the configured retry count, and `send` reports `false` once the budget is
//! spent. Drops and corruption can be injected deterministically.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::SimOpts;
use crate::clock::SystemClock;
use crate::diag::{DiagSink, Diagnostic, LogSink};
use crate::engine::PingPongEngine;
use crate::node::{RunLimits, run_loop};
use crate::radio::{FixedStrap, PipeAddr, RadioConfig, RadioError, Transceiver};
use crate::role::select_role;
use crate::stats::LinkStats;

#[derive(Debug)]
struct AirFrame {
    to: PipeAddr,
    payload: Vec<u8>,
    corrupt: bool,
}

/// Deterministic fault injection, counted per transmission attempt across
/// both directions.
#[derive(Debug, Default)]
pub struct FaultPlan {
    pub drop_every: Option<u32>,
    pub corrupt_every: Option<u32>,
    attempts: AtomicU32,
}

enum Fate {
    Deliver,
    Drop,
    Corrupt,
}

impl FaultPlan {
    pub fn new(drop_every: Option<u32>, corrupt_every: Option<u32>) -> Self {
        Self {
            drop_every: drop_every.filter(|n| *n > 0),
            corrupt_every: corrupt_every.filter(|n| *n > 0),
            attempts: AtomicU32::new(0),
        }
    }

    fn next(&self) -> Fate {
        let n = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if self.drop_every.is_some_and(|k| n % k == 0) {
            Fate::Drop
        } else if self.corrupt_every.is_some_and(|k| n % k == 0) {
            Fate::Corrupt
        } else {
            Fate::Deliver
        }
    }
}

pub struct SimRadio {
    name: &'static str,
    tx: Sender<AirFrame>,
    rx: Receiver<AirFrame>,
    listening: Arc<AtomicBool>,
    peer_listening: Arc<AtomicBool>,
    faults: Arc<FaultPlan>,
    latency: Duration,
    config: RadioConfig,
    writing: Option<PipeAddr>,
    reading: Option<PipeAddr>,
    // None marks a frame flagged corrupt by the receiver
    inbox: VecDeque<Option<Vec<u8>>>,
}

/// Builds two radios facing each other.
pub fn pair(faults: FaultPlan, latency: Duration) -> (SimRadio, SimRadio) {
    let (a_tx, b_rx) = channel();
    let (b_tx, a_rx) = channel();
    let a_listening = Arc::new(AtomicBool::new(false));
    let b_listening = Arc::new(AtomicBool::new(false));
    let faults = Arc::new(faults);
    let make = |name, tx, rx, listening, peer_listening| SimRadio {
        name,
        tx,
        rx,
        listening,
        peer_listening,
        faults: faults.clone(),
        latency,
        config: RadioConfig::default(),
        writing: None,
        reading: None,
        inbox: VecDeque::new(),
    };
    let a = make("a", a_tx, a_rx, a_listening.clone(), b_listening.clone());
    let b = make("b", b_tx, b_rx, b_listening, a_listening);
    (a, b)
}

impl SimRadio {
    fn retry_gap(&self) -> Duration {
        Duration::from_micros((self.config.retry_delay as u64 + 1) * 250)
    }
}

impl Transceiver for SimRadio {
    fn begin(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        self.config = *config;
        self.inbox.clear();
        Ok(())
    }

    fn open_pipes(&mut self, writing: PipeAddr, reading: PipeAddr) -> Result<(), RadioError> {
        self.writing = Some(writing);
        self.reading = Some(reading);
        Ok(())
    }

    fn set_transmit_mode(&mut self) -> Result<(), RadioError> {
        self.listening.store(false, Ordering::Release);
        Ok(())
    }

    fn set_receive_mode(&mut self) -> Result<(), RadioError> {
        self.listening.store(true, Ordering::Release);
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<bool, RadioError> {
        let Some(to) = self.writing else {
            return Ok(false);
        };
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                thread::sleep(self.retry_gap());
            }
            if !self.peer_listening.load(Ordering::Acquire) {
                continue;
            }
            let corrupt = match self.faults.next() {
                Fate::Drop => continue,
                Fate::Corrupt => true,
                Fate::Deliver => false,
            };
            self.tx
                .send(AirFrame {
                    to,
                    payload: payload.to_vec(),
                    corrupt,
                })
                .map_err(|_| RadioError::Disconnected)?;
            return Ok(true);
        }
        log::debug!("[sim:{}] retries exhausted for {} bytes", self.name, payload.len());
        Ok(false)
    }

    fn frame_available(&mut self) -> Result<bool, RadioError> {
        loop {
            match self.rx.try_recv() {
                Ok(f) if Some(f.to) != self.reading => {}
                Ok(f) if f.corrupt => self.inbox.push_back(None),
                Ok(f) => self.inbox.push_back(Some(f.payload)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) if self.inbox.is_empty() => {
                    return Err(RadioError::Disconnected);
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(!self.inbox.is_empty())
    }

    fn received_frame_len(&mut self) -> Result<usize, RadioError> {
        match self.inbox.front() {
            Some(Some(p)) => Ok(p.len()),
            Some(None) => {
                self.inbox.pop_front();
                Ok(0)
            }
            None => Ok(0),
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), RadioError> {
        if let Some(Some(p)) = self.inbox.pop_front() {
            let n = buf.len().min(p.len());
            buf[..n].copy_from_slice(&p[..n]);
        }
        Ok(())
    }

    fn details(&self) -> String {
        let pipe = |p: Option<PipeAddr>| p.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        format!(
            "STATUS sim={} DYNPD={} ARD={}us ARC={} TX_ADDR={} RX_ADDR_P1={} latency={}ms",
            self.name,
            if self.config.dynamic_payloads { "on" } else { "off" },
            self.retry_gap().as_micros(),
            self.config.retry_count,
            pipe(self.writing),
            pipe(self.reading),
            self.latency.as_millis(),
        )
    }
}

/// Result of a simulated session.
#[derive(Debug)]
pub struct SimReport {
    pub ping: LinkStats,
    pub pong: LinkStats,
}

/// Boots both nodes (strap high on "ping", low on "pong") and runs the
/// initiator for `opts.ticks` ticks while the responder echoes.
pub fn simulate(opts: &SimOpts) -> Result<SimReport> {
    let (mut ping_radio, mut pong_radio) = pair(
        FaultPlan::new(opts.drop_every, opts.corrupt_every),
        Duration::from_millis(opts.latency_ms),
    );
    let mut ping_diag = LogSink::new("ping");
    let mut pong_diag = LogSink::new("pong");

    let mut ping = boot(&mut ping_radio, true, &mut ping_diag)?;
    let mut pong = boot(&mut pong_radio, false, &mut pong_diag)?;

    let stop = AtomicBool::new(false);
    let ping_limits = RunLimits {
        ticks: Some(opts.ticks),
        stats_interval: opts.stats,
    };
    let pong_limits = RunLimits {
        ticks: None,
        stats_interval: opts.stats,
    };

    thread::scope(|s| {
        let responder = s.spawn(|| {
            run_loop(
                &mut pong,
                &mut pong_radio,
                &mut SystemClock::new(),
                &mut pong_diag,
                &pong_limits,
                &stop,
                "pong",
            )
        });
        let ping_stats = run_loop(
            &mut ping,
            &mut ping_radio,
            &mut SystemClock::new(),
            &mut ping_diag,
            &ping_limits,
            &stop,
            "ping",
        );
        stop.store(true, Ordering::Release);
        let pong_stats = responder
            .join()
            .map_err(|_| anyhow::anyhow!("responder thread panicked"))?;
        Ok(SimReport {
            ping: ping_stats.context("initiator")?,
            pong: pong_stats.context("responder")?,
        })
    })
}

fn boot(radio: &mut SimRadio, strap: bool, diag: &mut dyn DiagSink) -> Result<PingPongEngine> {
    diag.emit(Diagnostic::Preamble);
    let role = select_role(&mut FixedStrap(strap), diag)?;
    let engine = PingPongEngine::new(role);
    engine.setup(radio, &RadioConfig::default(), diag)?;
    Ok(engine)
}

pub fn run(opts: SimOpts) -> Result<()> {
    log::info!("[sim] {:?}", opts);
    let report = simulate(&opts)?;
    log::info!("{}", report.ping.summary("ping"));
    log::info!("{}", report.pong.summary("pong"));
    Ok(())
}
