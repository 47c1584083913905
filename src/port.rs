use anyhow::Result;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use crate::cli::SerialOpts;
use crate::frame::{build_frame, parse_frame};
use crate::radio::{PipeAddr, RadioConfig, RadioError, RoleStrap, Transceiver};

// longest legal frame line is well under this
const MAX_LINE: usize = 160;

pub fn open_port(opts: &SerialOpts) -> Result<Box<dyn SerialPort>> {
    // RTS is driven by hand as the line driver enable, so no hardware flow control.
    let builder = serialport::new(&opts.dev, opts.baud)
        .timeout(Duration::from_millis(10))
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None);

    builder
        .open()
        .map_err(|e| anyhow::anyhow!("open {}: {}", opts.dev, e))
}

/// Half-duplex serial link standing in for the radio. RTS high enables the
/// line driver (transmit mode), CTS is the role strap.
pub struct SerialRadio {
    port: Box<dyn SerialPort>,
    dev: String,
    config: RadioConfig,
    writing: Option<PipeAddr>,
    reading: Option<PipeAddr>,
    transmitting: bool,
    line: Vec<u8>,
    // set while skipping the rest of an overlong line
    discarding: bool,
    // None marks a frame that failed to decode
    queue: VecDeque<Option<Vec<u8>>>,
}

impl SerialRadio {
    pub fn new(port: Box<dyn SerialPort>, dev: &str) -> Self {
        Self {
            port,
            dev: dev.to_string(),
            config: RadioConfig::default(),
            writing: None,
            reading: None,
            transmitting: false,
            line: Vec::with_capacity(MAX_LINE),
            discarding: false,
            queue: VecDeque::new(),
        }
    }

    /// Drains whatever the port has buffered into complete frames.
    fn pump(&mut self) -> Result<(), RadioError> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(());
        }
        let mut buf = vec![0u8; pending];
        let n = match self.port.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(e.into()),
        };
        for &b in &buf[..n] {
            match b {
                b'\n' if self.discarding => self.discarding = false,
                b'\n' => {
                    let line = std::mem::take(&mut self.line);
                    self.accept_line(&line);
                }
                _ if self.discarding => {}
                b'\r' => {}
                _ if self.line.len() >= MAX_LINE => {
                    log::debug!("[serial] overlong line dropped");
                    self.line.clear();
                    self.discarding = true;
                    self.queue.push_back(None);
                }
                _ => self.line.push(b),
            }
        }
        Ok(())
    }

    fn accept_line(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match parse_frame(text) {
            Ok(f) if Some(f.to) == self.reading => self.queue.push_back(Some(f.payload)),
            Ok(f) => log::debug!("[serial] ignoring frame for pipe {}", f.to),
            Err(e) => {
                log::debug!("[serial] corrupt frame: {} line=\"{}\"", e, text);
                self.queue.push_back(None);
            }
        }
    }
}

impl Transceiver for SerialRadio {
    fn begin(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        self.config = *config;
        self.port.clear(ClearBuffer::All)?;
        self.line.clear();
        self.discarding = false;
        self.queue.clear();
        Ok(())
    }

    fn open_pipes(&mut self, writing: PipeAddr, reading: PipeAddr) -> Result<(), RadioError> {
        self.writing = Some(writing);
        self.reading = Some(reading);
        Ok(())
    }

    fn set_transmit_mode(&mut self) -> Result<(), RadioError> {
        self.port.write_request_to_send(true)?;
        self.transmitting = true;
        Ok(())
    }

    fn set_receive_mode(&mut self) -> Result<(), RadioError> {
        self.port.flush()?;
        self.port.write_request_to_send(false)?;
        self.transmitting = false;
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<bool, RadioError> {
        let Some(to) = self.writing else {
            log::warn!("[serial] send before pipes were opened");
            return Ok(false);
        };
        let mut out = build_frame(to, payload).into_bytes();
        out.extend_from_slice(b"\r\n");
        self.port.write_all(&out)?;
        self.port.flush()?;
        // no link-layer ack on a plain serial line; a completed write is delivery
        Ok(true)
    }

    fn frame_available(&mut self) -> Result<bool, RadioError> {
        if !self.transmitting {
            self.pump()?;
        }
        Ok(!self.queue.is_empty())
    }

    fn received_frame_len(&mut self) -> Result<usize, RadioError> {
        match self.queue.front() {
            Some(Some(p)) => Ok(p.len()),
            Some(None) => {
                self.queue.pop_front();
                Ok(0)
            }
            None => Ok(0),
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), RadioError> {
        if let Some(Some(p)) = self.queue.pop_front() {
            let n = buf.len().min(p.len());
            buf[..n].copy_from_slice(&p[..n]);
        }
        Ok(())
    }

    fn details(&self) -> String {
        let pipe = |p: Option<PipeAddr>| p.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        format!(
            "STATUS dev={} baud={} DYNPD={} ARD={}us ARC={} TX_ADDR={} RX_ADDR_P1={} mode={}",
            self.dev,
            self.port.baud_rate().unwrap_or(0),
            if self.config.dynamic_payloads { "on" } else { "off" },
            (self.config.retry_delay as u32 + 1) * 250,
            self.config.retry_count,
            pipe(self.writing),
            pipe(self.reading),
            if self.transmitting { "TX" } else { "RX" },
        )
    }
}

impl RoleStrap for SerialRadio {
    fn read(&mut self) -> Result<bool, RadioError> {
        Ok(self.port.read_clear_to_send()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::PIPES;
    use serialport::TTYPort;
    use std::time::Instant;

    /// Radio on the pty master listening as the responder; the slave end
    /// plays the far side of the line.
    fn pty_radio() -> (SerialRadio, TTYPort) {
        let (master, slave) = TTYPort::pair().expect("pty pair");
        let mut radio = SerialRadio::new(Box::new(master), "pty");
        radio.open_pipes(PIPES[1], PIPES[0]).unwrap();
        (radio, slave)
    }

    /// Reads queued frames until `want` lengths were seen or a second passed.
    fn drain_lengths(radio: &mut SerialRadio, want: usize) -> Vec<usize> {
        let start = Instant::now();
        let mut lens = Vec::new();
        while lens.len() < want && start.elapsed() < Duration::from_secs(1) {
            while radio.frame_available().unwrap() {
                let len = radio.received_frame_len().unwrap();
                if len > 0 {
                    let mut buf = vec![0u8; len];
                    radio.receive(&mut buf).unwrap();
                }
                lens.push(len);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        lens
    }

    #[test]
    fn mixed_input_filters_pipe_and_flags_corrupt() {
        let (mut radio, mut far) = pty_radio();
        let mut input = build_frame(PIPES[1], b"else");
        input.push_str("\r\n@@ TO=E1F0F0F0F0 LEN=4 PAY=41424344 SUM=0B ##\r\n");
        input.push_str(&build_frame(PIPES[0], b"ABCD"));
        input.push_str("\r\n");
        far.write_all(input.as_bytes()).unwrap();

        assert_eq!(drain_lengths(&mut radio, 2), vec![0, 4]);
    }

    #[test]
    fn payload_survives_split_writes() {
        let (mut radio, mut far) = pty_radio();
        let line = format!("{}\r\n", build_frame(PIPES[0], b"hello radio"));
        let (head, tail) = line.split_at(9);
        far.write_all(head.as_bytes()).unwrap();
        far.flush().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(!radio.frame_available().unwrap());
        far.write_all(tail.as_bytes()).unwrap();

        let start = Instant::now();
        while !radio.frame_available().unwrap() && start.elapsed() < Duration::from_secs(1) {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(radio.received_frame_len().unwrap(), 11);
        let mut buf = [0u8; 11];
        radio.receive(&mut buf).unwrap();
        assert_eq!(&buf, b"hello radio");
    }

    #[test]
    fn overlong_line_counts_as_one_corrupt_frame() {
        let (mut radio, mut far) = pty_radio();
        let mut input = "Z".repeat(400);
        input.push_str("\r\n");
        input.push_str(&build_frame(PIPES[0], b"WXYZ"));
        input.push_str("\r\n");
        far.write_all(input.as_bytes()).unwrap();

        assert_eq!(drain_lengths(&mut radio, 2), vec![0, 4]);
    }

    #[test]
    fn send_writes_one_framed_line_to_the_writing_pipe() {
        let (mut radio, mut far) = pty_radio();
        far.set_timeout(Duration::from_millis(100)).unwrap();
        assert!(radio.send(b"ABCD").unwrap());

        let start = Instant::now();
        let mut got = Vec::new();
        let mut buf = [0u8; 64];
        while !got.ends_with(b"\n") && start.elapsed() < Duration::from_secs(1) {
            if let Ok(n) = far.read(&mut buf) {
                got.extend_from_slice(&buf[..n]);
            }
        }
        let text = String::from_utf8(got).unwrap();
        assert_eq!(text, format!("{}\r\n", build_frame(PIPES[1], b"ABCD")));
    }

    #[test]
    fn send_without_pipes_is_not_delivered() {
        let (master, _far) = TTYPort::pair().expect("pty pair");
        let mut radio = SerialRadio::new(Box::new(master), "pty");
        assert!(!radio.send(b"ABCD").unwrap());
    }
}
