use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial: {0}")]
    Serial(#[from] serialport::Error),
    #[error("peer disconnected")]
    Disconnected,
    #[error("frame of {0} bytes exceeds the payload limit")]
    FrameTooLong(usize),
}

/// Five byte pipe address, printed LSB first like the radio register dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeAddr(pub [u8; 5]);

impl fmt::Display for PipeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl PipeAddr {
    pub fn parse(hex: &str) -> Option<Self> {
        if hex.len() != 10 {
            return None;
        }
        let mut out = [0u8; 5];
        for (i, b) in out.iter_mut().enumerate() {
            *b = u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok()?;
        }
        Some(Self(out))
    }
}

/// The two fixed pipes. The initiator writes on `PIPES[0]` and listens on
/// `PIPES[1]`; the responder does the reverse.
pub const PIPES: [PipeAddr; 2] = [
    PipeAddr([0xE1, 0xF0, 0xF0, 0xF0, 0xF0]),
    PipeAddr([0xD2, 0xF0, 0xF0, 0xF0, 0xF0]),
];

/// Link-layer settings applied by `Transceiver::begin`.
#[derive(Debug, Clone, Copy)]
pub struct RadioConfig {
    pub dynamic_payloads: bool,
    /// Delay between retries in units of 250us.
    pub retry_delay: u8,
    pub retry_count: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            dynamic_payloads: true,
            retry_delay: 5,
            retry_count: 15,
        }
    }
}

/// Half-duplex packet transceiver. The engine is the only caller and always
/// brackets `send` with `set_transmit_mode` / `set_receive_mode`.
pub trait Transceiver {
    fn begin(&mut self, config: &RadioConfig) -> Result<(), RadioError>;
    fn open_pipes(&mut self, writing: PipeAddr, reading: PipeAddr) -> Result<(), RadioError>;
    fn set_transmit_mode(&mut self) -> Result<(), RadioError>;
    fn set_receive_mode(&mut self) -> Result<(), RadioError>;
    /// Blocks until delivery is confirmed (`true`) or the driver's retry
    /// budget is spent (`false`).
    fn send(&mut self, payload: &[u8]) -> Result<bool, RadioError>;
    fn frame_available(&mut self) -> Result<bool, RadioError>;
    /// Length of the queued frame. 0 means the frame was corrupt and has
    /// already been dropped.
    fn received_frame_len(&mut self) -> Result<usize, RadioError>;
    /// Copies exactly `buf.len()` bytes of the queued frame and pops it.
    fn receive(&mut self, buf: &mut [u8]) -> Result<(), RadioError>;
    fn details(&self) -> String;
}

/// Boot-time role strap.
pub trait RoleStrap {
    fn read(&mut self) -> Result<bool, RadioError>;
}

/// Strap with a fixed level, used when the role is forced on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedStrap(pub bool);

impl RoleStrap for FixedStrap {
    fn read(&mut self) -> Result<bool, RadioError> {
        Ok(self.0)
    }
}
