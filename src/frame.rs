use std::fmt::Write;

use thiserror::Error;

use crate::cursor::MAX_PAYLOAD_SIZE;
use crate::radio::PipeAddr;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("missing field {0}")]
    Missing(&'static str),
    #[error("bad value for {0}")]
    BadValue(&'static str),
    #[error("odd hex length")]
    OddHex,
    #[error("len mismatch: LEN={declared} but {actual} bytes")]
    LenMismatch { declared: usize, actual: usize },
    #[error("length {0} outside 1..={max}", max = MAX_PAYLOAD_SIZE)]
    BadLength(usize),
    #[error("checksum {calc:02X}!={sent:02X}")]
    Checksum { calc: u8, sent: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub to: PipeAddr,
    pub payload: Vec<u8>,
}

pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, FrameError> {
    if hex.len() % 2 != 0 {
        return Err(FrameError::OddHex);
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or(FrameError::BadValue("PAY"))
        })
        .collect()
}

/// `@@ TO=<pipe> LEN=<n> PAY=<hex> SUM=<hex8> ##`, without line ending.
pub fn build_frame(to: PipeAddr, payload: &[u8]) -> String {
    let mut s = String::with_capacity(2 * payload.len());
    for b in payload {
        let _ = write!(s, "{:02X}", b);
    }
    format!(
        "@@ TO={} LEN={} PAY={} SUM={:02X} ##",
        to,
        payload.len(),
        s,
        checksum(payload)
    )
}

pub fn parse_frame(line: &str) -> Result<WireFrame, FrameError> {
    // tolerate leading/trailing markers and flexible order
    let mut to = None;
    let mut len = None;
    let mut pay = None;
    let mut sum = None;
    for tok in line.split_whitespace() {
        if let Some(v) = tok.strip_prefix("TO=") {
            to = Some(PipeAddr::parse(v).ok_or(FrameError::BadValue("TO"))?);
        } else if let Some(v) = tok.strip_prefix("LEN=") {
            len = Some(v.parse::<usize>().map_err(|_| FrameError::BadValue("LEN"))?);
        } else if let Some(v) = tok.strip_prefix("PAY=") {
            pay = Some(decode_hex(v)?);
        } else if let Some(v) = tok.strip_prefix("SUM=") {
            sum = Some(u8::from_str_radix(v, 16).map_err(|_| FrameError::BadValue("SUM"))?);
        }
    }
    let to = to.ok_or(FrameError::Missing("TO"))?;
    let len = len.ok_or(FrameError::Missing("LEN"))?;
    let payload = pay.ok_or(FrameError::Missing("PAY"))?;
    let sent = sum.ok_or(FrameError::Missing("SUM"))?;

    if payload.len() != len {
        return Err(FrameError::LenMismatch {
            declared: len,
            actual: payload.len(),
        });
    }
    if len == 0 || len > MAX_PAYLOAD_SIZE {
        return Err(FrameError::BadLength(len));
    }
    let calc = checksum(&payload);
    if calc != sent {
        return Err(FrameError::Checksum { calc, sent });
    }
    Ok(WireFrame { to, payload })
}
