use crate::clock::Clock;
use crate::cursor::{MAX_PAYLOAD_SIZE, PayloadSizeCursor};
use crate::diag::{DiagSink, Diagnostic};
use crate::radio::{RadioConfig, RadioError, Transceiver};
use crate::role::Role;

/// The initiator sends the first `cursor` bytes of this.
pub const OUTBOUND_TEMPLATE: &[u8; MAX_PAYLOAD_SIZE] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ789012";
pub const RESPONSE_TIMEOUT_MS: u64 = 500;
pub const INTER_CYCLE_DELAY_MS: u64 = 100;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Initiator got an echo of `len` bytes for a `sent` byte frame.
    Echoed {
        sent: usize,
        len: usize,
        confirmed: bool,
    },
    TimedOut { sent: usize, confirmed: bool },
    /// Initiator saw a frame but the driver flagged it corrupt.
    Corrupt { sent: usize, confirmed: bool },
    /// Responder drained its queue.
    Responded {
        echoed: u64,
        discarded: u64,
        unconfirmed: u64,
        bytes: u64,
    },
}

#[derive(Debug)]
pub struct PingPongEngine {
    role: Role,
    cursor: PayloadSizeCursor,
    // one spare byte for the terminator
    rx: [u8; MAX_PAYLOAD_SIZE + 1],
    rx_len: usize,
}

impl PingPongEngine {
    pub fn new(role: Role) -> Self {
        Self::with_cursor(role, PayloadSizeCursor::default())
    }

    pub fn with_cursor(role: Role, cursor: PayloadSizeCursor) -> Self {
        Self {
            role,
            cursor,
            rx: [0; MAX_PAYLOAD_SIZE + 1],
            rx_len: 0,
        }
    }

    #[cfg(test)]
    pub fn cursor(&self) -> PayloadSizeCursor {
        self.cursor
    }

    /// Payload of the most recently accepted frame.
    #[cfg(test)]
    pub fn last_received(&self) -> &[u8] {
        &self.rx[..self.rx_len]
    }

    /// Configures the radio for this role and leaves it listening.
    pub fn setup(
        &self,
        radio: &mut dyn Transceiver,
        config: &RadioConfig,
        diag: &mut dyn DiagSink,
    ) -> Result<(), RadioError> {
        radio.begin(config)?;
        let (writing, reading) = self.role.pipes();
        radio.open_pipes(writing, reading)?;
        radio.set_receive_mode()?;
        diag.emit(Diagnostic::Details(radio.details()));
        Ok(())
    }

    pub fn tick(
        &mut self,
        radio: &mut dyn Transceiver,
        clock: &mut dyn Clock,
        diag: &mut dyn DiagSink,
    ) -> Result<TickOutcome, RadioError> {
        match self.role {
            Role::Initiator => self.ping_out(radio, clock, diag),
            Role::Responder => self.pong_back(radio, diag),
        }
    }

    fn ping_out(
        &mut self,
        radio: &mut dyn Transceiver,
        clock: &mut dyn Clock,
        diag: &mut dyn DiagSink,
    ) -> Result<TickOutcome, RadioError> {
        let sent = self.cursor.get();

        radio.set_transmit_mode()?;
        diag.emit(Diagnostic::Sending { len: sent });
        let confirmed = radio.send(&OUTBOUND_TEMPLATE[..sent])?;
        if !confirmed {
            diag.emit(Diagnostic::SendNotConfirmed { len: sent });
        }
        radio.set_receive_mode()?;

        let outcome = if !wait_for_frame(radio, clock)? {
            diag.emit(Diagnostic::TimedOut);
            TickOutcome::TimedOut { sent, confirmed }
        } else {
            match self.take_frame(radio)? {
                None => TickOutcome::Corrupt { sent, confirmed },
                Some(len) => {
                    diag.emit(Diagnostic::GotResponse {
                        len,
                        first: self.rx[0],
                    });
                    TickOutcome::Echoed {
                        sent,
                        len,
                        confirmed,
                    }
                }
            }
        };

        self.cursor.advance();
        clock.delay_ms(INTER_CYCLE_DELAY_MS);
        Ok(outcome)
    }

    fn pong_back(
        &mut self,
        radio: &mut dyn Transceiver,
        diag: &mut dyn DiagSink,
    ) -> Result<TickOutcome, RadioError> {
        let (mut echoed, mut discarded, mut unconfirmed, mut bytes) = (0, 0, 0, 0);

        while radio.frame_available()? {
            let Some(len) = self.take_frame(radio)? else {
                discarded += 1;
                continue;
            };
            diag.emit(Diagnostic::GotPayload {
                len,
                text: String::from_utf8_lossy(&self.rx[..len]).into_owned(),
            });

            radio.set_transmit_mode()?;
            if !radio.send(&self.rx[..len])? {
                diag.emit(Diagnostic::SendNotConfirmed { len });
                unconfirmed += 1;
            }
            diag.emit(Diagnostic::SentResponse);
            radio.set_receive_mode()?;

            echoed += 1;
            bytes += len as u64;
        }

        Ok(TickOutcome::Responded {
            echoed,
            discarded,
            unconfirmed,
            bytes,
        })
    }

    /// Copies the queued frame into the receive buffer. `None` for a corrupt
    /// frame, which the driver has already dropped.
    fn take_frame(&mut self, radio: &mut dyn Transceiver) -> Result<Option<usize>, RadioError> {
        let len = radio.received_frame_len()?;
        if len == 0 {
            return Ok(None);
        }
        if len > MAX_PAYLOAD_SIZE {
            return Err(RadioError::FrameTooLong(len));
        }
        radio.receive(&mut self.rx[..len])?;
        self.rx[len] = 0;
        self.rx_len = len;
        Ok(Some(len))
    }
}

/// Polls until a frame shows up or the response window closes. The deadline
/// is re-checked on every pass.
fn wait_for_frame(radio: &mut dyn Transceiver, clock: &mut dyn Clock) -> Result<bool, RadioError> {
    let started = clock.millis();
    loop {
        if radio.frame_available()? {
            return Ok(true);
        }
        if clock.millis().saturating_sub(started) > RESPONSE_TIMEOUT_MS {
            return Ok(false);
        }
        clock.relax();
    }
}
