use std::fmt;

use crate::role::Role;

/// One line of the human readable diagnostic stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Preamble,
    Role(Role),
    Details(String),
    Sending { len: usize },
    SendNotConfirmed { len: usize },
    TimedOut,
    /// Initiator side: only the first byte is shown.
    GotResponse { len: usize, first: u8 },
    /// Responder side: the whole payload as text.
    GotPayload { len: usize, text: String },
    SentResponse,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Preamble => write!(f, "pingpair-dyn/{}", env!("CARGO_PKG_VERSION")),
            Diagnostic::Role(role) => write!(f, "ROLE: {}", role),
            Diagnostic::Details(d) => write!(f, "{}", d),
            Diagnostic::Sending { len } => write!(f, "Now sending length {}", len),
            Diagnostic::SendNotConfirmed { len } => {
                write!(f, "Send of length {} not confirmed by link", len)
            }
            Diagnostic::TimedOut => write!(f, "Failed, response timed out."),
            Diagnostic::GotResponse { len, first } => {
                write!(f, "Got response size={} value={}", len, first)
            }
            Diagnostic::GotPayload { len, text } => {
                write!(f, "Got payload size={} value={}", len, text)
            }
            Diagnostic::SentResponse => write!(f, "Sent response."),
        }
    }
}

pub trait DiagSink {
    fn emit(&mut self, diag: Diagnostic);
}

/// Forwards every diagnostic to the `log` facade, tagged with the node name.
#[derive(Debug, Clone)]
pub struct LogSink {
    tag: String,
}

impl LogSink {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl DiagSink for LogSink {
    fn emit(&mut self, diag: Diagnostic) {
        match diag {
            Diagnostic::TimedOut | Diagnostic::SendNotConfirmed { .. } => {
                log::warn!("[{}] {}", self.tag, diag)
            }
            _ => log::info!("[{}] {}", self.tag, diag),
        }
    }
}

#[cfg(test)]
impl DiagSink for Vec<Diagnostic> {
    fn emit(&mut self, diag: Diagnostic) {
        self.push(diag);
    }
}
