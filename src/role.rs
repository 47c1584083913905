use std::fmt;

use crate::diag::{DiagSink, Diagnostic};
use crate::radio::{PIPES, PipeAddr, RadioError, RoleStrap};

/// Delay between powering the strap pull-up and sampling it.
pub const STRAP_SETTLE_MS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// "ping out": sends first and waits for the echo.
    Initiator,
    /// "pong back": echoes every valid frame.
    Responder,
}

impl Role {
    pub fn from_strap(high: bool) -> Self {
        if high { Role::Initiator } else { Role::Responder }
    }

    pub fn friendly_name(self) -> &'static str {
        match self {
            Role::Initiator => "Ping out",
            Role::Responder => "Pong back",
        }
    }

    /// (writing pipe, reading pipe) for this role.
    pub fn pipes(self) -> (PipeAddr, PipeAddr) {
        match self {
            Role::Initiator => (PIPES[0], PIPES[1]),
            Role::Responder => (PIPES[1], PIPES[0]),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.friendly_name())
    }
}

/// Samples the strap once and reports the resulting role. The caller is
/// responsible for the settle delay.
pub fn select_role(strap: &mut dyn RoleStrap, diag: &mut dyn DiagSink) -> Result<Role, RadioError> {
    let role = Role::from_strap(strap.read()?);
    diag.emit(Diagnostic::Role(role));
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::FixedStrap;

    #[test]
    fn high_is_initiator_low_is_responder() {
        let mut log: Vec<Diagnostic> = Vec::new();
        let r = select_role(&mut FixedStrap(true), &mut log).unwrap();
        assert_eq!(r, Role::Initiator);
        let r = select_role(&mut FixedStrap(false), &mut log).unwrap();
        assert_eq!(r, Role::Responder);
        assert_eq!(
            log,
            vec![
                Diagnostic::Role(Role::Initiator),
                Diagnostic::Role(Role::Responder)
            ]
        );
    }

    #[test]
    fn pipes_are_mirrored() {
        let (iw, ir) = Role::Initiator.pipes();
        let (rw, rr) = Role::Responder.pipes();
        assert_eq!(iw, rr);
        assert_eq!(ir, rw);
    }
}
