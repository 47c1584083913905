pub const MIN_PAYLOAD_SIZE: usize = 4;
pub const MAX_PAYLOAD_SIZE: usize = 32;
pub const PAYLOAD_SIZE_STEP: usize = 1;

/// Outgoing payload length for the initiator. Always within
/// `[MIN_PAYLOAD_SIZE, MAX_PAYLOAD_SIZE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSizeCursor(usize);

impl Default for PayloadSizeCursor {
    fn default() -> Self {
        Self(MIN_PAYLOAD_SIZE)
    }
}

impl PayloadSizeCursor {
    /// Values outside the range are clamped.
    #[cfg(test)]
    pub fn starting_at(size: usize) -> Self {
        Self(size.clamp(MIN_PAYLOAD_SIZE, MAX_PAYLOAD_SIZE))
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn advance(&mut self) {
        let next = self.0 + PAYLOAD_SIZE_STEP;
        self.0 = if next > MAX_PAYLOAD_SIZE {
            MIN_PAYLOAD_SIZE
        } else {
            next
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SPAN: usize = MAX_PAYLOAD_SIZE - MIN_PAYLOAD_SIZE + 1;

    #[test]
    fn wraps_from_max_to_min() {
        let mut c = PayloadSizeCursor::starting_at(MAX_PAYLOAD_SIZE);
        c.advance();
        assert_eq!(c.get(), MIN_PAYLOAD_SIZE);
    }

    #[test]
    fn full_lap_returns_to_start() {
        let mut c = PayloadSizeCursor::default();
        for _ in 0..29 {
            c.advance();
        }
        assert_eq!(c.get(), 4);
    }

    #[test]
    fn starting_at_clamps() {
        assert_eq!(PayloadSizeCursor::starting_at(0).get(), MIN_PAYLOAD_SIZE);
        assert_eq!(PayloadSizeCursor::starting_at(99).get(), MAX_PAYLOAD_SIZE);
    }

    proptest! {
        #[test]
        fn progression_matches_closed_form(offset in 0usize..SPAN, ticks in 0usize..500) {
            let mut c = PayloadSizeCursor::starting_at(MIN_PAYLOAD_SIZE + offset);
            for _ in 0..ticks {
                c.advance();
                prop_assert!((MIN_PAYLOAD_SIZE..=MAX_PAYLOAD_SIZE).contains(&c.get()));
            }
            let expected = MIN_PAYLOAD_SIZE + (offset + ticks * PAYLOAD_SIZE_STEP) % SPAN;
            prop_assert_eq!(c.get(), expected);
        }
    }
}
