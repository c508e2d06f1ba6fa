// Barksense — RF Pulse Trains

/// An ordered list of pulse durations in microseconds, emitted on the RF
/// pin with strictly alternating levels. The line starts low, so timings at
/// even indices are low periods and odd indices are high periods; every
/// encoder produces an odd number of entries so the train also ends low.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PulseTrain {
    timings: Vec<u16>,
}

impl PulseTrain {
    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    /// Raw timing list in microseconds.
    pub fn timings(&self) -> &[u16] {
        &self.timings
    }

    /// Iterate `(is_high, duration_us)` pairs in emission order.
    pub fn levels(&self) -> impl Iterator<Item = (bool, u16)> + '_ {
        self.timings
            .iter()
            .enumerate()
            .map(|(i, &d)| (i % 2 == 1, d))
    }

    /// Wall-clock airtime of one emission of this train.
    pub fn total_duration_us(&self) -> u64 {
        self.timings.iter().map(|&d| d as u64).sum()
    }

    pub fn clear(&mut self) {
        self.timings.clear();
    }
}

/// Builder used by the protocol encoders.
pub struct PulseTrainBuilder {
    timings: Vec<u16>,
}

impl PulseTrainBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timings: Vec::with_capacity(capacity),
        }
    }

    /// Append one timing slot; the level is implied by the slot index.
    pub fn push(&mut self, duration_us: u16) {
        self.timings.push(duration_us);
    }

    /// Translate the low `bits` of `value`, MSB first, into fixed-period
    /// pulses: each bit rises for `zero_len` or `one_len` and falls for the
    /// remainder of `pulse_len`.
    pub fn push_bits(&mut self, value: u32, bits: u8, zero_len: u16, one_len: u16, pulse_len: u16) {
        for k in (0..bits).rev() {
            let bit_len = if (value >> k) & 1 == 1 { one_len } else { zero_len };
            self.timings.push(bit_len);
            self.timings.push(pulse_len - bit_len);
        }
    }

    pub fn finish(self) -> PulseTrain {
        PulseTrain {
            timings: self.timings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_alternate_starting_low() {
        let mut b = PulseTrainBuilder::with_capacity(3);
        b.push(100);
        b.push(200);
        b.push(300);
        let train = b.finish();

        let levels: Vec<_> = train.levels().collect();
        assert_eq!(levels, vec![(false, 100), (true, 200), (false, 300)]);
        assert_eq!(train.total_duration_us(), 600);
    }

    #[test]
    fn push_bits_msb_first() {
        let mut b = PulseTrainBuilder::with_capacity(8);
        // 0b10 → one then zero
        b.push_bits(0b10, 2, 250, 750, 1000);
        let t = b.finish();
        assert_eq!(t.timings(), &[750, 250, 250, 750]);
    }
}
