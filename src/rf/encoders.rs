// Barksense — Collar Protocol Encoders
//
// Pure bit-exact waveform builders for the three supported receiver
// families. The timings are wire-format requirements: the receivers are
// COTS devices and tolerate almost no deviation.

use crate::rf::pulse::{PulseTrain, PulseTrainBuilder};
use crate::rf::{CommandKind, ShockerModel};

/// Remote channel used for CaiXianlin frames (CH1..CH3 map to 0..2).
const CAIXIANLIN_CHANNEL: u8 = 0;

/// Remote channel used for Petrainer frames (1..=3).
const PETRAINER_CHANNEL: u8 = 1;

/// Encode one command into the model's pulse train.
pub fn sequence(model: ShockerModel, shocker_id: u16, kind: CommandKind, intensity: u8) -> PulseTrain {
    match model {
        ShockerModel::CaiXianlin => caixianlin(shocker_id, CAIXIANLIN_CHANNEL, kind, intensity),
        ShockerModel::Petrainer => petrainer(shocker_id, PETRAINER_CHANNEL, kind, intensity),
        ShockerModel::Petrainer998Dr => petrainer998dr(shocker_id as u8, kind, intensity),
    }
}

/// The post-expiry termination waveform: the same framing at intensity
/// zero with the stop function (a vibration on every supported model).
pub fn zero_sequence(model: ShockerModel, shocker_id: u16) -> PulseTrain {
    sequence(model, shocker_id, CommandKind::Vibrate, 0)
}

/// CaiXianlin / CH8803. 40-bit payload:
///
///   | id:16 | channel:4 | func:4 | strength:8 | checksum:8 |
///
/// Functions are 1 = shock, 2 = vibrate, 3 = sound (strength always zero
/// for sound). The checksum is the unsigned byte-wise sum of the preceding
/// fields, truncated to 8 bits.
pub fn caixianlin(id: u16, channel: u8, kind: CommandKind, intensity: u8) -> PulseTrain {
    let (func, strength) = match kind {
        CommandKind::Shock => (1u8, intensity.min(99)),
        CommandKind::Vibrate | CommandKind::Stop => (2, intensity.min(99)),
        CommandKind::Sound => (3, 0),
    };

    let checksum = ((id >> 8) as u8)
        .wrapping_add(id as u8)
        .wrapping_add(channel)
        .wrapping_add(func)
        .wrapping_add(strength);

    const PULSE_LEN: u16 = 1016;
    const ZERO_LEN: u16 = 292;
    const ONE_LEN: u16 = 804;

    // 3 preamble slots, 2 per data bit, 2 trailing zero bits, 2 tail slots.
    let mut b = PulseTrainBuilder::with_capacity(3 + 2 * 40 + 2 * 2 + 2);

    // Sync preamble
    b.push(840);
    b.push(1440);
    b.push(PULSE_LEN - ZERO_LEN);

    b.push_bits(id as u32, 16, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(channel as u32, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(func as u32, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(strength as u32, 8, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(checksum as u32, 8, ZERO_LEN, ONE_LEN, PULSE_LEN);

    // Trail: two zero bits, then a short rise and a long low tail.
    b.push_bits(0, 2, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push(ZERO_LEN);
    b.push(1476);

    b.finish()
}

/// Petrainer / PaiPaitek. 40-bit payload:
///
///   | channel:4 | func:4 | id:16 | strength:8 | funcChk:4 | chanChk:4 |
///
/// The channel nibble is a lookup (CH1 = 0b1000, CH2 = 0b1111,
/// CH3 = 0b1010) with matching channel checksums 14 / 0 / 5; the function
/// checksum is 7 for shock, 11 for vibrate, 13 for sound.
pub fn petrainer(id: u16, channel: u8, kind: CommandKind, intensity: u8) -> PulseTrain {
    let (func, func_sum, strength) = match kind {
        CommandKind::Shock => (1u8, 7u8, intensity.min(100)),
        CommandKind::Vibrate => (2, 11, intensity.min(100)),
        CommandKind::Stop => (2, 11, 0),
        CommandKind::Sound => (4, 13, 0),
    };

    const PULSE_LEN: u16 = 1000;
    const ZERO_LEN: u16 = 250;
    const ONE_LEN: u16 = 750;

    let mut b = PulseTrainBuilder::with_capacity(3 + 2 * 40 + 2);

    // Sync preamble
    b.push(4000);
    b.push(1440);
    b.push(980);

    let chan_sum = match channel {
        1 => {
            b.push_bits(0b1000, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);
            14
        }
        2 => {
            b.push_bits(0b1111, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);
            0
        }
        3 => {
            b.push_bits(0b1010, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);
            5
        }
        // Unknown channels emit no channel nibble, like the remotes do.
        _ => 0,
    };

    b.push_bits(func as u32, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(id as u32, 16, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(strength as u32, 8, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(func_sum as u32, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);
    b.push_bits(chan_sum, 4, ZERO_LEN, ONE_LEN, PULSE_LEN);

    // Trail
    b.push(ZERO_LEN);
    b.push(1476);

    b.finish()
}

/// Petrainer 998DR / DogTronic. A slow constant-width pulse stream where
/// the gap before each pulse encodes the bit (short gap = 0, long gap = 1).
/// 16-bit payload:
///
///   | id:6 | strength:4 (LSB first) | const 0b10 | checksum:4 |
///
/// The checksum nibble is `(0b0100 + strength) mod 16` with the 4-bit
/// carry fed back in from the LSB side, then emitted with its bits swapped
/// pairwise (c2 c3 c0 c1). Strength is only meaningful for shock; the
/// vibration and sound collar variants run the same function.
///
/// Known receiver limitation: only IDs 14, 23, 44 and 53 are accepted by
/// the collars observed so far. Other IDs encode fine but are ignored on
/// the receiving end.
pub fn petrainer998dr(id: u8, kind: CommandKind, intensity: u8) -> PulseTrain {
    let strength = match kind {
        CommandKind::Shock => intensity.min(15),
        _ => 0,
    };

    const PULSE_LEN: u16 = 2212;
    const ONE_GAP: u16 = 8144;
    const ZERO_GAP: u16 = 4012;
    const END_GAP: u16 = 64000;

    const CHECKSUM_BASE: u8 = 0b0100;
    const UNKNOWN_CONST: u16 = 0b10;

    // 32 preamble slots, 2 per data bit, 1 end gap.
    let mut b = PulseTrainBuilder::with_capacity(32 + 2 * 16 + 1);

    // Sync preamble: a burst of short pulses, then one stretched pulse.
    b.push(240);
    b.push(1700);
    for _ in 0..14 {
        b.push(240);
        b.push(776);
    }
    b.push(388);
    b.push(PULSE_LEN);

    let mut command: u16 = (id as u16 & 0x3F) << 10;

    // Strength goes out LSB first into bits 9..=6.
    for bit in 0..4 {
        if strength & (1 << bit) != 0 {
            command |= 1 << (9 - bit);
        }
    }

    command |= UNKNOWN_CONST << 4;

    // 4-bit sum with the carry-out wired back to the carry-in.
    let mut checksum = (CHECKSUM_BASE + strength) % 16;
    checksum += (CHECKSUM_BASE + strength) >> 4;

    // Checksum bits land pairwise swapped: c2 c3 c0 c1.
    for (bit, out) in [(0u8, 1u16), (1, 0), (2, 3), (3, 2)] {
        if checksum & (1 << bit) != 0 {
            command |= 1 << out;
        }
    }

    // Each bit is its gap followed by the fixed-width pulse.
    for k in (0..16).rev() {
        let gap = if (command >> k) & 1 == 1 { ONE_GAP } else { ZERO_GAP };
        b.push(gap);
        b.push(PULSE_LEN);
    }

    b.push(END_GAP);

    b.finish()
}
