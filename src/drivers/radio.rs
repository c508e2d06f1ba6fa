// Barksense — RF Radio Driver
//
// The transmit worker drives the radio through the `RadioDevice` trait; on
// hardware this is the ESP32 RMT peripheral programmed for 1 µs ticks.

use crate::rf::pulse::PulseTrain;

/// Blocking pulse-train output. The implementation owns the output pin for
/// its lifetime; `transmit` returns only after the full train is on air.
pub trait RadioDevice: Send {
    fn transmit(&mut self, train: &PulseTrain) -> anyhow::Result<()>;
}

/// Whether `pin` can drive the RF stage. Excludes the input-only GPIOs
/// (34-39), the SPI flash pins (6-11) and numbers that do not exist on the
/// ESP32.
pub fn is_valid_output_pin(pin: u8) -> bool {
    matches!(pin, 0..=5 | 12..=19 | 21..=23 | 25..=27 | 32..=33)
}

#[cfg(feature = "esp32")]
pub use esp32::RmtRadio;

#[cfg(feature = "esp32")]
mod esp32 {
    use super::RadioDevice;
    use crate::rf::pulse::PulseTrain;

    use esp_idf_hal::gpio::AnyOutputPin;
    use esp_idf_hal::rmt::config::TransmitConfig;
    use esp_idf_hal::rmt::{PinState, Pulse, PulseTicks, TxRmtDriver, CHANNEL0};

    // RMT item durations are 15 bits wide; longer periods are split across
    // consecutive items at the same level.
    const RMT_MAX_TICKS: u16 = 0x7FFF;

    pub struct RmtRadio {
        driver: TxRmtDriver<'static>,
    }

    impl RmtRadio {
        pub fn new(channel: CHANNEL0, pin: AnyOutputPin) -> anyhow::Result<Self> {
            // 80 MHz APB clock / 80 → one tick per microsecond.
            let config = TransmitConfig::new().clock_divider(80);
            let driver = TxRmtDriver::new(channel, pin, &config)?;
            log::debug!("RMT transmitter ready (1 us ticks)");
            Ok(Self { driver })
        }
    }

    impl RadioDevice for RmtRadio {
        fn transmit(&mut self, train: &PulseTrain) -> anyhow::Result<()> {
            let mut pulses = Vec::with_capacity(train.len());
            for (high, duration_us) in train.levels() {
                let state = if high { PinState::High } else { PinState::Low };
                let mut remaining = duration_us;
                while remaining > 0 {
                    let chunk = remaining.min(RMT_MAX_TICKS);
                    pulses.push(Pulse::new(state, PulseTicks::new(chunk)?));
                    remaining -= chunk;
                }
            }

            let mut signal = esp_idf_hal::rmt::VariableLengthSignal::with_capacity(pulses.len());
            signal.push(pulses.iter())?;
            self.driver.start_blocking(&signal)?;
            Ok(())
        }
    }
}
