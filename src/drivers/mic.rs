// Barksense — I2S Microphone Driver

/// Blocking source of raw 32-bit audio samples. `read` fills the whole
/// buffer before returning; on hardware it blocks on I2S DMA.
pub trait SampleSource: Send {
    fn read(&mut self, buf: &mut [i32]) -> anyhow::Result<()>;
}

#[cfg(feature = "esp32")]
pub use esp32::I2sMic;

#[cfg(feature = "esp32")]
mod esp32 {
    use super::SampleSource;
    use crate::config::{DMA_BANKS, DMA_BANK_SIZE, SAMPLE_RATE};

    use esp_idf_hal::delay;
    use esp_idf_hal::gpio::{Gpio14, Gpio15, Gpio39};
    use esp_idf_hal::i2s::config::{
        Config, DataBitWidth, SlotMode, StdClkConfig, StdConfig, StdGpioConfig, StdSlotConfig,
        StdSlotMask,
    };
    use esp_idf_hal::i2s::{I2sDriver, I2sRx, I2S0};

    /// I2S master RX, 16 kHz, 32-bit frames, right slot only. The sample
    /// rate is fixed: the analysis IIR filters are designed for it.
    pub struct I2sMic {
        driver: I2sDriver<'static, I2sRx>,
    }

    impl I2sMic {
        pub fn new(i2s: I2S0, bclk: Gpio14, ws: Gpio15, din: Gpio39) -> anyhow::Result<Self> {
            let clk_cfg = StdClkConfig::from_sample_rate_hz(SAMPLE_RATE);
            let slot_cfg = StdSlotConfig::philips_slot_default(DataBitWidth::Bits32, SlotMode::Mono)
                .slot_mask(StdSlotMask::Right);
            let config = StdConfig::new(
                Config::default()
                    .dma_buffer_count(DMA_BANKS)
                    .frames_per_buffer(DMA_BANK_SIZE),
                clk_cfg,
                slot_cfg,
                StdGpioConfig::default(),
            );

            let mut driver = I2sDriver::new_std_rx(
                i2s,
                &config,
                bclk,
                din,
                None::<esp_idf_hal::gpio::AnyIOPin>,
                ws,
            )?;
            driver.rx_enable()?;
            log::info!("I2S driver installed ({} Hz, 32-bit, right slot)", SAMPLE_RATE);

            Ok(Self { driver })
        }
    }

    impl SampleSource for I2sMic {
        fn read(&mut self, buf: &mut [i32]) -> anyhow::Result<()> {
            // The DMA hands out bytes; refill until the window is complete.
            let mut bytes = vec![0u8; buf.len() * 4];
            let mut filled = 0;
            while filled < bytes.len() {
                filled += self.driver.read(&mut bytes[filled..], delay::BLOCK)?;
            }
            for (dst, chunk) in buf.iter_mut().zip(bytes.chunks_exact(4)) {
                *dst = i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            Ok(())
        }
    }
}
