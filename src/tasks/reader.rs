// Barksense — Audio Reader Task
//
// Hard-real-time producer: blocks on I2S DMA, compresses each window into
// sums of squares, and hands them to the evaluator. Only the minimum work
// happens here; dB math runs on the consumer side.

use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::audio::filters::SosFilter;
use crate::config::{MIC_BITS, SAMPLES_SHORT, SAMPLE_BITS};
use crate::drivers::mic::SampleSource;
use crate::events::WindowStats;

pub fn reader_task<S: SampleSource>(
    mut source: S,
    mut equalizer: SosFilter,
    mut weighting: SosFilter,
    samples_tx: Sender<WindowStats>,
) {
    log::info!("Audio reader task started");

    let mut raw = vec![0i32; SAMPLES_SHORT];

    // Discard the first block; the microphone needs startup time
    // (an INMP441 takes up to 83 ms to wake).
    if let Err(e) = source.read(&mut raw) {
        log::error!("I2S warm-up read failed: {e}");
        return;
    }

    let mut samples = vec![0f32; SAMPLES_SHORT];
    let shift = SAMPLE_BITS - MIC_BITS;

    loop {
        if let Err(e) = source.read(&mut raw) {
            log::warn!("I2S read error: {e}");
            thread::sleep(Duration::from_millis(10));
            continue;
        }

        // Scale the raw words down to the microphone's valid bits.
        for (dst, &src) in samples.iter_mut().zip(raw.iter()) {
            *dst = (src >> shift) as f32;
        }

        let sum_sqr_equalized = equalizer.filter(&mut samples);
        let sum_sqr_weighted = weighting.filter(&mut samples);

        // Blocking send on purpose: dropping windows would corrupt the
        // evaluator's tick counting, so back-pressure stalls the reader.
        let stats = WindowStats {
            sum_sqr_equalized,
            sum_sqr_weighted,
        };
        if samples_tx.send(stats).is_err() {
            log::warn!("Samples channel closed — exiting reader task");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    /// First read returns start-up garbage, the rest a constant amplitude.
    struct ScriptedSource {
        reads: usize,
        warmup_amplitude: i32,
        amplitude: i32,
    }

    impl SampleSource for ScriptedSource {
        fn read(&mut self, buf: &mut [i32]) -> anyhow::Result<()> {
            let value = if self.reads == 0 {
                self.warmup_amplitude
            } else {
                self.amplitude
            };
            self.reads += 1;
            buf.fill(value);
            Ok(())
        }
    }

    #[test]
    fn windows_are_scaled_filtered_and_forwarded() {
        let (tx, rx) = bounded(8);
        let source = ScriptedSource {
            reads: 0,
            warmup_amplitude: i32::MAX,
            amplitude: 1 << 20,
        };

        let reader = std::thread::spawn(move || {
            reader_task(source, SosFilter::none(), SosFilter::none(), tx)
        });

        // 2^20 >> 8 = 2^12; with pass-through filters the sums are exact.
        let expected = (4096.0f32 * 4096.0) * SAMPLES_SHORT as f32;
        for _ in 0..3 {
            let stats = rx.recv_timeout(Duration::from_millis(500)).unwrap();
            // The warm-up garbage never shows up: the first block is dropped.
            assert_eq!(stats.sum_sqr_equalized, expected);
            assert_eq!(stats.sum_sqr_weighted, expected);
        }

        // Closing the channel shuts the reader down.
        drop(rx);
        reader.join().unwrap();
    }
}
