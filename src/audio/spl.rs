// Barksense — Sound Pressure Level Conversion
//
// Window sums arrive from the reader task; dB math (division, logarithms)
// happens on the consumer side where timing is relaxed.

use crate::config::{
    LEQ_PERIOD, MIC_BITS, MIC_NOISE_DB, MIC_OFFSET_DB, MIC_OVERLOAD_DB, MIC_REF_DB,
    MIC_SENSITIVITY, SAMPLES_SHORT, SAMPLE_RATE,
};
use crate::events::WindowStats;

/// Digital amplitude expected at `MIC_REF_DB` for the configured
/// microphone sensitivity.
pub fn mic_ref_ampl() -> f64 {
    10f64.powf(MIC_SENSITIVITY / 20.0) * ((1u32 << (MIC_BITS - 1)) - 1) as f64
}

/// dB SPL of one analysis window given its sum of squares.
pub fn window_spl_db(sum_sqr: f32, samples: usize) -> f64 {
    let rms = (sum_sqr as f64 / samples as f64).sqrt();
    MIC_OFFSET_DB + MIC_REF_DB + 20.0 * (rms / mic_ref_ampl()).log10()
}

/// Accumulates weighted window sums into an equivalent continuous sound
/// level over `LEQ_PERIOD`.
///
/// Acoustic overload latches the accumulator at +∞ for the rest of the
/// period, a window under the noise floor (or NaN) latches it at -∞;
/// consumers treat the resulting non-finite Leq as an invalid measurement
/// but keep their phase timing.
#[derive(Debug, Default)]
pub struct LeqMeter {
    sum_sqr: f64,
    samples: u32,
}

impl LeqMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one window; returns the Leq in dB whenever a full averaging
    /// period has been gathered.
    pub fn push(&mut self, stats: &WindowStats) -> Option<f64> {
        let short_db = window_spl_db(stats.sum_sqr_equalized, SAMPLES_SHORT);
        if short_db > MIC_OVERLOAD_DB {
            self.sum_sqr = f64::INFINITY;
        } else if short_db.is_nan() || short_db < MIC_NOISE_DB {
            self.sum_sqr = f64::NEG_INFINITY;
        }

        self.sum_sqr += stats.sum_sqr_weighted as f64;
        self.samples += SAMPLES_SHORT as u32;

        if f64::from(self.samples) >= f64::from(SAMPLE_RATE) * LEQ_PERIOD {
            let rms = (self.sum_sqr / f64::from(self.samples)).sqrt();
            let leq = MIC_OFFSET_DB + MIC_REF_DB + 20.0 * (rms / mic_ref_ampl()).log10();
            self.sum_sqr = 0.0;
            self.samples = 0;
            Some(leq)
        } else {
            None
        }
    }
}

/// The weighted sum of squares a window needs for `push` to average out to
/// `db` — the inverse of the Leq formula, used to fabricate calibrated
/// test windows.
pub fn sum_sqr_for_db(db: f64) -> f32 {
    let rms = mic_ref_ampl() * 10f64.powf((db - MIC_OFFSET_DB - MIC_REF_DB) / 20.0);
    (rms * rms * SAMPLES_SHORT as f64) as f32
}
