// Barksense — SOS IIR Filters
//
// Filters are cascades of second-order sections with the assumption that
// b0 and a0 equal 1.0; the cascade gain is applied after the last section.
// Coefficients come from tf2sos transforms of the published designs, with
// the a1/a2 columns negated. They are only valid at the fixed 16 kHz
// sample rate.

/// One second-order section. `a1` and `a2` hold the NEGATED denominator
/// coefficients.
#[derive(Debug, Clone, Copy)]
pub struct Sos {
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct DelayState {
    w0: f32,
    w1: f32,
}

/// A biquad cascade with per-instance delay state. State persists across
/// windows; resetting it between blocks makes low frequencies ring.
pub struct SosFilter {
    gain: f32,
    sections: Vec<Sos>,
    state: Vec<DelayState>,
}

impl SosFilter {
    pub fn new(gain: f32, sections: Vec<Sos>) -> Self {
        let state = vec![DelayState::default(); sections.len()];
        Self {
            gain,
            sections,
            state,
        }
    }

    /// Run the cascade over `samples` in place (Direct Form II per
    /// section), apply the gain, and return the sum of squares of the
    /// gained output.
    pub fn filter(&mut self, samples: &mut [f32]) -> f32 {
        for (sos, w) in self.sections.iter().zip(self.state.iter_mut()) {
            for sample in samples.iter_mut() {
                let v = *sample + sos.a1 * w.w0 + sos.a2 * w.w1;
                *sample = v + sos.b1 * w.w0 + sos.b2 * w.w1;
                w.w1 = w.w0;
                w.w0 = v;
            }
        }

        let mut sum_sqr = 0.0f32;
        for sample in samples.iter_mut() {
            *sample *= self.gain;
            sum_sqr += *sample * *sample;
        }
        sum_sqr
    }

    // -----------------------------------------------------------------------
    // Equalizers — flatten the frequency response of a specific microphone.
    // -----------------------------------------------------------------------

    /// Pass-through (Z-weighting); the default equalizer.
    pub fn none() -> Self {
        Self::new(1.0, Vec::new())
    }

    /// DC blocker; a1 = -0.9992 heavily attenuates everything below 10 Hz.
    pub fn dc_blocker() -> Self {
        Self::new(
            1.0,
            vec![Sos {
                b1: -1.0,
                b2: 0.0,
                a1: 0.9992,
                a2: 0.0,
            }],
        )
    }

    /// TDK/InvenSense ICS-43434.
    pub fn ics43434() -> Self {
        Self::new(
            0.477_326_42,
            vec![
                Sos {
                    b1: 0.969_867_91,
                    b2: 0.235_159_76,
                    a1: -0.066_819_48,
                    a2: -0.001_115_22,
                },
                Sos {
                    b1: -1.989_059_32,
                    b2: 0.989_089_24,
                    a1: 1.997_553_32,
                    a2: -0.997_554_82,
                },
            ],
        )
    }

    /// TDK/InvenSense ICS-43432.
    pub fn ics43432() -> Self {
        Self::new(
            -0.457_337_02,
            vec![
                Sos {
                    b1: -0.544_047_93,
                    b2: -0.248_361_76,
                    a1: 0.403_298_89,
                    a2: -0.207_346_19,
                },
                Sos {
                    b1: -1.909_911_87,
                    b2: 0.910_830_29,
                    a1: 1.790_285_72,
                    a2: -0.804_085_81,
                },
                Sos {
                    b1: 0.0,
                    b2: 0.0,
                    a1: 1.148_493_49,
                    a2: -0.150_599_53,
                },
            ],
        )
    }

    /// TDK/InvenSense INMP441.
    pub fn inmp441() -> Self {
        Self::new(
            1.001_978_35,
            vec![Sos {
                b1: -1.986_920_46,
                b2: 0.986_963_23,
                a1: 1.995_178_51,
                a2: -0.995_184_32,
            }],
        )
    }

    /// Infineon IM69D130, with a DC-blocking first section.
    pub fn im69d130() -> Self {
        Self::new(
            1.001_240_68,
            vec![
                Sos {
                    b1: -1.0,
                    b2: 0.0,
                    a1: 0.9992,
                    a2: 0.0,
                },
                Sos {
                    b1: -1.994_461_61,
                    b2: 0.994_469_28,
                    a1: 1.997_675_69,
                    a2: -0.997_677_04,
                },
            ],
        )
    }

    /// Knowles SPH0645LM4H-B rev. B, with a DC-blocking first section.
    pub fn sph0645lm4h_b_rb() -> Self {
        Self::new(
            1.001_233_78,
            vec![
                Sos {
                    b1: -1.0,
                    b2: 0.0,
                    a1: 0.9992,
                    a2: 0.0,
                },
                Sos {
                    b1: -1.988_897_66,
                    b2: 0.988_928_48,
                    a1: 1.993_853_38,
                    a2: -0.993_862_82,
                },
            ],
        )
    }

    // -----------------------------------------------------------------------
    // Weightings
    // -----------------------------------------------------------------------

    /// A-weighting (IEC 61672 approximation).
    pub fn a_weighting() -> Self {
        Self::new(
            0.169_994_95,
            vec![
                Sos {
                    b1: -2.000_269_96,
                    b2: 1.000_270_56,
                    a1: -1.060_868_44,
                    a2: -0.163_987_45,
                },
                Sos {
                    b1: 4.359_123_84,
                    b2: 3.091_202_66,
                    a1: 1.208_419_93,
                    a2: -0.273_167_00,
                },
                Sos {
                    b1: -0.709_303_03,
                    b2: -0.290_718_68,
                    a1: 1.982_242_16,
                    a2: -0.982_298_59,
                },
            ],
        )
    }

    /// C-weighting, designed by invfreqz curve fitting.
    pub fn c_weighting() -> Self {
        Self::new(
            -0.491_647_17,
            vec![
                Sos {
                    b1: 1.460_438_58,
                    b2: 0.527_507_04,
                    a1: 1.994_614_46,
                    a2: -0.994_621_71,
                },
                Sos {
                    b1: 0.237_622_24,
                    b2: 0.014_041_12,
                    a1: -1.339_658_56,
                    a2: -0.442_145_78,
                },
                Sos {
                    b1: -2.0,
                    b2: 1.0,
                    a1: 0.377_580_00,
                    a2: -0.035_636_58,
                },
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn sine(freq_hz: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (TAU * freq_hz * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn pass_through_filter_reports_raw_energy() {
        let mut filter = SosFilter::none();
        let mut samples = vec![1.0f32, -2.0, 3.0, -4.0];
        let sum_sqr = filter.filter(&mut samples);
        assert_eq!(samples, vec![1.0, -2.0, 3.0, -4.0]);
        assert!((sum_sqr - 30.0).abs() < 1e-6);
    }

    #[test]
    fn dc_blocker_removes_constant_offset() {
        // The blocker's time constant is ~1250 samples; after half a second
        // of constant input, the step edge energy has died away.
        let mut filter = SosFilter::dc_blocker();
        let mut sums = Vec::new();
        for _ in 0..8 {
            let mut window = vec![1000.0f32; 1024];
            sums.push(filter.filter(&mut window));
        }
        assert!(sums[7] < sums[0] / 1000.0);
    }

    #[test]
    fn filter_state_persists_across_windows() {
        // One long window must equal the same data fed as two halves.
        let data = sine(1000.0, 10_000.0, 16_000.0, 2048);

        let mut whole = data.clone();
        let mut full_filter = SosFilter::a_weighting();
        let whole_sum = full_filter.filter(&mut whole);

        let mut split_filter = SosFilter::a_weighting();
        let mut first = data[..1024].to_vec();
        let mut second = data[1024..].to_vec();
        let split_sum = split_filter.filter(&mut first) + split_filter.filter(&mut second);

        assert!(
            (whole_sum - split_sum).abs() / whole_sum < 1e-3,
            "windowing must not change the filter output ({whole_sum} vs {split_sum})"
        );
    }

    #[test]
    fn a_weighting_attenuates_low_frequencies() {
        let mut low = sine(100.0, 10_000.0, 16_000.0, 8192);
        let mut mid = sine(1000.0, 10_000.0, 16_000.0, 8192);

        let low_sum = SosFilter::a_weighting().filter(&mut low);
        let mid_sum = SosFilter::a_weighting().filter(&mut mid);

        assert!(
            low_sum < mid_sum,
            "100 Hz should carry less A-weighted energy than 1 kHz"
        );
    }

    #[test]
    fn a_weighted_energy_grows_with_amplitude() {
        let mut last = 0.0f32;
        for amplitude in [1_000.0f32, 4_000.0, 16_000.0, 64_000.0] {
            let mut samples = sine(1000.0, amplitude, 16_000.0, 4096);
            let sum = SosFilter::a_weighting().filter(&mut samples);
            assert!(sum > last, "energy must grow with amplitude");
            last = sum;
        }
    }
}
