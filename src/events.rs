// Barksense — Channel Payload Types

use crate::settings::AlertType;

// ---------------------------------------------------------------------------
// Audio window sums (reader task → evaluator task)
// ---------------------------------------------------------------------------
/// Per-window sums of squares, produced every `SAMPLES_SHORT` samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Sum of squares of mic samples after the equalizer filter.
    pub sum_sqr_equalized: f32,
    /// Sum of squares of weighted mic samples.
    pub sum_sqr_weighted: f32,
}

// ---------------------------------------------------------------------------
// Evaluation events (evaluator task → event worker)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Pre-action warning dispatched immediately before an action window.
    Alert {
        alert_type: AlertType,
        duration_ms: u32,
        strength: u8,
    },
    /// A completed action window; the worker picks affirmation or
    /// correction steps based on the pass rate.
    Evaluation { pass_rate: f32 },
}
