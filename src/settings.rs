// Barksense — Application Settings
//
// In-memory settings snapshot shared between the external transport layer
// (writer) and the evaluator (reader). Persistence and the HTTP/WS surface
// live outside the core; this is only the state they hand us.

use std::sync::Mutex;

use rand::Rng;

use crate::rf::CommandKind;

/// Optional warning emitted immediately before an action window opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    None,
    CollarBeep,
    CollarVibration,
}

/// How an action window is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// The first passing window ends the action phase with a full pass.
    FirstPass,
    /// The pass rate is the fraction of windows over the threshold.
    Graded,
}

/// How a `[min, max]` range is sampled when a step runs.
///
/// `Progressive`, `Redeemable` and `Graded` are reserved names carried for
/// the settings surface; they currently behave like `Fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    Fixed,
    Random,
    Progressive,
    Redeemable,
    Graded,
}

impl RangeMode {
    pub fn sample(self, range: &[f64], _pass_rate: f32) -> f64 {
        let first = range.first().copied().unwrap_or(0.0);
        match self {
            RangeMode::Random if range.len() >= 2 && range[1] > range[0] => {
                rand::thread_rng().gen_range(range[0]..range[1])
            }
            _ => first,
        }
    }
}

/// One element of a user-programmed affirmation or correction sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStep {
    pub kind: CommandKind,
    pub start_delay_ms: u32,
    pub end_delay_ms: u32,
    pub time_range_type: RangeMode,
    /// Step duration range in seconds.
    pub time_range: Vec<f64>,
    pub strength_range_type: RangeMode,
    /// Strength range as a fraction (0.0..=1.0) of the collar limits.
    pub strength_range: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub idle_period_min_ms: u32,
    pub idle_period_max_ms: u32,
    pub action_period_min_ms: u32,
    pub action_period_max_ms: u32,
    pub decibel_threshold_min: i32,
    pub decibel_threshold_max: i32,
    /// Microphone sensitivity selector from the datasheet (26..=29).
    pub mic_sensitivity: u8,

    pub alert_type: AlertType,
    pub alert_duration_ms: u32,
    pub alert_strength: u8,

    pub collar_min_shock: u8,
    pub collar_max_shock: u8,
    pub collar_min_vibe: u8,
    pub collar_max_vibe: u8,

    pub pass_type: PassType,
    /// Pass-rate threshold separating affirmation from correction.
    pub pass_threshold: f32,

    pub correction_steps: Vec<EventStep>,
    pub affirmation_steps: Vec<EventStep>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            idle_period_min_ms: 10_000,
            idle_period_max_ms: 10_000,
            action_period_min_ms: 1_000,
            action_period_max_ms: 1_000,
            decibel_threshold_min: 80,
            decibel_threshold_max: 80,
            mic_sensitivity: 26,
            alert_type: AlertType::None,
            alert_duration_ms: 1_000,
            alert_strength: 50,
            collar_min_shock: 5,
            collar_max_shock: 75,
            collar_min_vibe: 5,
            collar_max_vibe: 100,
            pass_type: PassType::Graded,
            pass_threshold: 0.5,
            correction_steps: Vec::new(),
            affirmation_steps: Vec::new(),
        }
    }
}

/// Shared settings access. Readers copy the fields they need inside the
/// closure; the lock is never held across a suspension point.
pub struct SettingsService {
    state: Mutex<AppSettings>,
}

impl SettingsService {
    pub fn new(initial: AppSettings) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppSettings) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    pub fn update(&self, f: impl FnOnce(&mut AppSettings)) {
        f(&mut self.state.lock().unwrap());
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new(AppSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_range_modes_degrade_to_fixed() {
        let range = [2.5, 7.5];
        for mode in [
            RangeMode::Fixed,
            RangeMode::Progressive,
            RangeMode::Redeemable,
            RangeMode::Graded,
        ] {
            assert_eq!(mode.sample(&range, 0.7), 2.5);
        }
    }

    #[test]
    fn random_mode_stays_in_range() {
        let range = [1.0, 3.0];
        for _ in 0..100 {
            let v = RangeMode::Random.sample(&range, 0.0);
            assert!((1.0..3.0).contains(&v));
        }
        // Degenerate ranges fall back to the first endpoint.
        assert_eq!(RangeMode::Random.sample(&[4.0], 0.0), 4.0);
        assert_eq!(RangeMode::Random.sample(&[4.0, 4.0], 0.0), 4.0);
    }

    #[test]
    fn settings_read_returns_closure_value() {
        let service = SettingsService::default();
        service.update(|s| s.decibel_threshold_min = 72);
        let (min, max) = service.read(|s| (s.decibel_threshold_min, s.decibel_threshold_max));
        assert_eq!((min, max), (72, 80));
    }
}
