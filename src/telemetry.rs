// Barksense — Mic State Telemetry
//
// Snapshot of the evaluator state published to the UI/MQTT transport. The
// transport installs a publish hook; the core fires it whenever an update
// actually changes the state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct MicState {
    pub db_threshold: f64,
    pub db_value: f64,
    pub pitch_threshold: f64,
    /// Dormant pitch detection path; plumbed as zero for compatibility.
    pub pitch_value: f64,
    /// Milliseconds until the current action window closes; -1 while the
    /// evaluator idles.
    pub event_countdown_ms: i32,
    pub db_pass_rate: f32,
    pub enabled: bool,
}

impl Default for MicState {
    fn default() -> Self {
        Self {
            db_threshold: 70.0,
            db_value: 0.0,
            pitch_threshold: 0.0,
            pitch_value: 0.0,
            event_countdown_ms: -1,
            db_pass_rate: 0.0,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    Changed,
    Unchanged,
}

type PublishHook = Box<dyn Fn(&MicState) + Send + Sync>;

pub struct MicStateService {
    state: Mutex<MicState>,
    enabled: AtomicBool,
    hook: Mutex<Option<PublishHook>>,
}

impl MicStateService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MicState::default()),
            enabled: AtomicBool::new(false),
            hook: Mutex::new(None),
        }
    }

    /// Install the transport's publish callback.
    pub fn set_publish_hook(&self, hook: PublishHook) {
        *self.hook.lock().unwrap() = Some(hook);
    }

    /// Apply `f` to the state; publishes the new snapshot when the closure
    /// reports a change.
    pub fn update(&self, f: impl FnOnce(&mut MicState) -> StateUpdate) {
        let published = {
            let mut state = self.state.lock().unwrap();
            match f(&mut state) {
                StateUpdate::Changed => Some(state.clone()),
                StateUpdate::Unchanged => None,
            }
        };
        if let Some(state) = published {
            if let Some(hook) = self.hook.lock().unwrap().as_ref() {
                hook(&state);
            }
        }
    }

    pub fn snapshot(&self) -> MicState {
        self.state.lock().unwrap().clone()
    }

    /// The control surface: toggles the evaluator on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        self.update(|state| {
            if state.enabled == enabled {
                StateUpdate::Unchanged
            } else {
                state.enabled = enabled;
                StateUpdate::Changed
            }
        });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Default for MicStateService {
    fn default() -> Self {
        Self::new()
    }
}
