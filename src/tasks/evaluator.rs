// Barksense — Evaluation Scheduler
//
// Wall-clock phase machine over the Leq stream:
//
//   Idle ─→ Alert (only with an alert configured) ─→ Action ─→ Dispatch ─→ Idle
//
// Phase durations and the decibel threshold are re-sampled from settings at
// each phase entry, so mid-phase settings edits apply on the next cycle.
// The machine takes its clock as a parameter; the task wrapper feeds it
// real time, tests feed it a synthetic schedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use rand::Rng;

use crate::audio::spl::LeqMeter;
use crate::config::ALERT_TIME_MS;
use crate::events::{Event, WindowStats};
use crate::settings::{AlertType, PassType, SettingsService};
use crate::telemetry::{MicStateService, StateUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalPhase {
    Idle,
    Alert,
    Action,
    Dispatch,
}

pub struct EvalEngine {
    settings: Arc<SettingsService>,
    phase: EvalPhase,
    phase_start: Instant,
    idle_duration: Duration,
    act_duration: Duration,
    threshold_db: f64,
    pass_type: PassType,
    alert_type: AlertType,
    alert_duration_ms: u32,
    alert_strength: u8,
    ticks_total: u32,
    ticks_passed: u32,
    pass_rate: f32,
}

impl EvalEngine {
    pub fn new(settings: Arc<SettingsService>, now: Instant) -> Self {
        let mut engine = Self {
            settings,
            phase: EvalPhase::Idle,
            phase_start: now,
            idle_duration: Duration::ZERO,
            act_duration: Duration::ZERO,
            threshold_db: 0.0,
            pass_type: PassType::Graded,
            alert_type: AlertType::None,
            alert_duration_ms: 0,
            alert_strength: 0,
            ticks_total: 0,
            ticks_passed: 0,
            pass_rate: 0.0,
        };
        engine.enter_idle(now);
        engine
    }

    /// Restart from a fresh idle baseline (used when the controller is
    /// disabled or just re-enabled).
    pub fn reset(&mut self, now: Instant) {
        self.enter_idle(now);
    }

    pub fn phase(&self) -> EvalPhase {
        self.phase
    }

    pub fn pass_rate(&self) -> f32 {
        self.pass_rate
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    /// Milliseconds until the current action window closes; -1 while idle.
    pub fn countdown_ms(&self, now: Instant) -> i32 {
        let elapsed = now.duration_since(self.phase_start);
        match self.phase {
            EvalPhase::Idle | EvalPhase::Dispatch => -1,
            EvalPhase::Alert => {
                let alert_left = Duration::from_millis(ALERT_TIME_MS).saturating_sub(elapsed);
                (alert_left + self.act_duration).as_millis() as i32
            }
            EvalPhase::Action => self.act_duration.saturating_sub(elapsed).as_millis() as i32,
        }
    }

    /// Advance the machine with one Leq measurement.
    pub fn on_leq(&mut self, leq_db: f64, now: Instant) -> Option<Event> {
        match self.phase {
            EvalPhase::Idle => {
                if now.duration_since(self.phase_start) >= self.idle_duration {
                    if self.alert_type != AlertType::None {
                        self.phase = EvalPhase::Alert;
                        self.phase_start = now;
                        return Some(Event::Alert {
                            alert_type: self.alert_type,
                            duration_ms: self.alert_duration_ms,
                            strength: self.alert_strength,
                        });
                    }
                    self.enter_action(now);
                }
                None
            }
            EvalPhase::Alert => {
                if now.duration_since(self.phase_start)
                    >= Duration::from_millis(ALERT_TIME_MS)
                {
                    self.enter_action(now);
                }
                None
            }
            EvalPhase::Action => {
                // Overload / noise-floor periods are invalid measurements;
                // they don't grade, but the clock keeps running.
                if leq_db.is_finite() {
                    self.ticks_total += 1;
                    let passed = leq_db >= self.threshold_db;
                    if passed {
                        self.ticks_passed += 1;
                    }
                    if passed && self.pass_type == PassType::FirstPass {
                        self.pass_rate = 1.0;
                        return Some(self.dispatch(now));
                    }
                    self.pass_rate = self.ticks_passed as f32 / self.ticks_total as f32;
                }
                if now.duration_since(self.phase_start) >= self.act_duration {
                    return Some(self.dispatch(now));
                }
                None
            }
            // Dispatch is transient; a tick landing here just re-idles.
            EvalPhase::Dispatch => {
                self.enter_idle(now);
                None
            }
        }
    }

    fn dispatch(&mut self, now: Instant) -> Event {
        self.phase = EvalPhase::Dispatch;
        let event = Event::Evaluation {
            pass_rate: self.pass_rate,
        };
        self.enter_idle(now);
        event
    }

    fn enter_idle(&mut self, now: Instant) {
        let (idle_min, idle_max, alert_type, alert_duration_ms, alert_strength) =
            self.settings.read(|s| {
                (
                    s.idle_period_min_ms,
                    s.idle_period_max_ms,
                    s.alert_type,
                    s.alert_duration_ms,
                    s.alert_strength,
                )
            });
        self.idle_duration = Duration::from_millis(sample_period_ms(idle_min, idle_max));
        self.alert_type = alert_type;
        self.alert_duration_ms = alert_duration_ms;
        self.alert_strength = alert_strength;
        self.phase = EvalPhase::Idle;
        self.phase_start = now;
    }

    fn enter_action(&mut self, now: Instant) {
        let (act_min, act_max, db_min, db_max, pass_type) = self.settings.read(|s| {
            (
                s.action_period_min_ms,
                s.action_period_max_ms,
                s.decibel_threshold_min,
                s.decibel_threshold_max,
                s.pass_type,
            )
        });
        self.act_duration = Duration::from_millis(sample_period_ms(act_min, act_max));
        self.threshold_db = sample_threshold_db(db_min, db_max);
        self.pass_type = pass_type;
        self.ticks_total = 0;
        self.ticks_passed = 0;
        self.pass_rate = 0.0;
        self.phase = EvalPhase::Action;
        self.phase_start = now;
    }
}

fn sample_period_ms(min_ms: u32, max_ms: u32) -> u64 {
    if max_ms > min_ms {
        rand::thread_rng().gen_range(min_ms..=max_ms) as u64
    } else {
        min_ms as u64
    }
}

fn sample_threshold_db(min_db: i32, max_db: i32) -> f64 {
    if max_db > min_db {
        rand::thread_rng().gen_range(min_db..=max_db) as f64
    } else {
        min_db as f64
    }
}

/// Drain the samples channel, fold windows into Leq measurements, drive the
/// phase machine, and keep the telemetry snapshot current.
pub fn evaluator_task(
    samples_rx: Receiver<WindowStats>,
    events_tx: Sender<Event>,
    settings: Arc<SettingsService>,
    mic_state: Arc<MicStateService>,
) {
    log::info!("Evaluator task started");

    let mut engine = EvalEngine::new(Arc::clone(&settings), Instant::now());
    let mut meter = LeqMeter::new();
    let mut was_enabled = false;

    while let Ok(stats) = samples_rx.recv() {
        let Some(leq_db) = meter.push(&stats) else {
            continue;
        };
        let now = Instant::now();
        let enabled = mic_state.is_enabled();

        if !enabled {
            // Paused: the phase baseline resets so re-enabling starts a
            // fresh idle period.
            engine.reset(now);
            was_enabled = false;
            publish(&mic_state, &engine, leq_db, now, false);
            continue;
        }
        if !was_enabled {
            engine.reset(now);
            was_enabled = true;
        }

        if let Some(event) = engine.on_leq(leq_db, now) {
            if events_tx.send(event).is_err() {
                log::warn!("Events channel closed — exiting evaluator task");
                return;
            }
        }

        publish(&mic_state, &engine, leq_db, now, true);
    }

    log::warn!("Samples channel closed — exiting evaluator task");
}

fn publish(
    mic_state: &MicStateService,
    engine: &EvalEngine,
    leq_db: f64,
    now: Instant,
    enabled: bool,
) {
    let countdown = engine.countdown_ms(now);
    let threshold = if countdown < 0 { 0.0 } else { engine.threshold_db() };
    let pass_rate = engine.pass_rate();
    mic_state.update(|state| {
        if state.db_value == leq_db
            && state.event_countdown_ms == countdown
            && state.enabled == enabled
        {
            return StateUpdate::Unchanged;
        }
        state.db_value = leq_db;
        state.db_threshold = threshold;
        state.event_countdown_ms = countdown;
        state.db_pass_rate = pass_rate;
        state.pitch_value = 0.0;
        state.enabled = enabled;
        StateUpdate::Changed
    });
}
