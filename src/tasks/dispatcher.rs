// Barksense — Event Worker
//
// Drains evaluation events sequentially — never concurrently — and turns
// them into collar commands. Steps block this task (inter-step pacing is
// wall-clock sleeps); the RF engine handles the actual repetition on air.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::config::COLLAR_ID;
use crate::events::Event;
use crate::rf::handler::CommandHandler;
use crate::rf::{CommandKind, ShockerModel};
use crate::settings::{AlertType, EventStep, SettingsService};

pub fn event_worker(
    events_rx: Receiver<Event>,
    handler: Arc<CommandHandler>,
    settings: Arc<SettingsService>,
) {
    log::info!("Event worker started");

    while let Ok(event) = events_rx.recv() {
        match event {
            Event::Alert {
                alert_type,
                duration_ms,
                strength,
            } => handle_alert(&handler, alert_type, duration_ms, strength),
            Event::Evaluation { pass_rate } => {
                let (passed, steps) = settings.read(|s| {
                    let passed = pass_rate >= s.pass_threshold;
                    let steps = if passed {
                        s.affirmation_steps.clone()
                    } else {
                        s.correction_steps.clone()
                    };
                    (passed, steps)
                });
                log::info!(
                    "Evaluation complete: pass rate {:.2} → {} ({} steps)",
                    pass_rate,
                    if passed { "affirmation" } else { "correction" },
                    steps.len()
                );
                for step in &steps {
                    process_step(&handler, &settings, step, pass_rate);
                }
            }
        }
    }

    log::info!("Events channel closed — exiting event worker");
}

fn handle_alert(handler: &CommandHandler, alert_type: AlertType, duration_ms: u32, strength: u8) {
    let duration = clamp_duration_ms(duration_ms as f64);
    let sent = match alert_type {
        AlertType::None => return,
        AlertType::CollarVibration => handler.handle_command(
            ShockerModel::CaiXianlin,
            COLLAR_ID,
            CommandKind::Vibrate,
            strength,
            duration,
        ),
        AlertType::CollarBeep => handler.handle_command(
            ShockerModel::CaiXianlin,
            COLLAR_ID,
            CommandKind::Sound,
            0,
            duration,
        ),
    };
    if !sent {
        log::warn!("Failed to dispatch alert");
    }

    thread::sleep(Duration::from_millis(duration as u64));
    handler.handle_command(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Stop, 0, 0);
}

fn process_step(
    handler: &CommandHandler,
    settings: &SettingsService,
    step: &EventStep,
    pass_rate: f32,
) {
    if step.start_delay_ms > 0 {
        thread::sleep(Duration::from_millis(step.start_delay_ms as u64));
    }

    let (min_val, max_val) = settings.read(|s| match step.kind {
        CommandKind::Shock => (s.collar_min_shock, s.collar_max_shock),
        _ => (s.collar_min_vibe, s.collar_max_vibe),
    });

    let strength_fraction = step
        .strength_range_type
        .sample(&step.strength_range, pass_rate);
    let strength = map_range(
        strength_fraction * 100.0,
        0.0,
        100.0,
        min_val as f64,
        max_val as f64,
    )
    .clamp(0.0, 100.0)
    .round() as u8;

    let duration_s = step.time_range_type.sample(&step.time_range, pass_rate);
    let duration_ms = clamp_duration_ms(duration_s * 1000.0);

    let sent = match step.kind {
        CommandKind::Shock | CommandKind::Vibrate => handler.handle_command(
            ShockerModel::CaiXianlin,
            COLLAR_ID,
            step.kind,
            strength,
            duration_ms,
        ),
        // Beeps carry no strength.
        CommandKind::Sound => handler.handle_command(
            ShockerModel::CaiXianlin,
            COLLAR_ID,
            CommandKind::Sound,
            0,
            duration_ms,
        ),
        CommandKind::Stop => handler.handle_command(
            ShockerModel::CaiXianlin,
            COLLAR_ID,
            CommandKind::Stop,
            0,
            0,
        ),
    };
    if !sent {
        log::warn!("Collar command failed for {:?} step", step.kind);
    }

    thread::sleep(Duration::from_millis(duration_ms as u64));
    handler.handle_command(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Stop, 0, 0);

    if step.end_delay_ms > 0 {
        thread::sleep(Duration::from_millis(step.end_delay_ms as u64));
    }
}

/// Linear mapping between ranges, mirroring the classic Arduino `map`.
fn map_range(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

fn clamp_duration_ms(ms: f64) -> u16 {
    ms.clamp(0.0, u16::MAX as f64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_range_matches_collar_limits() {
        assert_eq!(map_range(0.0, 0.0, 100.0, 5.0, 100.0), 5.0);
        assert_eq!(map_range(100.0, 0.0, 100.0, 5.0, 100.0), 100.0);
        assert_eq!(map_range(50.0, 0.0, 100.0, 0.0, 100.0), 50.0);
        // Half strength between vibe limits 5..=100.
        assert!((map_range(50.0, 0.0, 100.0, 5.0, 100.0) - 52.5).abs() < 1e-9);
    }

    #[test]
    fn durations_saturate_at_u16() {
        assert_eq!(clamp_duration_ms(-5.0), 0);
        assert_eq!(clamp_duration_ms(1000.0), 1000);
        assert_eq!(clamp_duration_ms(1e9), u16::MAX);
    }
}
