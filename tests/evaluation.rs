//! Event worker scenarios: alerts, affirmation/correction step sequences,
//! and strength mapping into the collar limits.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use barksense::config::COLLAR_ID;
use barksense::events::Event;
use barksense::rf::encoders;
use barksense::rf::handler::CommandHandler;
use barksense::settings::{AlertType, AppSettings, EventStep, RangeMode, SettingsService};
use barksense::{CommandKind, ShockerModel};
use common::RecordingRadio;

fn fixed_step(kind: CommandKind, duration_s: f64, strength_fraction: f64) -> EventStep {
    EventStep {
        kind,
        start_delay_ms: 0,
        end_delay_ms: 0,
        time_range_type: RangeMode::Fixed,
        time_range: vec![duration_s],
        strength_range_type: RangeMode::Fixed,
        strength_range: vec![strength_fraction],
    }
}

fn spawn_worker(
    settings: AppSettings,
) -> (
    crossbeam_channel::Sender<Event>,
    RecordingRadio,
    Arc<SettingsService>,
) {
    let radio = RecordingRadio::new();
    let handler = Arc::new(CommandHandler::new(radio.factory()).unwrap());
    let settings = Arc::new(SettingsService::new(settings));
    let (events_tx, events_rx) = crossbeam_channel::bounded(10);

    let worker_settings = Arc::clone(&settings);
    thread::spawn(move || {
        barksense::tasks::dispatcher::event_worker(events_rx, handler, worker_settings)
    });

    (events_tx, radio, settings)
}

#[test]
fn failed_evaluation_runs_the_correction_steps() {
    let mut settings = AppSettings::default();
    settings.pass_threshold = 0.5;
    // Strength 0.0 maps onto the collar minimum (vibe 5).
    settings.correction_steps = vec![fixed_step(CommandKind::Vibrate, 0.12, 0.0)];
    settings.affirmation_steps = vec![fixed_step(CommandKind::Sound, 0.12, 0.0)];

    let (events_tx, radio, _settings) = spawn_worker(settings);
    events_tx.send(Event::Evaluation { pass_rate: 0.4 }).unwrap();
    thread::sleep(Duration::from_millis(800));

    let vibrate = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Vibrate, 5);
    let beep = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Sound, 0);
    let trains = radio.trains();

    assert!(
        trains.iter().any(|t| *t == vibrate),
        "correction vibrate at the mapped minimum strength must air"
    );
    assert!(
        trains.iter().all(|t| *t != beep),
        "affirmation steps must not run on a failed evaluation"
    );
}

#[test]
fn passed_evaluation_runs_the_affirmation_steps() {
    let mut settings = AppSettings::default();
    settings.pass_threshold = 0.5;
    settings.correction_steps = vec![fixed_step(CommandKind::Shock, 0.12, 1.0)];
    settings.affirmation_steps = vec![fixed_step(CommandKind::Sound, 0.12, 0.3)];

    let (events_tx, radio, _settings) = spawn_worker(settings);
    events_tx.send(Event::Evaluation { pass_rate: 0.8 }).unwrap();
    thread::sleep(Duration::from_millis(800));

    // Beeps ignore strength entirely.
    let beep = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Sound, 0);
    let trains = radio.trains();
    assert!(trains.iter().any(|t| *t == beep), "affirmation beep must air");

    let shock_prefix = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Shock, 75);
    assert!(trains.iter().all(|t| *t != shock_prefix));
}

#[test]
fn strength_maps_into_the_collar_band() {
    let mut settings = AppSettings::default();
    settings.pass_threshold = 1.0;
    settings.collar_min_vibe = 10;
    settings.collar_max_vibe = 90;
    // Half strength between 10 and 90 → 50.
    settings.correction_steps = vec![fixed_step(CommandKind::Vibrate, 0.1, 0.5)];

    let (events_tx, radio, _settings) = spawn_worker(settings);
    events_tx.send(Event::Evaluation { pass_rate: 0.0 }).unwrap();
    thread::sleep(Duration::from_millis(600));

    let expected = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Vibrate, 50);
    assert!(radio.trains().iter().any(|t| *t == expected));
}

#[test]
fn alert_event_vibrates_then_stops() {
    let settings = AppSettings::default();
    let (events_tx, radio, _settings) = spawn_worker(settings);

    events_tx
        .send(Event::Alert {
            alert_type: AlertType::CollarVibration,
            duration_ms: 150,
            strength: 35,
        })
        .unwrap();
    thread::sleep(Duration::from_millis(800));

    let alert = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Vibrate, 35);
    let zero = encoders::zero_sequence(ShockerModel::CaiXianlin, COLLAR_ID);
    let trains = radio.trains();

    assert!(trains.iter().any(|t| *t == alert), "alert vibrate must air");
    assert!(
        trains.iter().any(|t| *t == zero),
        "the stop after the alert must reach the radio"
    );
    assert_eq!(trains.last().unwrap(), &zero);
}

#[test]
fn steps_run_sequentially_with_their_delays() {
    let mut settings = AppSettings::default();
    settings.pass_threshold = 1.0;
    let mut first = fixed_step(CommandKind::Vibrate, 0.1, 0.0);
    first.end_delay_ms = 120;
    let second = fixed_step(CommandKind::Sound, 0.1, 0.0);
    settings.correction_steps = vec![first, second];

    let (events_tx, radio, _settings) = spawn_worker(settings);
    events_tx.send(Event::Evaluation { pass_rate: 0.0 }).unwrap();
    thread::sleep(Duration::from_millis(1200));

    let vibrate = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Vibrate, 5);
    let beep = encoders::sequence(ShockerModel::CaiXianlin, COLLAR_ID, CommandKind::Sound, 0);
    let log = radio.timestamped();

    let first_vibrate = log.iter().find(|(_, t)| *t == vibrate).map(|(at, _)| *at);
    let first_beep = log.iter().find(|(_, t)| *t == beep).map(|(at, _)| *at);

    let (vibrate_at, beep_at) = (
        first_vibrate.expect("first step must air"),
        first_beep.expect("second step must air"),
    );
    // Step 1 runs for 100 ms, then its end delay keeps the worker quiet for
    // another 120 ms before step 2 begins.
    assert!(beep_at.duration_since(vibrate_at) >= Duration::from_millis(220));
}
