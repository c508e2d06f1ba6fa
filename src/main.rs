// Barksense — Firmware Entry Point
//
// Boot sequence:
//   1. Initialise the ESP-IDF runtime and logging.
//   2. Bring up the RMT radio and the collar command handler.
//   3. Bring up the I2S microphone.
//   4. Spawn the reader, evaluator, and event worker tasks.
//   5. Park the main thread.
//
// The keep-alive scheduler stays disabled until the control surface
// explicitly enables it; the evaluator stays paused until enabled.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_hal::cpu::Core;
use esp_idf_hal::gpio::AnyOutputPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::rmt::CHANNEL0;
use esp_idf_hal::task::thread::ThreadSpawnConfiguration;

use barksense::audio::filters::SosFilter;
use barksense::config::*;
use barksense::drivers::mic::I2sMic;
use barksense::drivers::radio::{RadioDevice, RmtRadio};
use barksense::rf::handler::{CommandHandler, RadioFactory};
use barksense::settings::{AppSettings, SettingsService};
use barksense::tasks;
use barksense::telemetry::MicStateService;

fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("Barksense firmware starting…");

    let peripherals = Peripherals::take()?;

    // ---- Collar command handler -------------------------------------------
    // SAFETY: the handler destroys the previous transmitter (joining its
    // worker and releasing the RMT driver) before asking the factory for a
    // new radio, so re-taking CHANNEL0 never aliases a live driver. The
    // factory validates pins before it is called.
    let factory: RadioFactory = Box::new(|pin: u8| -> anyhow::Result<Box<dyn RadioDevice>> {
        let channel = unsafe { CHANNEL0::new() };
        let gpio = unsafe { AnyOutputPin::new(pin as i32) };
        Ok(Box::new(RmtRadio::new(channel, gpio)?))
    });
    let handler = Arc::new(CommandHandler::new(factory)?);
    log::info!("Collar control ready on GPIO{}", GPIO_RF_TX);

    // ---- Settings & telemetry ---------------------------------------------
    // The transport layer owns persistence; the core starts from defaults
    // and receives updates through the settings service.
    let settings = Arc::new(SettingsService::new(AppSettings::default()));
    let mic_state = Arc::new(MicStateService::new());
    mic_state.set_publish_hook(Box::new(|state| {
        log::debug!(
            "mic state: {:.1} dB (threshold {:.1}, countdown {} ms, pass {:.2})",
            state.db_value,
            state.db_threshold,
            state.event_countdown_ms,
            state.db_pass_rate,
        );
    }));

    // ---- Channels ---------------------------------------------------------
    let (samples_tx, samples_rx) = crossbeam_channel::bounded(SAMPLES_QUEUE_SIZE);
    let (events_tx, events_rx) = crossbeam_channel::bounded(EVENTS_QUEUE_SIZE);

    // ---- Microphone -------------------------------------------------------
    log::info!(
        "Mic pins: BCLK=GPIO{PIN_I2S_BCLK} WS=GPIO{PIN_I2S_WS} SD=GPIO{PIN_I2S_DATA}"
    );
    let mic = I2sMic::new(
        peripherals.i2s0,
        peripherals.pins.gpio14,
        peripherals.pins.gpio15,
        peripherals.pins.gpio39,
    )?;

    // ---- Spawn tasks ------------------------------------------------------

    // Audio reader: elevated priority, pinned to the application core so the
    // IIR cascade never shares a core with the radio worker.
    ThreadSpawnConfiguration {
        name: Some(b"mic-reader\0"),
        stack_size: STACK_READER,
        priority: 5,
        pin_to_core: Some(Core::Core1),
        ..Default::default()
    }
    .set()?;
    thread::Builder::new()
        .name("mic-reader".into())
        .stack_size(STACK_READER)
        .spawn(move || {
            tasks::reader::reader_task(mic, SosFilter::none(), SosFilter::a_weighting(), samples_tx)
        })?;
    ThreadSpawnConfiguration::default().set()?;

    let eval_settings = Arc::clone(&settings);
    let eval_state = Arc::clone(&mic_state);
    thread::Builder::new()
        .name("evaluator".into())
        .stack_size(STACK_EVALUATOR)
        .spawn(move || {
            tasks::evaluator::evaluator_task(samples_rx, events_tx, eval_settings, eval_state)
        })?;

    let worker_handler = Arc::clone(&handler);
    let worker_settings = Arc::clone(&settings);
    thread::Builder::new()
        .name("event-worker".into())
        .stack_size(STACK_DISPATCHER)
        .spawn(move || {
            tasks::dispatcher::event_worker(events_rx, worker_handler, worker_settings)
        })?;

    log::info!("Boot complete — entering normal operation");

    // Main thread has nothing left to do — park it forever.
    // (All work happens in the spawned tasks.)
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
