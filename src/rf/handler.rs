// Barksense — Collar Command Handler
//
// Facade over the RF transmitter and the keep-alive scheduler. Serializes
// command dispatch, rewrites Stop into a zero-intensity vibration with a
// queue flush, and registers activity with the keep-alive worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{GPIO_RF_TX, KEEP_ALIVE_INTERVAL_MS, STOP_VIBRATE_DURATION_MS};
use crate::drivers::radio::{self, RadioDevice};
use crate::rf::keepalive::{KeepAlive, KnownShocker};
use crate::rf::transmitter::RfTransmitter;
use crate::rf::{CommandKind, ShockerModel};

/// Builds a radio for a TX pin. Lets the handler rebuild the transmitter on
/// a pin change and lets tests substitute a recording radio.
pub type RadioFactory = Box<dyn Fn(u8) -> anyhow::Result<Box<dyn RadioDevice>> + Send + Sync>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetPinError {
    #[error("pin is not a valid RF output pin")]
    InvalidPin,
    #[error("failed to initialize RF transmitter")]
    InternalError,
}

pub struct CommandHandler {
    transmitter: Arc<Mutex<Option<RfTransmitter>>>,
    keep_alive: KeepAlive,
    /// Configured keep-alive state; pausing toggles the worker without
    /// touching this.
    keep_alive_configured: AtomicBool,
    radio_factory: RadioFactory,
}

impl CommandHandler {
    /// Bring up a transmitter on the default RF pin. Failure here is fatal
    /// for collar control; the caller decides whether to run without it.
    pub fn new(radio_factory: RadioFactory) -> anyhow::Result<Self> {
        Self::with_keep_alive_interval(radio_factory, Duration::from_millis(KEEP_ALIVE_INTERVAL_MS))
    }

    pub fn with_keep_alive_interval(
        radio_factory: RadioFactory,
        keep_alive_interval: Duration,
    ) -> anyhow::Result<Self> {
        let radio = radio_factory(GPIO_RF_TX)?;
        let transmitter = Arc::new(Mutex::new(Some(RfTransmitter::new(radio)?)));
        let keep_alive = KeepAlive::with_interval(Arc::clone(&transmitter), keep_alive_interval);

        Ok(Self {
            transmitter,
            keep_alive,
            keep_alive_configured: AtomicBool::new(false),
            radio_factory,
        })
    }

    pub fn ok(&self) -> bool {
        self.transmitter.lock().unwrap().is_some()
    }

    /// Replace the transmitter with one driving `pin`. The old transmitter
    /// is destroyed first (joining its worker), so the radio peripheral is
    /// free when the factory runs.
    pub fn set_rf_tx_pin(&self, pin: u8) -> Result<(), SetPinError> {
        if !radio::is_valid_output_pin(pin) {
            return Err(SetPinError::InvalidPin);
        }

        let mut guard = self.transmitter.lock().unwrap();
        if guard.take().is_some() {
            log::debug!("Destroying existing RF transmitter");
        }

        log::debug!("Creating new RF transmitter on pin {pin}");
        let radio = (self.radio_factory)(pin).map_err(|e| {
            log::error!("Failed to initialize radio on pin {pin}: {e}");
            SetPinError::InternalError
        })?;
        let transmitter = RfTransmitter::new(radio).map_err(|e| {
            log::error!("Failed to initialize RF transmitter: {e}");
            SetPinError::InternalError
        })?;

        *guard = Some(transmitter);
        Ok(())
    }

    pub fn set_keep_alive_enabled(&self, enabled: bool) -> bool {
        if !self.keep_alive.set_enabled(enabled) {
            return false;
        }
        self.keep_alive_configured.store(enabled, Ordering::SeqCst);
        true
    }

    /// Pause or resume the worker without changing the configured state.
    pub fn set_keep_alive_paused(&self, paused: bool) -> bool {
        if !self.keep_alive_configured.load(Ordering::SeqCst) && !paused {
            log::warn!("Keep-alive is disabled in configuration, ignoring unpause");
            return false;
        }
        self.keep_alive.set_enabled(!paused)
    }

    pub fn keep_alive_enabled(&self) -> bool {
        self.keep_alive.is_enabled()
    }

    /// Dispatch one collar command. Stop clears everything pending and goes
    /// out as a short zero-intensity vibration.
    pub fn handle_command(
        &self,
        model: ShockerModel,
        shocker_id: u16,
        kind: CommandKind,
        intensity: u8,
        duration_ms: u16,
    ) -> bool {
        let stop = kind == CommandKind::Stop;
        let (kind, intensity, duration_ms) = if stop {
            log::debug!("Stop command received, clearing pending commands");
            (CommandKind::Vibrate, 0, STOP_VIBRATE_DURATION_MS)
        } else {
            log::debug!("Command: {model:?} {shocker_id} {kind:?} {intensity} {duration_ms}ms");
            (kind, intensity.min(100), duration_ms)
        };

        let ok = {
            let guard = self.transmitter.lock().unwrap();
            let Some(transmitter) = guard.as_ref() else {
                log::warn!("RF transmitter is not initialized, ignoring command");
                return false;
            };
            if stop {
                transmitter.clear_pending();
            }
            transmitter.send_command(model, shocker_id, kind, intensity, duration_ms, true)
        };

        if ok {
            let shocker = KnownShocker {
                model,
                shocker_id,
                last_activity: Instant::now() + Duration::from_millis(duration_ms as u64),
            };
            if !self.keep_alive.notify_activity(shocker) {
                log::error!("Failed to send keep-alive command to queue");
            }
        }

        ok
    }
}
