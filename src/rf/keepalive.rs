// Barksense — Collar Keep-Alive Scheduler
//
// Collar receivers power down after a minute of radio silence and then eat
// the first real command while waking up. The keep-alive worker tracks the
// last activity per known shocker and emits a zero-intensity vibration
// shortly before each one would go to sleep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::config::{
    KEEP_ALIVE_DURATION_MS, KEEP_ALIVE_INTERVAL_MS, KEEP_ALIVE_QUEUE_SIZE, RF_ENQUEUE_TIMEOUT_MS,
    STACK_KEEP_ALIVE,
};
use crate::rf::transmitter::RfTransmitter;
use crate::rf::{CommandKind, ShockerModel};

/// A collar the command handler has successfully addressed. Entries are
/// created on first command and live for the rest of the process.
#[derive(Debug, Clone, Copy)]
pub struct KnownShocker {
    pub model: ShockerModel,
    pub shocker_id: u16,
    /// When the shocker last heard from us (command dispatch time plus the
    /// command's duration).
    pub last_activity: Instant,
}

enum KeepAliveMessage {
    Activity(KnownShocker),
    Shutdown,
}

struct Worker {
    tx: Sender<KeepAliveMessage>,
    handle: JoinHandle<()>,
}

pub struct KeepAlive {
    transmitter: Arc<Mutex<Option<RfTransmitter>>>,
    interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl KeepAlive {
    pub fn new(transmitter: Arc<Mutex<Option<RfTransmitter>>>) -> Self {
        Self::with_interval(transmitter, Duration::from_millis(KEEP_ALIVE_INTERVAL_MS))
    }

    /// Tests compress the interval; firmware uses [`KeepAlive::new`].
    pub fn with_interval(
        transmitter: Arc<Mutex<Option<RfTransmitter>>>,
        interval: Duration,
    ) -> Self {
        Self {
            transmitter,
            interval,
            worker: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.worker.lock().unwrap().is_some()
    }

    /// Start or stop the worker. Disabling posts a poison message and waits
    /// until the task has terminated. Returns false when the worker could
    /// not be spawned.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let mut guard = self.worker.lock().unwrap();

        if enabled == guard.is_some() {
            log::debug!(
                "keep-alive task is already {}",
                if enabled { "enabled" } else { "disabled" }
            );
            return true;
        }

        if enabled {
            log::debug!("Enabling keep-alive task");
            let (tx, rx) = bounded(KEEP_ALIVE_QUEUE_SIZE);
            let transmitter = Arc::clone(&self.transmitter);
            let interval = self.interval;
            match thread::Builder::new()
                .name("keep-alive".into())
                .stack_size(STACK_KEEP_ALIVE)
                .spawn(move || keep_alive_worker(transmitter, rx, interval))
            {
                Ok(handle) => {
                    *guard = Some(Worker { tx, handle });
                    true
                }
                Err(e) => {
                    log::error!("Failed to create keep-alive task: {e}");
                    false
                }
            }
        } else {
            log::debug!("Disabling keep-alive task");
            if let Some(Worker { tx, handle }) = guard.take() {
                while !handle.is_finished() {
                    let _ = tx.send_timeout(KeepAliveMessage::Shutdown, Duration::from_millis(10));
                    thread::sleep(Duration::from_millis(10));
                }
                let _ = handle.join();
            }
            true
        }
    }

    /// Record collar activity. Best-effort: returns false when the worker
    /// is running but its queue stayed full past the timeout. A disabled
    /// worker swallows updates silently.
    pub fn notify_activity(&self, shocker: KnownShocker) -> bool {
        match self.worker.lock().unwrap().as_ref() {
            Some(worker) => worker
                .tx
                .send_timeout(
                    KeepAliveMessage::Activity(shocker),
                    Duration::from_millis(RF_ENQUEUE_TIMEOUT_MS),
                )
                .is_ok(),
            None => true,
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        if self.is_enabled() {
            self.set_enabled(false);
        }
    }
}

fn keep_alive_worker(
    transmitter: Arc<Mutex<Option<RfTransmitter>>>,
    rx: crossbeam_channel::Receiver<KeepAliveMessage>,
    interval: Duration,
) {
    log::info!("Keep-alive task started");

    let mut activity: HashMap<u16, KnownShocker> = HashMap::new();
    let mut next_wake = Instant::now() + interval;

    loop {
        // Doze until the earliest keep-alive is due, folding in activity
        // updates as they arrive.
        loop {
            let timeout = next_wake
                .saturating_duration_since(Instant::now())
                .min(interval);
            match rx.recv_timeout(timeout) {
                Ok(KeepAliveMessage::Activity(shocker)) => {
                    next_wake = next_wake.min(shocker.last_activity + interval);
                    activity.insert(shocker.shocker_id, shocker);
                }
                Ok(KeepAliveMessage::Shutdown) => {
                    log::info!("Keep-alive task stopping");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        let now = Instant::now();
        next_wake = now + interval;

        for shocker in activity.values_mut() {
            if shocker.last_activity + interval < now {
                log::debug!("Sending keep-alive for shocker {}", shocker.shocker_id);

                let sent = match transmitter.lock().unwrap().as_ref() {
                    Some(tx) => tx.send_command(
                        shocker.model,
                        shocker.shocker_id,
                        CommandKind::Vibrate,
                        0,
                        KEEP_ALIVE_DURATION_MS,
                        false,
                    ),
                    None => {
                        log::warn!("RF transmitter is not initialized, ignoring keep-alive");
                        break;
                    }
                };
                if !sent {
                    log::warn!("Failed to send keep-alive for shocker {}", shocker.shocker_id);
                }

                shocker.last_activity = now;
            }

            next_wake = next_wake.min(shocker.last_activity + interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rf::encoders;
    use crate::rf::transmitter::test_support::RecordingRadio;

    fn transmitter_with_radio() -> (Arc<Mutex<Option<RfTransmitter>>>, RecordingRadio) {
        let radio = RecordingRadio::new();
        let tx = RfTransmitter::new(Box::new(radio.clone())).unwrap();
        (Arc::new(Mutex::new(Some(tx))), radio)
    }

    #[test]
    fn enable_disable_lifecycle() {
        let (transmitter, _radio) = transmitter_with_radio();
        let keep_alive = KeepAlive::with_interval(transmitter, Duration::from_millis(50));

        assert!(!keep_alive.is_enabled());
        assert!(keep_alive.set_enabled(true));
        assert!(keep_alive.is_enabled());
        // Idempotent
        assert!(keep_alive.set_enabled(true));
        assert!(keep_alive.set_enabled(false));
        assert!(!keep_alive.is_enabled());
    }

    #[test]
    fn idle_shocker_gets_periodic_keep_alives() {
        let (transmitter, radio) = transmitter_with_radio();
        let interval = Duration::from_millis(120);
        let keep_alive = KeepAlive::with_interval(Arc::clone(&transmitter), interval);
        assert!(keep_alive.set_enabled(true));

        let registered_at = Instant::now();
        assert!(keep_alive.notify_activity(KnownShocker {
            model: ShockerModel::CaiXianlin,
            shocker_id: 9,
            last_activity: registered_at,
        }));

        thread::sleep(Duration::from_millis(500));
        keep_alive.set_enabled(false);

        let zero = encoders::zero_sequence(ShockerModel::CaiXianlin, 9);
        let emissions: Vec<Instant> = radio
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, t)| *t == zero)
            .map(|(at, _)| *at)
            .collect();

        assert!(
            !emissions.is_empty(),
            "an idle shocker must receive keep-alives"
        );
        // First keep-alive lands one interval after the registered activity,
        // give or take scheduling jitter.
        let first = emissions[0].duration_since(registered_at);
        assert!(
            first >= interval && first < interval + Duration::from_millis(120),
            "first keep-alive at {first:?}, expected ≈{interval:?}"
        );
    }

    #[test]
    fn disabled_worker_swallows_activity() {
        let (transmitter, radio) = transmitter_with_radio();
        let keep_alive = KeepAlive::with_interval(transmitter, Duration::from_millis(30));

        assert!(keep_alive.notify_activity(KnownShocker {
            model: ShockerModel::CaiXianlin,
            shocker_id: 1,
            last_activity: Instant::now(),
        }));
        thread::sleep(Duration::from_millis(120));
        assert!(radio.log.lock().unwrap().is_empty());
    }
}
