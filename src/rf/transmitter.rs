// Barksense — RF Transmitter
//
// Owns the radio and a bounded pending-command channel drained by a single
// worker thread. Each live command is re-emitted until its expiry, then the
// model's zero sequence goes out once and the entry lingers through a short
// grace window before removal. Pulse emission is blocking by design: a
// sequence is atomic on air and commands never interleave.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TryRecvError};

use crate::config::{RF_ENQUEUE_TIMEOUT_MS, RF_QUEUE_SIZE, STACK_RF_TX, TRANSMIT_END_GRACE_MS};
use crate::drivers::radio::RadioDevice;
use crate::rf::pulse::PulseTrain;
use crate::rf::{encoders, CommandKind, ShockerModel};

/// A queued command inside the transmitter.
#[derive(Debug)]
pub(crate) struct PendingTx {
    /// Wall-clock expiry of the repeated transmission.
    until: Instant,
    /// Live waveform; cleared once the zero sequence has gone out.
    active: PulseTrain,
    /// Per-model stop waveform emitted after expiry.
    zero: PulseTrain,
    shocker_id: u16,
    overwrite: bool,
}

pub(crate) enum TxMessage {
    Command(PendingTx),
    Shutdown,
}

/// The worker's in-flight commands, at most one per shocker ID.
#[derive(Default)]
struct PendingList {
    entries: Vec<PendingTx>,
}

impl PendingList {
    /// The coordination rule of the whole engine: a shocker has at most one
    /// pending entry, and an incoming command for a busy shocker replaces
    /// the old entry only when the new command asks to overwrite.
    fn upsert(&mut self, cmd: PendingTx) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.shocker_id == cmd.shocker_id)
        {
            if cmd.overwrite {
                *existing = cmd;
            }
            return;
        }
        self.entries.push(cmd);
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct RfTransmitter {
    cmd_tx: Sender<TxMessage>,
    cmd_rx: Receiver<TxMessage>,
    worker: Option<JoinHandle<()>>,
}

impl RfTransmitter {
    pub fn new(radio: Box<dyn RadioDevice>) -> anyhow::Result<Self> {
        let (cmd_tx, cmd_rx) = bounded(RF_QUEUE_SIZE);
        let worker_rx = cmd_rx.clone();
        let worker = thread::Builder::new()
            .name("rf-tx".into())
            .stack_size(STACK_RF_TX)
            .spawn(move || transmit_worker(radio, worker_rx))?;

        Ok(Self {
            cmd_tx,
            cmd_rx,
            worker: Some(worker),
        })
    }

    /// Encode and enqueue one command. Returns false when the queue stayed
    /// full past the enqueue timeout or the worker is gone.
    pub fn send_command(
        &self,
        model: ShockerModel,
        shocker_id: u16,
        kind: CommandKind,
        intensity: u8,
        duration_ms: u16,
        overwrite: bool,
    ) -> bool {
        let cmd = PendingTx {
            until: Instant::now() + Duration::from_millis(duration_ms as u64),
            active: encoders::sequence(model, shocker_id, kind, intensity),
            zero: encoders::zero_sequence(model, shocker_id),
            shocker_id,
            overwrite,
        };

        match self.cmd_tx.send_timeout(
            TxMessage::Command(cmd),
            Duration::from_millis(RF_ENQUEUE_TIMEOUT_MS),
        ) {
            Ok(()) => true,
            Err(_) => {
                log::error!("RF queue full — dropping command for shocker {shocker_id}");
                false
            }
        }
    }

    /// Drain the command channel, discarding every queued entry.
    pub fn clear_pending(&self) {
        log::info!("Clearing pending commands");
        while self.cmd_rx.try_recv().is_ok() {}
    }
}

impl Drop for RfTransmitter {
    fn drop(&mut self) {
        // Poison the worker, then wait for it to wind down.
        loop {
            match self
                .cmd_tx
                .send_timeout(TxMessage::Shutdown, Duration::from_millis(10))
            {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(_)) => continue,
                Err(SendTimeoutError::Disconnected(_)) => break,
            }
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn transmit_worker(mut radio: Box<dyn RadioDevice>, rx: Receiver<TxMessage>) {
    log::debug!("RF transmit worker running");

    let mut pending = PendingList::default();
    'main: loop {
        // Block only while idle; with work in flight, poll and move on.
        let mut msg = if pending.is_empty() {
            match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            }
        } else {
            match rx.try_recv() {
                Ok(msg) => Some(msg),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        };

        while let Some(m) = msg {
            match m {
                TxMessage::Shutdown => {
                    log::debug!("RF transmit worker stopping");
                    pending.clear();
                    break 'main;
                }
                TxMessage::Command(cmd) => pending.upsert(cmd),
            }
            msg = rx.try_recv().ok();
        }

        let mut transmitted = false;
        let mut i = 0;
        while i < pending.entries.len() {
            let now = Instant::now();
            let cmd = &mut pending.entries[i];
            let expired = cmd.until < now;

            if expired || cmd.active.is_empty() {
                if !cmd.active.is_empty() {
                    // One zero sequence stops the receiver; the entry then
                    // idles through the grace window.
                    if let Err(e) = radio.transmit(&cmd.zero) {
                        log::warn!("Zero sequence transmit failed: {e}");
                    }
                    cmd.active.clear();
                    transmitted = true;
                }
                if cmd.until + Duration::from_millis(TRANSMIT_END_GRACE_MS) < now {
                    pending.entries.remove(i);
                    continue;
                }
            } else {
                if let Err(e) = radio.transmit(&cmd.active) {
                    log::warn!("Transmit failed for shocker {}: {e}", cmd.shocker_id);
                }
                transmitted = true;
            }
            i += 1;
        }

        if !transmitted && !pending.is_empty() {
            // Nothing on air, entries still in grace — don't spin.
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Radio double that records every train and simulates its airtime.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingRadio {
        pub log: Arc<Mutex<Vec<(Instant, PulseTrain)>>>,
    }

    impl RecordingRadio {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn trains(&self) -> Vec<PulseTrain> {
            self.log.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl RadioDevice for RecordingRadio {
        fn transmit(&mut self, train: &PulseTrain) -> anyhow::Result<()> {
            self.log.lock().unwrap().push((Instant::now(), train.clone()));
            thread::sleep(Duration::from_micros(train.total_duration_us()));
            Ok(())
        }
    }
}
