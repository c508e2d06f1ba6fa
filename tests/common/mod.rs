// Shared test doubles for the integration scenarios.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use barksense::drivers::radio::RadioDevice;
use barksense::rf::handler::RadioFactory;
use barksense::rf::pulse::PulseTrain;

/// Radio double that records every transmitted train with a timestamp and
/// blocks for the train's real airtime, like the RMT peripheral does.
#[derive(Clone, Default)]
pub struct RecordingRadio {
    pub log: Arc<Mutex<Vec<(Instant, PulseTrain)>>>,
}

impl RecordingRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trains(&self) -> Vec<PulseTrain> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(_, train)| train.clone())
            .collect()
    }

    pub fn timestamped(&self) -> Vec<(Instant, PulseTrain)> {
        self.log.lock().unwrap().clone()
    }

    pub fn factory(&self) -> RadioFactory {
        let template = self.clone();
        Box::new(move |_pin| Ok(Box::new(template.clone()) as Box<dyn RadioDevice>))
    }
}

impl RadioDevice for RecordingRadio {
    fn transmit(&mut self, train: &PulseTrain) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((Instant::now(), train.clone()));
        thread::sleep(Duration::from_micros(train.total_duration_us()));
        Ok(())
    }
}
