// Barksense — voice-responsive feedback controller for RF training collars.
//
// A microphone is sampled continuously over I2S; A-weighted sound pressure
// level is measured over short windows; a periodic evaluation cycle grades
// each window against a configurable threshold and dispatches programmable
// feedback sequences (beep, vibrate, shock) to COTS collar receivers by
// bit-banging vendor waveforms on an RF GPIO pin.
//
// The crate core is hardware-free and host-testable; the ESP-IDF glue
// (RMT radio, I2S capture, firmware entry point) sits behind the `esp32`
// cargo feature.

pub mod audio;
pub mod config;
pub mod drivers;
pub mod events;
pub mod rf;
pub mod settings;
pub mod tasks;
pub mod telemetry;

pub use events::{Event, WindowStats};
pub use rf::handler::CommandHandler;
pub use rf::{CommandKind, ShockerModel};
pub use settings::{AppSettings, SettingsService};
pub use telemetry::{MicState, MicStateService};
