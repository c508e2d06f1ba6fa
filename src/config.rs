// Barksense — Hardware & System Configuration
// Target: ESP32 (dual-core Xtensa)

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const GPIO_RF_TX: u8 = 21;   // Default RF transmitter output
pub const PIN_I2S_BCLK: i32 = 14; // Mic bit clock (SCK)
pub const PIN_I2S_WS: i32 = 15;   // Mic word select (L/R clock)
pub const PIN_I2S_DATA: i32 = 39; // Mic serial data (input-only pin is fine)

// ---------------------------------------------------------------------------
// RF Engine
// ---------------------------------------------------------------------------
pub const RF_QUEUE_SIZE: usize = 64;        // Pending-command channel bound
pub const RF_ENQUEUE_TIMEOUT_MS: u64 = 10;  // Producer-side send timeout
pub const TRANSMIT_END_GRACE_MS: u64 = 300; // Entry lingers after expiry
pub const STOP_VIBRATE_DURATION_MS: u16 = 300;

pub const KEEP_ALIVE_QUEUE_SIZE: usize = 32;
pub const KEEP_ALIVE_INTERVAL_MS: u64 = 60_000;
pub const KEEP_ALIVE_DURATION_MS: u16 = 300;

/// Collar receiver ID paired with this transmitter.
pub const COLLAR_ID: u16 = 0;

// ---------------------------------------------------------------------------
// Audio Sampling
// ---------------------------------------------------------------------------
pub const SAMPLE_RATE: u32 = 16_000; // Hz, fixed to design of IIR filters
pub const SAMPLE_BITS: u32 = 32;     // bits per raw I2S sample
pub const MIC_BITS: u32 = 24;        // valid bits in I2S data
pub const SAMPLES_SHORT: usize = 1024; // ~64 ms per analysis window
pub const DMA_BANKS: u32 = 8;
pub const DMA_BANK_SIZE: u32 = (SAMPLES_SHORT / 16) as u32; // 64 samples

pub const LEQ_PERIOD: f64 = 0.25; // seconds per Leq averaging period

// Microphone calibration (datasheet values; see audio::spl)
pub const MIC_OFFSET_DB: f64 = 2.0103;  // sine-wave RMS vs. dBFS offset
pub const MIC_SENSITIVITY: f64 = -29.0; // dBFS at MIC_REF_DB
pub const MIC_REF_DB: f64 = 94.0;
pub const MIC_OVERLOAD_DB: f64 = 116.0; // acoustic overload point
pub const MIC_NOISE_DB: f64 = 29.0;     // noise floor

pub const SAMPLES_QUEUE_SIZE: usize = 8; // WindowStats channel bound

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------
pub const EVENTS_QUEUE_SIZE: usize = 10;
pub const ALERT_TIME_MS: u64 = 1500; // pre-action warning window

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_READER: usize = 8192;
pub const STACK_RF_TX: usize = 4096;
pub const STACK_KEEP_ALIVE: usize = 4096;
pub const STACK_EVALUATOR: usize = 8192;
pub const STACK_DISPATCHER: usize = 4096;
