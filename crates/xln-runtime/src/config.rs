use std::path::PathBuf;

use xln_core::constants::{SNAPSHOT_INTERVAL_FRAMES, TICK_INTERVAL_MS};

/// Tick cadence, snapshot interval, and data directory, supplied by the
/// embedding caller. No CLI parsing here — wiring that up to a config
/// file or flags is left to the embedder.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub tick_interval_ms: u64,
    pub snapshot_interval_frames: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./xln-data"),
            tick_interval_ms: TICK_INTERVAL_MS,
            snapshot_interval_frames: SNAPSHOT_INTERVAL_FRAMES,
        }
    }
}
