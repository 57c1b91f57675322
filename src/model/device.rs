use candle_core::Device;
use tracing::{debug, info, warn};

use super::error::ModelError;

type Opener = fn() -> candle_core::Result<Device>;

/// Picks the first usable accelerator compiled in (`metal`, then `cuda`), else the CPU.
///
/// Only speed depends on the choice: scores and checkpoints are device independent.
pub fn select_device() -> Result<Device, ModelError> {
    let mut failures = Vec::new();

    for (backend, open) in accelerators() {
        match open() {
            Ok(device) => {
                info!(backend, "Scoring preference model on accelerator");
                return Ok(device);
            }
            Err(e) => {
                warn!(backend, error = %e, "Accelerator unavailable");
                failures.push(format!("{backend}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        debug!("No accelerator backend compiled in, scoring on CPU");
    } else {
        warn!(failures = %failures.join("; "), "No usable accelerator, scoring on CPU");
    }
    Ok(Device::Cpu)
}

fn accelerators() -> Vec<(&'static str, Opener)> {
    #[allow(unused_mut)]
    let mut backends: Vec<(&'static str, Opener)> = Vec::new();
    #[cfg(feature = "metal")]
    backends.push(("metal", open_metal as Opener));
    #[cfg(feature = "cuda")]
    backends.push(("cuda", open_cuda as Opener));
    backends
}

#[cfg(feature = "metal")]
fn open_metal() -> candle_core::Result<Device> {
    Device::new_metal(0)
}

#[cfg(feature = "cuda")]
fn open_cuda() -> candle_core::Result<Device> {
    Device::new_cuda(0)
}
