use candle_core::Device;
use once_cell::sync::Lazy;
use tracing::{info, warn};

/// Device every network is built on. CUDA when the build and machine support it,
/// otherwise the CPU.
pub static DEVICE: Lazy<Device> = Lazy::new(|| match Device::new_cuda(0) {
    Ok(device) => {
        info!("using CUDA device 0");
        device
    }
    Err(err) => {
        warn!(error = %err, "CUDA unavailable, falling back to CPU");
        Device::Cpu
    }
});
