//! Accelerator selection for ONNX Runtime sessions.
//!
//! Probes run in a fixed priority order (CUDA, then Metal through CoreML,
//! then CPU) and are evaluated once when the model is loaded.

use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
};
use tracing::{debug, info};

use crate::config::Device;

/// The device chosen for inference and the providers that target it.
pub struct Accelerator {
    /// Device the sessions will run on.
    pub device: Device,
    /// Execution providers to register. Empty means the default CPU provider.
    pub providers: Vec<ExecutionProviderDispatch>,
}

impl std::fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accelerator")
            .field("device", &self.device)
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl Accelerator {
    /// Plain CPU execution.
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            providers: Vec::new(),
        }
    }

    /// Walks [`probe_order`] for `preferred` and keeps the first device
    /// whose execution provider reports itself available.
    pub fn select(preferred: Device) -> Self {
        for &device in probe_order(preferred) {
            match probe(device) {
                Some(provider) => {
                    info!(device = %device, "using accelerator");
                    return Self {
                        device,
                        providers: vec![provider],
                    };
                }
                None if device == Device::Cpu => break,
                None => debug!(device = %device, "accelerator not available"),
            }
        }

        info!(device = %Device::Cpu, "using accelerator");
        Self::cpu()
    }
}

/// Devices to try, in order, for a configured preference.
///
/// The list always ends with [`Device::Cpu`].
pub fn probe_order(preferred: Device) -> &'static [Device] {
    match preferred {
        Device::Auto => &[Device::Cuda, Device::Metal, Device::Cpu],
        Device::Cuda => &[Device::Cuda, Device::Cpu],
        Device::Metal => &[Device::Metal, Device::Cpu],
        Device::Cpu => &[Device::Cpu],
    }
}

/// Returns a provider for `device` if its runtime is usable on this machine.
fn probe(device: Device) -> Option<ExecutionProviderDispatch> {
    match device {
        Device::Cuda => {
            let cuda = CUDAExecutionProvider::default();
            cuda.is_available().unwrap_or(false).then(|| cuda.build())
        }
        Device::Metal => {
            let coreml = CoreMLExecutionProvider::default();
            coreml.is_available().unwrap_or(false).then(|| coreml.build())
        }
        Device::Cpu | Device::Auto => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_probe_order_ends_with_cpu() {
        for device in [Device::Auto, Device::Cpu, Device::Cuda, Device::Metal] {
            assert_eq!(probe_order(device).last(), Some(&Device::Cpu));
        }
    }

    #[test]
    fn auto_prefers_gpu_backends() {
        assert_eq!(
            probe_order(Device::Auto),
            &[Device::Cuda, Device::Metal, Device::Cpu]
        );
    }

    #[test]
    fn explicit_device_is_tried_before_cpu() {
        assert_eq!(probe_order(Device::Metal), &[Device::Metal, Device::Cpu]);
        assert_eq!(probe_order(Device::Cpu), &[Device::Cpu]);
    }

    #[test]
    fn cpu_selection_has_no_providers() {
        let accel = Accelerator::select(Device::Cpu);
        assert_eq!(accel.device, Device::Cpu);
        assert!(accel.providers.is_empty());
    }
}
