//! Compile-time backend selection for the demo binaries.
//!
//! `--features cuda` takes precedence over `--features wgpu`; without either the
//! demos run on the NdArray CPU backend, which is also what the unit tests use.
//! The model is only run forward here, so none of the backends is wrapped in
//! `Autodiff`.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        use burn::backend::cuda::{Cuda, CudaDevice};

        /// Backend the demos run the model on.
        pub type SelectedBackend = Cuda;
        /// Device type of [`SelectedBackend`].
        pub type SelectedDevice = CudaDevice;

        /// First CUDA device.
        pub fn create_device() -> SelectedDevice {
            CudaDevice::default()
        }

        /// Human-readable backend name for log lines and benchmark reports.
        pub const fn get_backend_name() -> &'static str {
            "CUDA (NVIDIA GPU)"
        }
    } else if #[cfg(feature = "wgpu")] {
        use burn::backend::wgpu::{Wgpu, WgpuDevice};

        /// Backend the demos run the model on.
        pub type SelectedBackend = Wgpu;
        /// Device type of [`SelectedBackend`].
        pub type SelectedDevice = WgpuDevice;

        /// Best available adapter as picked by wgpu.
        pub fn create_device() -> SelectedDevice {
            WgpuDevice::default()
        }

        /// Human-readable backend name for log lines and benchmark reports.
        pub const fn get_backend_name() -> &'static str {
            "WGPU (GPU)"
        }
    } else {
        use burn::backend::ndarray::{NdArray, NdArrayDevice};

        /// Backend the demos run the model on.
        pub type SelectedBackend = NdArray<f32>;
        /// Device type of [`SelectedBackend`].
        pub type SelectedDevice = NdArrayDevice;

        /// The CPU.
        pub fn create_device() -> SelectedDevice {
            NdArrayDevice::Cpu
        }

        /// Human-readable backend name for log lines and benchmark reports.
        pub const fn get_backend_name() -> &'static str {
            "NdArray (CPU)"
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::prelude::*;
    use unet_psa::UNetPsaConfig;

    use super::*;

    #[cfg(not(any(feature = "cuda", feature = "wgpu")))]
    #[test]
    fn default_features_select_the_cpu_backend() {
        assert_eq!(get_backend_name(), "NdArray (CPU)");
    }

    #[test]
    fn selected_backend_runs_the_model() {
        let device = create_device();
        let model = UNetPsaConfig::new().init::<SelectedBackend>(&device).unwrap();

        let input = Tensor::<SelectedBackend, 4>::zeros([1, 3, 16, 16], &device);
        let prediction = model.predict(input).unwrap();
        assert_eq!(prediction.dims(), [1, 1, 16, 16]);
    }
}
