//! Backend selection by cargo feature: `cuda`, then `wgpu`, then the
//! default `ndarray` CPU backend.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        use burn::backend::cuda::{Cuda, CudaDevice};

        pub type SelectedBackend = Cuda;
        pub type SelectedDevice = CudaDevice;

        const BACKEND_NAME: &str = "cuda";
    } else if #[cfg(feature = "wgpu")] {
        use burn::backend::wgpu::{Wgpu, WgpuDevice};

        pub type SelectedBackend = Wgpu;
        pub type SelectedDevice = WgpuDevice;

        const BACKEND_NAME: &str = "wgpu";
    } else {
        use burn::backend::ndarray::{NdArray, NdArrayDevice};

        pub type SelectedBackend = NdArray;
        pub type SelectedDevice = NdArrayDevice;

        const BACKEND_NAME: &str = "ndarray";
    }
}

/// Autodiff wrapper of the selected backend, used for training.
pub type TrainingBackend = burn::backend::Autodiff<SelectedBackend>;

pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

/// Backend name for the startup log line.
pub const fn get_backend_name() -> &'static str {
    BACKEND_NAME
}
