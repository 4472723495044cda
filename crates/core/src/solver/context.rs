//! Execution context and GPU initialization
//!
//! `ExecutionContext` is the caller's explicit choice of strategy. There is no
//! automatic fallback: if the requested device cannot be acquired, construction
//! fails with `DeviceUnavailable` and the caller decides what to do.
//!
//! GPU initialization distinguishes between "no GPU found" (expected on
//! headless machines) and "GPU found but failed to initialize" (potential
//! driver issue), so the error message says which one happened.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExecutionContext {
    /// Single thread, row-major sweep
    #[default]
    Sequential,
    /// Rayon pool, one task per row
    ThreadPool {
        /// Worker count; `None` (or `Some(0)`) lets rayon pick
        threads: Option<usize>,
    },
    /// One compute-shader invocation per cell (`gpu` feature)
    Gpu,
}

/// Strategy actually running, reported by every executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Single-threaded CPU
    Sequential,
    /// Rayon thread pool
    ThreadPool,
    /// wgpu compute
    Gpu,
}

impl Backend {
    /// Whether sweeps run on a device other than the host CPU
    #[must_use]
    pub fn is_gpu_accelerated(self) -> bool {
        self == Self::Gpu
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sequential => "sequential",
            Self::ThreadPool => "thread-pool",
            Self::Gpu => "gpu",
        };
        f.write_str(name)
    }
}

/// Result of GPU initialization attempt
///
/// This enum distinguishes between different failure modes:
/// - `NoGpuFound`: No compatible GPU adapter
/// - `InitFailed`: GPU found but device creation failed
#[derive(Debug)]
pub enum GpuInitResult {
    /// GPU initialized successfully
    #[cfg(feature = "gpu")]
    Success(GpuContext),
    /// No GPU adapter found
    NoGpuFound,
    /// GPU found but initialization failed
    InitFailed {
        /// Name of the adapter that failed
        adapter_name: String,
        /// Error message
        error: String,
    },
}

// All GPU-specific code is conditionally compiled only when "gpu" feature is enabled
#[cfg(feature = "gpu")]
mod gpu_impl {
    use super::GpuInitResult;
    use tracing::{debug, info};

    /// Cells per workgroup edge; must match `@workgroup_size` in the shader
    pub(crate) const WORKGROUP_EDGE: u32 = 16;

    /// GPU context managing device and queue
    #[derive(Debug)]
    pub struct GpuContext {
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: wgpu::AdapterInfo,
    }

    impl GpuContext {
        /// Initialize GPU context
        ///
        /// # Returns
        ///
        /// - `GpuInitResult::Success` - GPU ready to use
        /// - `GpuInitResult::NoGpuFound` - No compatible GPU adapter
        /// - `GpuInitResult::InitFailed` - GPU found but initialization failed
        #[allow(clippy::new_ret_no_self)]
        pub fn new() -> GpuInitResult {
            info!("Attempting to initialize GPU context");

            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = if let Some(a) =
                pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })) {
                debug!("Found GPU adapter: {}", a.get_info().name);
                a
            } else {
                debug!("No GPU adapter found");
                return GpuInitResult::NoGpuFound;
            };

            let adapter_info = adapter.get_info();
            let adapter_name = adapter_info.name.clone();

            // Device creation can fail even with a valid adapter
            match pollster::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Schrodinger GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )) {
                Ok((device, queue)) => {
                    info!("GPU context initialized successfully: {}", adapter_name);
                    GpuInitResult::Success(Self {
                        device,
                        queue,
                        adapter_info,
                    })
                }
                Err(e) => {
                    debug!("Failed to create GPU device: {}", e);
                    GpuInitResult::InitFailed {
                        adapter_name,
                        error: e.to_string(),
                    }
                }
            }
        }

        /// GPU adapter name (e.g., "NVIDIA `GeForce` GTX 1660")
        #[must_use]
        pub fn adapter_name(&self) -> &str {
            &self.adapter_info.name
        }

        /// Check the device limits admit a `width × height` lattice
        ///
        /// # Returns
        ///
        /// `Err` with a human-readable reason when a limit is exceeded
        pub fn check_capacity(&self, width: u32, height: u32) -> Result<(), String> {
            check_limits(&self.device.limits(), width, height)
        }

        /// Get reference to wgpu device
        #[must_use]
        pub fn device(&self) -> &wgpu::Device {
            &self.device
        }

        /// Get reference to wgpu queue
        #[must_use]
        pub fn queue(&self) -> &wgpu::Queue {
            &self.queue
        }
    }

    /// Check `limits` admit a `width × height` lattice
    ///
    /// Each plane is bound as one storage buffer, readback stages both planes
    /// in one buffer, and the dispatch needs `ceil(n / 16)` workgroups along
    /// each axis.
    pub(crate) fn check_limits(limits: &wgpu::Limits, width: u32, height: u32) -> Result<(), String> {
        let plane_bytes = 4 * u64::from(width) * u64::from(height);
        let staging_bytes = 2 * plane_bytes;

        if plane_bytes > u64::from(limits.max_storage_buffer_binding_size) {
            return Err(format!(
                "{width}x{height} plane needs {plane_bytes} bytes, storage binding limit is {}",
                limits.max_storage_buffer_binding_size
            ));
        }
        if staging_bytes > limits.max_buffer_size {
            return Err(format!(
                "{width}x{height} readback needs {staging_bytes} bytes, buffer limit is {}",
                limits.max_buffer_size
            ));
        }
        let groups = width.div_ceil(WORKGROUP_EDGE).max(height.div_ceil(WORKGROUP_EDGE));
        if groups > limits.max_compute_workgroups_per_dimension {
            return Err(format!(
                "{width}x{height} grid needs {groups} workgroups per axis, limit is {}",
                limits.max_compute_workgroups_per_dimension
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_limits_cover_readback_buffer() {
            // 256x256 plane = 256 KiB, readback = 512 KiB
            let limits = wgpu::Limits {
                max_storage_buffer_binding_size: 1 << 20,
                max_buffer_size: 384 << 10,
                ..wgpu::Limits::default()
            };
            let err = check_limits(&limits, 256, 256).unwrap_err();
            assert!(err.contains("readback"), "{err}");
            assert!(check_limits(&limits, 192, 192).is_ok());
        }

        #[test]
        fn test_limits_cover_storage_binding_and_workgroups() {
            let limits = wgpu::Limits {
                max_storage_buffer_binding_size: 1 << 16,
                max_compute_workgroups_per_dimension: 4,
                ..wgpu::Limits::default()
            };
            assert!(check_limits(&limits, 128, 129).unwrap_err().contains("storage binding"));
            assert!(check_limits(&limits, 80, 16).unwrap_err().contains("workgroups"));
            assert!(check_limits(&limits, 64, 64).is_ok());
        }

        #[test]
        fn test_gpu_init_returns_valid_result() {
            // Which variant we get depends on hardware availability
            match GpuContext::new() {
                GpuInitResult::Success(ctx) => {
                    assert!(!ctx.adapter_name().is_empty());
                    assert!(ctx.check_capacity(64, 64).is_ok());
                }
                GpuInitResult::NoGpuFound => {}
                GpuInitResult::InitFailed {
                    adapter_name,
                    error,
                } => {
                    assert!(!adapter_name.is_empty());
                    assert!(!error.is_empty());
                }
            }
        }

        #[test]
        fn test_capacity_rejects_huge_grid() {
            if let GpuInitResult::Success(ctx) = GpuContext::new() {
                assert!(ctx.check_capacity(1 << 20, 1 << 20).is_err());
            }
        }
    }
}

#[cfg(feature = "gpu")]
pub(crate) use gpu_impl::WORKGROUP_EDGE;
#[cfg(feature = "gpu")]
pub use gpu_impl::GpuContext;
