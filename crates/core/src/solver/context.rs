//! GPU context and initialization
//!
//! This module handles GPU device initialization and capability detection.
//! It distinguishes between "no GPU found" (expected on headless machines and
//! CI) and "GPU found but failed to initialize" (potential driver issue).

/// Result of GPU initialization attempt
///
/// This enum distinguishes between different failure modes:
/// - `NoGpuFound`: No compatible GPU adapter (quiet fallback to CPU)
/// - `InitFailed`: GPU found but initialization failed (log warning)
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

impl GpuInitResult {
    /// Human-readable reason the GPU is not usable, `None` on success
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            #[cfg(feature = "gpu")]
            Self::Success(_) => None,
            Self::NoGpuFound => Some("no compatible GPU adapter found".to_string()),
            Self::InitFailed {
                adapter_name,
                error,
            } => Some(format!("GPU '{adapter_name}' failed to initialize: {error}")),
        }
    }
}

#[cfg(feature = "gpu")]
mod gpu_impl {
    use super::GpuInitResult;
    use tracing::{debug, info};

    /// Storage buffers of N×N cells allocated by the density pipeline, counted
    /// in `f32` lanes (packed velocity counts twice)
    const FIELD_LANES: u64 = 9;

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

            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = match pollster::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                },
            )) {
                Ok(a) => {
                    debug!("Found GPU adapter: {}", a.get_info().name);
                    a
                }
                Err(e) => {
                    debug!("No GPU adapter found: {}", e);
                    return GpuInitResult::NoGpuFound;
                }
            };

            let adapter_info = adapter.get_info();
            let adapter_name = adapter_info.name.clone();

            // Device creation can fail even with a valid adapter
            match pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
                label: Some("PlumeSim GPU"),
                ..Default::default()
            })) {
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

        /// Get adapter name for logging
        #[must_use]
        pub fn adapter_name(&self) -> &str {
            &self.adapter_info.name
        }

        /// Check if the device can hold the density pipeline for an N×N grid
        ///
        /// Every storage buffer must fit in a single binding, the whole set must
        /// stay under half of the device buffer limit, and one dispatch must
        /// cover the grid.
        ///
        /// # Arguments
        ///
        /// * `size` - Grid size N
        #[must_use]
        pub fn can_allocate(&self, size: usize) -> bool {
            let Ok(n) = u64::try_from(size) else {
                return false;
            };
            let cells = n.saturating_mul(n);
            let field_bytes = cells.saturating_mul(4);
            // Packed vec2 velocity is the largest single buffer
            let largest_binding = field_bytes.saturating_mul(2);
            let total = field_bytes.saturating_mul(FIELD_LANES);

            let limits = self.device.limits();
            let workgroups = n.div_ceil(16);

            largest_binding <= u64::from(limits.max_storage_buffer_binding_size)
                && total < limits.max_buffer_size / 2
                && workgroups <= u64::from(limits.max_compute_workgroups_per_dimension)
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

        /// Consume the context, handing the device and queue to a solver
        #[must_use]
        pub fn into_device_queue(self) -> (wgpu::Device, wgpu::Queue, wgpu::AdapterInfo) {
            (self.device, self.queue, self.adapter_info)
        }
    }

}

#[cfg(feature = "gpu")]
pub use gpu_impl::GpuContext;
