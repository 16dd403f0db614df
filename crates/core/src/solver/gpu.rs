//! GPU-based density solver implementation
//!
//! This module provides a GPU implementation of the `DensitySolver` trait using
//! wgpu compute shaders and storage buffers. This backend is only available when
//! the `gpu` feature is enabled.
//!
//! # Shader Files
//!
//! GPU compute shaders are located in `shaders/`:
//! - `inject.wgsl` - Source injection with saturation at 255
//! - `jacobi.wgsl` - One relaxation sweep for the diffusion solve
//! - `boundary.wgsl` - Edge mirroring, corners and obstacle zeroing
//! - `advect.wgsl` - Semi-Lagrangian advection with the obstacle fallback
//! - `decay.wgsl` - Exponential decay and clamping
//!
//! # Implementation
//!
//! Density lives in a pair of storage buffers used as ping-pong targets plus a
//! snapshot buffer holding the diffusion source term. Every pass of a tick is
//! recorded into one command encoder. Results reach host memory only when the
//! step asks for it; otherwise the host copy stays stale until the next
//! synchronising step or an explicit `synchronize`.

use super::context::GpuContext;
use super::cpu::MAX_DENSITY;
use super::r#trait::{DensitySolver, DensityStepInput};
use crate::error::SimError;
use crate::grid::{BoundaryKind, FieldData, ObstacleMask};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

/// Shared shader parameters (must match the WGSL `Params` struct layout)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct DensityParams {
    n: u32,
    kind: u32,
    _pad0: u32,
    _pad1: u32,
    a: f32,
    c: f32,
    dt0: f32,
    decay: f32,
}

/// Workgroup edge length (defined in shaders)
const WORKGROUP_SIZE: u32 = 16;

/// One pipeline with a bind group per ping-pong orientation
struct Stage {
    pipeline: wgpu::ComputePipeline,
    bind_groups: [wgpu::BindGroup; 2],
}

/// GPU-based density solver using wgpu compute shaders
pub struct GpuDensitySolver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,

    size: usize,
    n: u32,
    iterations: usize,

    // Ping-pong density pair and the diffusion source snapshot
    density: [wgpu::Buffer; 2],
    snapshot: wgpu::Buffer,
    velocity: wgpu::Buffer,
    obstacle_words: wgpu::Buffer,
    injection: wgpu::Buffer,
    staging: wgpu::Buffer,
    params_buffer: wgpu::Buffer,

    inject: Stage,
    jacobi: Stage,
    boundary: Stage,
    advect: Stage,
    decay: Stage,

    // Index of the buffer holding the current density
    current: usize,

    obstacles: ObstacleMask,
    velocity_packed: Vec<[f32; 2]>,
    host: FieldData,
    host_stale: bool,
}

impl GpuDensitySolver {
    /// Create a new GPU density solver
    ///
    /// Allocates buffers, compiles shaders and records the bind groups for both
    /// ping-pong orientations.
    ///
    /// # Arguments
    ///
    /// * `context` - GPU context with device and queue
    /// * `size` - Grid size N
    /// * `iterations` - Jacobi sweeps per diffusion solve
    ///
    /// # Errors
    ///
    /// Returns `SimError::GpuUnavailable` when the device cannot hold an N×N
    /// grid or when pipeline creation reports a validation error.
    pub fn new(context: GpuContext, size: usize, iterations: usize) -> Result<Self, SimError> {
        if !context.can_allocate(size) {
            return Err(SimError::GpuUnavailable(format!(
                "GPU '{}' has insufficient resources for a {size}x{size} grid",
                context.adapter_name()
            )));
        }
        let n = u32::try_from(size)
            .map_err(|_| SimError::GpuUnavailable(format!("grid size {size} exceeds u32")))?;
        let (device, queue, adapter_info) = context.into_device_queue();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let cells = size * size;
        let zeros = vec![0.0_f32; cells];
        let zero_velocity = vec![[0.0_f32; 2]; cells];
        let clear_words = vec![0_u32; cells];
        let field_usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;

        let make_field = |label: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&zeros),
                usage: field_usage,
            })
        };

        let density = [make_field("Density A"), make_field("Density B")];
        let snapshot = make_field("Density Snapshot");
        let injection = make_field("Injection");

        let velocity = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Velocity"),
            contents: bytemuck::cast_slice(&zero_velocity),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let obstacle_words = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Obstacles"),
            contents: bytemuck::cast_slice(&clear_words),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Density Staging"),
            size: (cells * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = DensityParams {
            n,
            kind: BoundaryKind::Scalar.shader_code(),
            _pad0: 0,
            _pad1: 0,
            a: 0.0,
            c: 1.0,
            dt0: 0.0,
            decay: 1.0,
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Density Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let inject_pipeline = create_pipeline(
            &device,
            "Inject Pipeline",
            wgpu::include_wgsl!("shaders/inject.wgsl"),
        );
        let jacobi_pipeline = create_pipeline(
            &device,
            "Jacobi Pipeline",
            wgpu::include_wgsl!("shaders/jacobi.wgsl"),
        );
        let boundary_pipeline = create_pipeline(
            &device,
            "Boundary Pipeline",
            wgpu::include_wgsl!("shaders/boundary.wgsl"),
        );
        let advect_pipeline = create_pipeline(
            &device,
            "Advect Pipeline",
            wgpu::include_wgsl!("shaders/advect.wgsl"),
        );
        let decay_pipeline = create_pipeline(
            &device,
            "Decay Pipeline",
            wgpu::include_wgsl!("shaders/decay.wgsl"),
        );

        // Orientation i reads density[i] and writes density[1 - i]
        let inject = Stage::new(&device, inject_pipeline, "Inject", &|i| {
            vec![
                params_buffer.as_entire_binding(),
                density[i].as_entire_binding(),
                injection.as_entire_binding(),
                obstacle_words.as_entire_binding(),
            ]
        });
        let jacobi = Stage::new(&device, jacobi_pipeline, "Jacobi", &|i| {
            vec![
                params_buffer.as_entire_binding(),
                density[i].as_entire_binding(),
                snapshot.as_entire_binding(),
                density[1 - i].as_entire_binding(),
                obstacle_words.as_entire_binding(),
            ]
        });
        let boundary = Stage::new(&device, boundary_pipeline, "Boundary", &|i| {
            vec![
                params_buffer.as_entire_binding(),
                density[i].as_entire_binding(),
                obstacle_words.as_entire_binding(),
            ]
        });
        let advect = Stage::new(&device, advect_pipeline, "Advect", &|i| {
            vec![
                params_buffer.as_entire_binding(),
                density[i].as_entire_binding(),
                density[1 - i].as_entire_binding(),
                velocity.as_entire_binding(),
                obstacle_words.as_entire_binding(),
            ]
        });
        let decay = Stage::new(&device, decay_pipeline, "Decay", &|i| {
            vec![
                params_buffer.as_entire_binding(),
                density[i].as_entire_binding(),
                obstacle_words.as_entire_binding(),
            ]
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(SimError::GpuUnavailable(format!(
                "GPU pipeline creation failed: {error}"
            )));
        }

        debug!(
            "GPU density solver ready on {} ({}x{} grid, {} sweeps)",
            adapter_info.name, size, size, iterations
        );

        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            size,
            n,
            iterations,
            density,
            snapshot,
            velocity,
            obstacle_words,
            injection,
            staging,
            params_buffer,
            inject,
            jacobi,
            boundary,
            advect,
            decay,
            current: 0,
            obstacles: ObstacleMask::new(size),
            velocity_packed: vec![[0.0; 2]; cells],
            host: FieldData::new(size),
            host_stale: false,
        })
    }

    /// Name of the adapter running the solver
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Calculate workgroup count for dispatch
    fn workgroup_count(&self) -> u32 {
        self.n.div_ceil(WORKGROUP_SIZE)
    }

    fn field_bytes(&self) -> u64 {
        (self.size * self.size * std::mem::size_of::<f32>()) as u64
    }

    /// Upload the host copy to both density buffers
    fn upload_host(&mut self) {
        for buffer in &self.density {
            self.queue
                .write_buffer(buffer, 0, bytemuck::cast_slice(self.host.as_slice()));
        }
        self.host_stale = false;
    }

    /// Copy the current density buffer into the host cache
    fn readback(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Density Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &self.density[self.current],
            0,
            &self.staging,
            0,
            self.field_bytes(),
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {
                {
                    let data = buffer_slice.get_mapped_range();
                    self.host.copy_from_slice(bytemuck::cast_slice(&data));
                }
                self.staging.unmap();
                self.host_stale = false;
            }
            Ok(Err(e)) => warn!("Density readback failed to map: {}", e),
            Err(e) => warn!("Density readback channel closed: {}", e),
        }
    }

    fn dispatch(&self, pass: &mut wgpu::ComputePass<'_>, stage: &Stage, orientation: usize) {
        let groups = self.workgroup_count();
        pass.set_pipeline(&stage.pipeline);
        pass.set_bind_group(0, &stage.bind_groups[orientation], &[]);
        pass.dispatch_workgroups(groups, groups, 1);
    }
}

impl Stage {
    fn new<'a>(
        device: &wgpu::Device,
        pipeline: wgpu::ComputePipeline,
        label: &str,
        resources: &dyn Fn(usize) -> Vec<wgpu::BindingResource<'a>>,
    ) -> Self {
        let layout = pipeline.get_bind_group_layout(0);
        let bind_groups = [0, 1].map(|orientation| {
            let entries: Vec<wgpu::BindGroupEntry<'_>> = resources(orientation)
                .into_iter()
                .zip(0_u32..)
                .map(|(resource, binding)| wgpu::BindGroupEntry { binding, resource })
                .collect();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &entries,
            })
        });
        Self {
            pipeline,
            bind_groups,
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: wgpu::ShaderModuleDescriptor<'_>,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(shader);
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: None,
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    })
}

impl DensitySolver for GpuDensitySolver {
    fn step_density(&mut self, input: &DensityStepInput<'_>) {
        let coeffs = &input.coefficients;

        for ((packed, &u), &v) in self
            .velocity_packed
            .iter_mut()
            .zip(input.velocity_x.as_slice())
            .zip(input.velocity_y.as_slice())
        {
            *packed = [u, v];
        }
        self.queue.write_buffer(
            &self.velocity,
            0,
            bytemuck::cast_slice(&self.velocity_packed),
        );
        self.queue.write_buffer(
            &self.injection,
            0,
            bytemuck::cast_slice(input.injection.as_slice()),
        );

        let a = coeffs.diffusion_a;
        let params = DensityParams {
            n: self.n,
            kind: BoundaryKind::Scalar.shader_code(),
            _pad0: 0,
            _pad1: 0,
            a,
            c: 1.0 + 4.0 * a,
            dt0: coeffs.dt0,
            decay: coeffs.decay,
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Density Step Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Inject Pass"),
                timestamp_writes: None,
            });
            self.dispatch(&mut pass, &self.inject, self.current);
        }

        let mut current = self.current;
        if a > 0.0 {
            encoder.copy_buffer_to_buffer(
                &self.density[current],
                0,
                &self.snapshot,
                0,
                self.field_bytes(),
            );
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Density Pass"),
                timestamp_writes: None,
            });

            if a > 0.0 {
                for _ in 0..self.iterations {
                    self.dispatch(&mut pass, &self.jacobi, current);
                    current = 1 - current;
                    self.dispatch(&mut pass, &self.boundary, current);
                }
            }

            self.dispatch(&mut pass, &self.advect, current);
            current = 1 - current;
            self.dispatch(&mut pass, &self.boundary, current);

            self.dispatch(&mut pass, &self.decay, current);
        }

        self.queue.submit(Some(encoder.finish()));
        self.current = current;
        self.host_stale = true;

        if input.synchronize {
            self.readback();
        }
    }

    fn set_obstacles(&mut self, obstacles: &ObstacleMask) {
        self.synchronize();
        self.obstacles.clone_from(obstacles);
        self.queue.write_buffer(
            &self.obstacle_words,
            0,
            bytemuck::cast_slice(&self.obstacles.to_words()),
        );
        let mut changed = false;
        for (d, &blocked) in self.host.as_mut_slice().iter_mut().zip(self.obstacles.as_slice()) {
            if blocked && *d != 0.0 {
                *d = 0.0;
                changed = true;
            }
        }
        if changed {
            self.upload_host();
        }
    }

    fn read_density(&self) -> Cow<'_, [f32]> {
        Cow::Borrowed(self.host.as_slice())
    }

    fn write_density(&mut self, density: &[f32]) {
        for ((dst, &src), &blocked) in self
            .host
            .as_mut_slice()
            .iter_mut()
            .zip(density)
            .zip(self.obstacles.as_slice())
        {
            *dst = if blocked { 0.0 } else { src.clamp(0.0, MAX_DENSITY) };
        }
        self.upload_host();
    }

    fn add_density(&mut self, x: usize, y: usize, amount: f32) {
        if self.obstacles.is_blocked(x, y) {
            return;
        }
        self.synchronize();
        let current = self.host.get(x, y);
        self.host.set(x, y, (current + amount).clamp(0.0, MAX_DENSITY));
        self.upload_host();
    }

    fn synchronize(&mut self) {
        if self.host_stale {
            self.readback();
        }
    }

    fn clear(&mut self) {
        self.host.fill(0.0);
        self.upload_host();
    }

    fn size(&self) -> usize {
        self.size
    }

    fn is_gpu_accelerated(&self) -> bool {
        true
    }
}
