//! GPU step executor
//!
//! This module provides a GPU implementation of the `StepExecutor` trait using
//! a wgpu compute shader and storage buffers. This backend is only available
//! when the `gpu` feature is enabled.
//!
//! # Shader Files
//!
//! - `shaders/leapfrog.wgsl` - one invocation per cell, `out = tgt + coeff · H(src)`
//!
//! # Implementation
//!
//! Each plane lives in a pair of storage buffers (ping-pong). A sweep binds the
//! current source, current target and the idle target buffer as output, runs
//! one compute pass and flips the target's index. Every sweep is its own queue
//! submission, and submissions execute in order, so the end of one dispatch is
//! the barrier before the next. Readback into the host grid happens only in
//! [`StepExecutor::synchronize`], through a persistent staging buffer.

use super::context::{GpuContext, WORKGROUP_EDGE};
use super::stencil::StencilConstants;
use super::{Backend, StepExecutor};
use crate::config::{BoundaryPolicy, SimulationConfig};
use crate::error::{SolverError, SolverResult};
use crate::grid::{Component, GridState};
use bytemuck::{Pod, Zeroable};
use tracing::{debug, info};

/// Sweep shader parameters (must match WGSL struct layout)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct SweepParams {
    width: u32,
    height: u32,
    periodic: u32,
    diagonals: u32,
    center: f32,
    orthogonal: f32,
    diagonal: f32,
    coeff: f32,
}

const REAL: usize = 0;
const IMAG: usize = 1;

fn plane_index(component: Component) -> usize {
    match component {
        Component::Real => REAL,
        Component::Imaginary => IMAG,
    }
}

fn device_error(what: &str, error: impl std::fmt::Display) -> SolverError {
    SolverError::DeviceUnavailable(format!("{what}: {error}"))
}

/// Run `f` inside validation and out-of-memory error scopes
///
/// Errors raised by the device while `f` runs come back as `DeviceUnavailable`.
fn scoped<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> SolverResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(e) => Err(device_error(what, e)),
        None => Ok(value),
    }
}

/// wgpu-backed executor
///
/// GPU resources are acquired in [`GpuExecutor::new`] and released on drop.
pub struct GpuExecutor {
    context: GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    constants: StencilConstants,
    width: u32,
    height: u32,
    plane_bytes: u64,

    // planes[REAL] / planes[IMAG], each a ping-pong pair
    planes: [[wgpu::Buffer; 2]; 2],
    current: [usize; 2],
    potential: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    staging: wgpu::Buffer,
}

impl GpuExecutor {
    /// Compile the pipeline and allocate device buffers
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if the lattice exceeds the device limits or the
    /// device rejects pipeline or buffer creation.
    pub fn new(
        context: GpuContext,
        config: &SimulationConfig,
        width: usize,
        height: usize,
    ) -> SolverResult<Self> {
        let width_u32 = u32::try_from(width).map_err(|e| device_error("grid width", e))?;
        let height_u32 = u32::try_from(height).map_err(|e| device_error("grid height", e))?;
        context
            .check_capacity(width_u32, height_u32)
            .map_err(SolverError::DeviceUnavailable)?;

        let device = context.device();
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/leapfrog.wgsl"));

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Leapfrog Bind Group Layout"),
            entries: &[
                storage_entry(0, true),  // src_plane
                storage_entry(1, true),  // tgt_plane
                storage_entry(2, true),  // potential
                storage_entry(3, false), // out_plane
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Leapfrog Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Leapfrog Compute Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let plane_bytes = 4 * u64::from(width_u32) * u64::from(height_u32);
        let storage = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: plane_bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };

        let planes = [
            [storage("Real Plane A"), storage("Real Plane B")],
            [storage("Imag Plane A"), storage("Imag Plane B")],
        ];
        let potential = storage("Potential");

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Leapfrog Params"),
            size: std::mem::size_of::<SweepParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Readback Buffer"),
            size: 2 * plane_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(device_error("pipeline creation", e));
        }
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(device_error("buffer allocation", e));
        }

        info!(
            "GPU executor ready on {} ({}x{} grid, {} KiB per plane)",
            context.adapter_name(),
            width,
            height,
            plane_bytes / 1024
        );

        Ok(Self {
            constants: StencilConstants::new(config, width, height),
            context,
            pipeline,
            bind_group_layout,
            width: width_u32,
            height: height_u32,
            plane_bytes,
            planes,
            current: [0, 0],
            potential,
            params_buffer,
            staging,
        })
    }

    fn params(&self, coeff: f32) -> SweepParams {
        let k = &self.constants;
        SweepParams {
            width: self.width,
            height: self.height,
            periodic: u32::from(k.boundary == BoundaryPolicy::Periodic),
            diagonals: u32::from(k.diagonals),
            center: k.center,
            orthogonal: k.orthogonal,
            diagonal: k.diagonal,
            coeff,
        }
    }
}

impl StepExecutor for GpuExecutor {
    fn upload(&mut self, grid: &GridState) -> SolverResult<()> {
        SolverError::check_shape(
            (self.constants.width, self.constants.height),
            (grid.width(), grid.height()),
        )?;
        let queue = self.context.queue();
        scoped(self.context.device(), "field upload", || {
            for component in [Component::Real, Component::Imaginary] {
                queue.write_buffer(
                    &self.planes[plane_index(component)][0],
                    0,
                    bytemuck::cast_slice(grid.plane(component).as_slice()),
                );
            }
            queue.write_buffer(
                &self.potential,
                0,
                bytemuck::cast_slice(grid.potential().as_slice()),
            );
        })?;
        self.current = [0, 0];
        debug!("Uploaded {}x{} field to GPU", self.width, self.height);
        Ok(())
    }

    fn sweep(&mut self, _grid: &mut GridState, component: Component, dt: f32) -> SolverResult<()> {
        let params = self.params(component.sign() * dt);
        let device = self.context.device();
        let queue = self.context.queue();

        let t = plane_index(component);
        let s = plane_index(component.partner());
        let src = &self.planes[s][self.current[s]];
        let tgt = &self.planes[t][self.current[t]];
        let out = &self.planes[t][1 - self.current[t]];

        scoped(device, "sweep dispatch", || {
            // Written before this sweep's submission and after the previous one
            queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Leapfrog Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: tgt.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.potential.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: out.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Leapfrog Sweep Encoder"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Leapfrog Sweep Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(
                    self.width.div_ceil(WORKGROUP_EDGE),
                    self.height.div_ceil(WORKGROUP_EDGE),
                    1,
                );
            }
            queue.submit(Some(encoder.finish()));
        })?;

        self.current[t] ^= 1;
        Ok(())
    }

    fn synchronize(&mut self, grid: &mut GridState) -> SolverResult<()> {
        let device = self.context.device();
        let queue = self.context.queue();

        scoped(device, "readback copy", || {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Field Readback Encoder"),
            });
            for (plane, offset) in [(REAL, 0), (IMAG, self.plane_bytes)] {
                encoder.copy_buffer_to_buffer(
                    &self.planes[plane][self.current[plane]],
                    0,
                    &self.staging,
                    offset,
                    self.plane_bytes,
                );
            }
            queue.submit(Some(encoder.finish()));
        })?;

        // Map and wait (blocking)
        let slice = self.staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });
        device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| device_error("readback channel", e))?
            .map_err(|e| device_error("readback mapping", e))?;

        let result = {
            let data = slice.get_mapped_range();
            let values: &[f32] = bytemuck::cast_slice(&data);
            let (real, imag) = values.split_at(values.len() / 2);
            grid.set_field(real, imag)
        };
        self.staging.unmap();
        result
    }

    fn backend(&self) -> Backend {
        Backend::Gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Plane, WavePacket};
    use crate::solver::context::GpuInitResult;
    use crate::solver::{Integrator, SequentialExecutor};

    #[test]
    fn test_scoped_reports_device_errors_if_available() {
        let GpuInitResult::Success(ctx) = GpuContext::new() else {
            return;
        };
        let device = ctx.device();
        let buffer = |usage| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Scoped Test Buffer"),
                size: 256,
                usage,
                mapped_at_creation: false,
            })
        };

        let ok = scoped(device, "valid buffer", || {
            buffer(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST)
        });
        assert!(ok.is_ok());

        // MAP_READ may only be combined with COPY_DST
        let rejected = scoped(device, "invalid buffer", || {
            buffer(wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE)
        });
        match rejected {
            Err(SolverError::DeviceUnavailable(message)) => {
                assert!(message.starts_with("invalid buffer"));
            }
            other => panic!("expected DeviceUnavailable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_gpu_matches_sequential_if_available() {
        let GpuInitResult::Success(ctx) = GpuContext::new() else {
            return;
        };
        let config = SimulationConfig::default();
        let mut cpu_grid = GridState::new(40, 33, 1.0, Plane::new(40, 33)).unwrap();
        cpu_grid.seed_wave_packet(&WavePacket {
            center: (20.0, 16.0),
            width: 3.0,
            momentum: (4.0, 0.0),
        });
        cpu_grid.apply_boundary(config.boundary);
        let mut gpu_grid = cpu_grid.clone();

        let mut cpu = SequentialExecutor::new(&config, 40, 33);
        let mut gpu = GpuExecutor::new(ctx, &config, 40, 33).unwrap();
        gpu.upload(&gpu_grid).unwrap();

        let integrator = Integrator::new(config.dt);
        integrator.advance(&mut cpu, &mut cpu_grid, 20).unwrap();
        integrator.advance(&mut gpu, &mut gpu_grid, 20).unwrap();
        gpu.synchronize(&mut gpu_grid).unwrap();

        for (a, b) in cpu_grid.real().data.iter().zip(&gpu_grid.real().data) {
            assert!((a - b).abs() < 1e-4, "real mismatch: {a} vs {b}");
        }
        for (a, b) in cpu_grid.imag().data.iter().zip(&gpu_grid.imag().data) {
            assert!((a - b).abs() < 1e-4, "imag mismatch: {a} vs {b}");
        }
    }
}
