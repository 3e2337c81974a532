// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

[WgpuDevice] owns a `wgpu::Device` and its queue, and implements both [super::DeviceSession]
and [super::ShaderCompiler] (for WGSL).  Every call submits its work and polls the device
until it completes, so the blocking contract of the traits holds on native targets.
*/

mod bound_device;
mod shader;

pub use bound_device::{DeviceConfig, WgpuDevice};
pub use shader::CompiledModule;

/// Rounds `len` up to the copy alignment wgpu requires.
pub(crate) const fn copy_aligned(len: u64) -> u64 {
    len.div_ceil(::wgpu::COPY_BUFFER_ALIGNMENT) * ::wgpu::COPY_BUFFER_ALIGNMENT
}
