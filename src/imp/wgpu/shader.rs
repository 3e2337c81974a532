// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use ::wgpu::{ErrorFilter, ShaderModuleDescriptor};

use super::WgpuDevice;
use crate::imp::{CompileError, ShaderCompiler};
use crate::native::{Native, NativeHandle};
use crate::translation::{Dialect, ShaderSource};

/// A validated shader module.
#[derive(Debug)]
pub struct CompiledModule {
    module: ::wgpu::ShaderModule,
    entry_point: String,
}

impl CompiledModule {
    pub fn module(&self) -> &::wgpu::ShaderModule {
        &self.module
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

impl NativeHandle for CompiledModule {
    fn release(self) {
        drop(self.module);
    }
}

impl ShaderCompiler for WgpuDevice {
    type Handle = CompiledModule;

    fn compile(&self, source: &ShaderSource) -> Result<Native<CompiledModule>, CompileError> {
        let fail = |diagnostic: String| CompileError {
            entry_point: source.entry_point().to_string(),
            diagnostic,
        };
        if source.dialect() != Dialect::Wgsl {
            return Err(fail(format!(
                "wgpu consumes WGSL, not {:?}",
                source.dialect()
            )));
        }
        self.device.push_error_scope(ErrorFilter::Validation);
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(source.entry_point()),
            source: ::wgpu::ShaderSource::Wgsl(source.text().into()),
        });
        if let Some(error) = test_executors::sleep_on(self.device.pop_error_scope()) {
            return Err(fail(error.to_string()));
        }
        Ok(Native::new(CompiledModule {
            module,
            entry_point: source.entry_point().to_string(),
        }))
    }
}
