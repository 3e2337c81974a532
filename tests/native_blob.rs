// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Ownership of compiled shader handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use compute_kernels::imp::{CompileError, ShaderCompiler, SoftwareCompiler};
use compute_kernels::keywords::Dialect;
use compute_kernels::native::{self, Native, NativeHandle};
use compute_kernels::translation::{Kernel, ShaderSource};

#[derive(Debug)]
struct Module {
    releases: Arc<AtomicUsize>,
}

impl NativeHandle for Module {
    fn release(self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

//hands out counted modules, or refuses every source
struct CountingCompiler {
    releases: Arc<AtomicUsize>,
    refuse: bool,
}

impl ShaderCompiler for CountingCompiler {
    type Handle = Module;

    fn compile(&self, source: &ShaderSource) -> Result<Native<Module>, CompileError> {
        if self.refuse {
            return Err(CompileError {
                entry_point: source.entry_point().to_string(),
                diagnostic: "refused".to_string(),
            });
        }
        Ok(Native::new(Module {
            releases: self.releases.clone(),
        }))
    }
}

fn compiler(refuse: bool) -> (CountingCompiler, Arc<AtomicUsize>) {
    let releases = Arc::new(AtomicUsize::new(0));
    (
        CountingCompiler {
            releases: releases.clone(),
            refuse,
        },
        releases,
    )
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn dispose_is_idempotent() {
    let (compiler, releases) = compiler(false);
    let source = Kernel::new("main").emit(Dialect::Wgsl).unwrap();
    let mut module = source.compile(&compiler).unwrap();
    assert!(!module.is_disposed());
    module.dispose();
    module.dispose();
    assert!(module.is_disposed());
    drop(module);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn drop_releases_once() {
    let (compiler, releases) = compiler(false);
    let source = Kernel::new("main").emit(Dialect::Hlsl).unwrap();
    {
        let _first = source.compile(&compiler).unwrap();
        let _second = source.compile(&compiler).unwrap();
    }
    assert_eq!(releases.load(Ordering::SeqCst), 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn handle_after_dispose_is_refused() {
    let source = Kernel::new("r#loop").emit(Dialect::Wgsl).unwrap();
    assert_eq!(source.entry_point(), "reserved_loop");
    let mut blob = source.compile(&SoftwareCompiler).unwrap();
    assert!(!blob.handle().unwrap().is_empty());
    blob.dispose();
    assert_eq!(blob.handle().unwrap_err(), native::Error::Disposed);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn failed_compile_owns_nothing() {
    let (compiler, releases) = compiler(true);
    let source = Kernel::new("main").emit(Dialect::Hlsl).unwrap();
    let err = source.compile(&compiler).unwrap_err();
    assert_eq!(err.entry_point, "main");
    assert_eq!(err.diagnostic, "refused");
    assert_eq!(releases.load(Ordering::SeqCst), 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn moved_owner_releases_once() {
    let (compiler, releases) = compiler(false);
    let source = Kernel::new("main").emit(Dialect::Wgsl).unwrap();
    let module = source.compile(&compiler).unwrap();
    let owners = vec![module];
    assert_eq!(releases.load(Ordering::SeqCst), 0);
    drop(owners);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}
