// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Backend contracts.

Device selection, command queues and native allocation live behind [DeviceSession].  Shader
compilation lives behind [ShaderCompiler].  Everything above this module is written against
these two traits.
*/

use std::fmt::Debug;
use std::ops::Range;

use crate::bindings::{BufferKind, HeapType};
use crate::native::{Native, NativeHandle};
use crate::translation::ShaderSource;

pub mod software;
#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub mod wgpu;

pub use software::{SoftwareCompiler, SoftwareDevice};

/// Errors that cross the native boundary.  None of these are retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("No such adapter")]
    NoSuchAdapter,
    #[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
    #[error("Can't create device {0}")]
    RequestDevice(#[from] ::wgpu::RequestDeviceError),
    #[error("Can't allocate {requested} bytes: {reason}")]
    Allocation { requested: usize, reason: String },
    #[error("Buffer {0:?} is not allocated on this device")]
    UnknownBuffer(RawBufferId),
    #[error("Can't map buffer: {0}")]
    Map(String),
    #[error("Can't copy buffer: {0}")]
    Copy(String),
}

/// Diagnostic from a failed shader compile.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("Can't compile {entry_point}: {diagnostic}")]
pub struct CompileError {
    pub entry_point: String,
    pub diagnostic: String,
}

/// Device-side identity of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawBufferId(pub(crate) u64);

#[derive(Debug, Clone, Copy)]
pub struct AllocationDescriptor<'a> {
    pub byte_len: usize,
    pub kind: BufferKind,
    pub heap: HeapType,
    pub label: &'a str,
}

//whether a mapping is read back into the device when released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAccess {
    Read,
    /// Contents are loaded and written back on unmap, so bytes the caller does not touch
    /// keep their prior value.
    Write,
}

type WriteBack<'a> = Box<dyn FnOnce(&[u8]) -> Result<(), Error> + 'a>;

/**
A CPU-visible window into a buffer.

The window holds a host copy of the mapped bytes.  For [MapAccess::Write] the copy goes back to
the device on [MappedRegion::unmap].  Dropping a write mapping without unmapping still writes
back, but can only log a failure.
*/
#[must_use = "Unmap the region to observe write-back failures"]
pub struct MappedRegion<'a> {
    bytes: Vec<u8>,
    window: Range<usize>,
    access: MapAccess,
    write_back: Option<WriteBack<'a>>,
}

impl<'a> MappedRegion<'a> {
    /// `bytes` may be wider than the caller asked for (backends often need aligned copies);
    /// `window` selects the requested part.  The write-back receives all of `bytes`.
    pub fn new(
        bytes: Vec<u8>,
        window: Range<usize>,
        access: MapAccess,
        write_back: impl FnOnce(&[u8]) -> Result<(), Error> + 'a,
    ) -> Self {
        assert!(window.end <= bytes.len(), "Window outside mapped bytes");
        MappedRegion {
            bytes,
            window,
            access,
            write_back: Some(Box::new(write_back)),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.window.clone()]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[self.window.clone()]
    }

    pub fn access(&self) -> MapAccess {
        self.access
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Releases the mapping, writing back if it was mapped for writing.
    pub fn unmap(mut self) -> Result<(), Error> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), Error> {
        match self.write_back.take() {
            Some(write_back) if self.access == MapAccess::Write => write_back(&self.bytes),
            _ => Ok(()),
        }
    }
}

impl Drop for MappedRegion<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            logwise::error_sync!(
                "MappedRegion dropped and write-back failed: {err}",
                err = logwise::privacy::LogIt(&err)
            );
        }
    }
}

impl Debug for MappedRegion<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("window", &self.window)
            .field("access", &self.access)
            .finish()
    }
}

/**
The device a buffer lives on.

Implementations block the calling thread until the requested work is complete.  Callers must
not map the same allocation from several threads at once.
*/
pub trait DeviceSession: Send + Sync + Debug {
    fn allocate(&self, descriptor: &AllocationDescriptor<'_>) -> Result<RawBufferId, Error>;
    /// Frees an allocation.  Unknown ids are ignored.
    fn release(&self, buffer: RawBufferId);
    /// Maps `range` (in bytes) of `buffer`.
    fn map(
        &self,
        buffer: RawBufferId,
        range: Range<usize>,
        access: MapAccess,
    ) -> Result<MappedRegion<'_>, Error>;
    /// Copies the first `byte_len` bytes of `source` into `destination`, and waits for it.
    fn copy_and_wait(
        &self,
        source: RawBufferId,
        destination: RawBufferId,
        byte_len: usize,
    ) -> Result<(), Error>;
}

/// Turns shading-language source into a native handle.
pub trait ShaderCompiler {
    type Handle: NativeHandle;
    fn compile(&self, source: &ShaderSource) -> Result<Native<Self::Handle>, CompileError>;
}
