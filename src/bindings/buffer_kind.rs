// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Buffer kinds, memory visibility, and the layout strategy each kind uses.
//!
//! The set of kinds is closed.  Each kind looks up its [LayoutStrategy] in a static table
//! rather than overriding read and write paths individually.

use super::padding;

/// How a kernel sees a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Read-only from kernels, 16-byte element stride.
    ///
    /// Kernels read fields of a constant buffer; they cannot index it.
    Constant,
    /// Read-only array from kernels, tightly packed.
    Structured,
    /// Read-write (unordered access) array from kernels, tightly packed.
    ReadWrite,
}

impl BufferKind {
    pub(crate) fn layout(self) -> &'static LayoutStrategy {
        match self {
            BufferKind::Constant => &PADDED,
            BufferKind::Structured | BufferKind::ReadWrite => &FLAT,
        }
    }

    /// Whether kernels may write to buffers of this kind.
    pub fn is_writable_by_kernel(self) -> bool {
        matches!(self, BufferKind::ReadWrite)
    }
}

/// Memory visibility of a buffer.
///
/// Backends may use this to place memory; it never changes the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeapType {
    /// Device-local memory.
    #[default]
    Default,
    /// Memory optimized for host writes.
    Upload,
    /// Memory optimized for host reads.
    Readback,
}

/// Stride and codecs for one kind.  Codecs take `(device, host, element_size, stride)`.
pub(crate) struct LayoutStrategy {
    pub(crate) stride: fn(usize) -> usize,
    pub(crate) read: fn(&[u8], &mut [u8], usize, usize),
    pub(crate) write: fn(&mut [u8], &[u8], usize, usize),
}

static PADDED: LayoutStrategy = LayoutStrategy {
    stride: padding::padded_stride,
    read: padding::read_strided,
    write: padding::write_strided,
};

static FLAT: LayoutStrategy = LayoutStrategy {
    stride: padding::unpadded_stride,
    read: padding::read_flat,
    write: padding::write_flat,
};

/**
Describes a buffer to allocate.

```
use compute_kernels::bindings::{BufferConfig, BufferKind, HeapType};
let config = BufferConfig::new(BufferKind::Constant)
    .heap(HeapType::Upload)
    .debug_name("params");
assert_eq!(config.kind, BufferKind::Constant);
```
*/
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig<'a> {
    pub kind: BufferKind,
    pub heap: HeapType,
    pub debug_name: &'a str,
}

impl<'a> BufferConfig<'a> {
    pub fn new(kind: BufferKind) -> Self {
        BufferConfig {
            kind,
            heap: HeapType::Default,
            debug_name: "",
        }
    }

    pub fn heap(mut self, heap: HeapType) -> Self {
        self.heap = heap;
        self
    }

    pub fn debug_name(mut self, debug_name: &'a str) -> Self {
        self.debug_name = debug_name;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_constant_is_padded() {
        assert_eq!((BufferKind::Constant.layout().stride)(20), 32);
        assert_eq!((BufferKind::Structured.layout().stride)(20), 20);
        assert_eq!((BufferKind::ReadWrite.layout().stride)(20), 20);
    }

    #[test]
    fn writability() {
        assert!(BufferKind::ReadWrite.is_writable_by_kernel());
        assert!(!BufferKind::Constant.is_writable_by_kernel());
        assert!(!BufferKind::Structured.is_writable_by_kernel());
    }
}
