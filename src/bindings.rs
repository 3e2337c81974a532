// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Defines buffer types and their byte layouts */

pub mod buffer;
pub mod buffer_kind;
pub mod element;
pub mod padding;
pub mod staging;

pub use buffer::Buffer;
pub use buffer_kind::{BufferConfig, BufferKind, HeapType};
pub use element::{ElementDescriptor, FieldDescriptor, ScalarType, ShaderElement, ShaderType};
pub use staging::StagingPool;

use crate::imp;

/// Buffer errors.
///
/// Everything except [Error::Native] is a usage error: the caller broke a precondition and
/// nothing was read or written.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Range {offset}..{offset}+{count} is outside a buffer of {len} elements")]
    OutOfRange {
        offset: usize,
        count: usize,
        len: usize,
    },
    #[error("Slice of {available} elements can't hold {needed}")]
    SliceTooShort { needed: usize, available: usize },
    #[error("Source buffer has {source_len} elements, destination has {destination_len}")]
    LengthMismatch {
        source_len: usize,
        destination_len: usize,
    },
    #[error("{operation} is only valid inside a kernel, not from host code")]
    InvalidExecutionContext { operation: &'static str },
    #[error("Zero-sized buffers are not allowed")]
    ZeroSized,
    #[error("Buffer of {len} elements of {stride} bytes overflows the address space")]
    TooLarge { len: usize, stride: usize },
    #[error(transparent)]
    Native(#[from] imp::Error),
}
