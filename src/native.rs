// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Exclusive ownership of native resources, such as compiled shader blobs.

[Native] is move-only.  Dropping it releases the handle; [Native::dispose] releases it early.
Either way [NativeHandle::release] runs at most once, because it consumes the handle.
*/

use std::fmt::{Debug, Formatter};

/// A resource that must be released through a specific call.
pub trait NativeHandle {
    /// Releases the underlying resource.
    fn release(self);
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("native handle used after it was disposed")]
    Disposed,
}

/// Sole owner of a native handle.
#[must_use = "Dropping a Native releases the handle immediately"]
pub struct Native<H: NativeHandle> {
    handle: Option<H>,
}

impl<H: NativeHandle> Native<H> {
    /// Takes ownership of `handle`.
    pub fn new(handle: H) -> Self {
        Native {
            handle: Some(handle),
        }
    }

    /// The wrapped handle, for passing to other native calls.
    pub fn handle(&self) -> Result<&H, Error> {
        self.handle.as_ref().ok_or(Error::Disposed)
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_none()
    }

    /// Releases the handle now.  Later calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
    }
}

impl<H: NativeHandle> Drop for Native<H> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<H: NativeHandle + Debug> Debug for Native<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.handle {
            Some(handle) => f.debug_tuple("Native").field(handle).finish(),
            None => f.write_str("Native(<disposed>)"),
        }
    }
}

/**
Compiled shader bytecode held in host memory.
*/
#[derive(Debug, PartialEq, Eq)]
pub struct Bytecode {
    bytes: Box<[u8]>,
}

impl Bytecode {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Bytecode {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl NativeHandle for Bytecode {
    fn release(self) {
        drop(self.bytes);
    }
}
