// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Typed GPU buffers.

A [Buffer] is one device allocation holding `len` elements of one [ShaderElement] type.  The
buffer's [BufferKind] picks the device layout: constant buffers place each element on a 16-byte
boundary, the other kinds pack elements tightly.  Host code never sees the padding; reads and
writes go through the kind's codec.

Every operation blocks until the device work has landed.

```
use std::sync::Arc;
use compute_kernels::bindings::{Buffer, BufferConfig, BufferKind};
use compute_kernels::imp::{DeviceSession, SoftwareDevice};

let device: Arc<dyn DeviceSession> = Arc::new(SoftwareDevice::new());
let buffer = Buffer::<f32>::from_slice(&device, &[1.0, 2.0, 3.0], BufferConfig::new(BufferKind::Constant)).unwrap();
assert_eq!(buffer.stride(), 16);
assert_eq!(buffer.size_in_bytes(), 48);
assert_eq!(buffer.get_data().unwrap(), vec![1.0, 2.0, 3.0]);
```
*/

use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use super::{BufferConfig, BufferKind, Error, HeapType, ShaderElement, StagingPool};
use crate::imp::{AllocationDescriptor, DeviceSession, MapAccess, RawBufferId};
use crate::translation::Binding;

pub struct Buffer<Element: ShaderElement> {
    device: Arc<dyn DeviceSession>,
    raw: RawBufferId,
    len: usize,
    kind: BufferKind,
    heap: HeapType,
    debug_name: String,
    element: PhantomData<Element>,
}

impl<Element: ShaderElement> Buffer<Element> {
    /// Allocates `len` elements on `device`.  Contents start unspecified.
    pub fn new(
        device: &Arc<dyn DeviceSession>,
        len: usize,
        config: BufferConfig<'_>,
    ) -> Result<Self, Error> {
        let element_size = std::mem::size_of::<Element>();
        if len == 0 || element_size == 0 {
            return Err(Error::ZeroSized);
        }
        let stride = (config.kind.layout().stride)(element_size);
        let byte_len = len
            .checked_mul(stride)
            .ok_or(Error::TooLarge { len, stride })?;
        let raw = device.allocate(&AllocationDescriptor {
            byte_len,
            kind: config.kind,
            heap: config.heap,
            label: config.debug_name,
        })?;
        logwise::info_sync!(
            "Allocated {kind} buffer {name}: {len} elements, {bytes} bytes",
            kind = logwise::privacy::LogIt(&config.kind),
            name = logwise::privacy::LogIt(&config.debug_name),
            len = len,
            bytes = byte_len
        );
        Ok(Buffer {
            device: device.clone(),
            raw,
            len,
            kind: config.kind,
            heap: config.heap,
            debug_name: config.debug_name.to_string(),
            element: PhantomData,
        })
    }

    /// Allocates a buffer the length of `data` and uploads it.
    pub fn from_slice(
        device: &Arc<dyn DeviceSession>,
        data: &[Element],
        config: BufferConfig<'_>,
    ) -> Result<Self, Error> {
        let buffer = Self::new(device, data.len(), config)?;
        buffer.set_data(data)?;
        Ok(buffer)
    }

    /// Logical element count.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-length buffers can't be built.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes between consecutive elements on the device.
    pub fn stride(&self) -> usize {
        (self.kind.layout().stride)(std::mem::size_of::<Element>())
    }

    /// Device bytes the elements occupy, padding included.
    pub fn size_in_bytes(&self) -> usize {
        self.len * self.stride()
    }

    pub fn is_padding_present(&self) -> bool {
        self.stride() != std::mem::size_of::<Element>()
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn heap(&self) -> HeapType {
        self.heap
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// Device-side identity, for passing to [DeviceSession] calls directly.
    pub fn raw(&self) -> RawBufferId {
        self.raw
    }

    pub fn device(&self) -> &Arc<dyn DeviceSession> {
        &self.device
    }

    /// Declares this buffer as a kernel parameter named `name`.
    pub fn binding(&self, name: &str) -> Binding {
        Binding::new::<Element>(name, self.kind)
    }

    /// Reads every element into a new vector.
    pub fn get_data(&self) -> Result<Vec<Element>, Error> {
        let mut data = vec![Element::zeroed(); self.len];
        self.get_data_into(&mut data)?;
        Ok(data)
    }

    /// Reads every element into the front of `destination`.
    pub fn get_data_into(&self, destination: &mut [Element]) -> Result<(), Error> {
        self.get_data_range(destination, 0, self.len)
    }

    /// Reads elements `offset..offset + count` into the front of `destination`.
    pub fn get_data_range(
        &self,
        destination: &mut [Element],
        offset: usize,
        count: usize,
    ) -> Result<(), Error> {
        self.check_range(offset, count)?;
        if destination.len() < count {
            return Err(Error::SliceTooShort {
                needed: count,
                available: destination.len(),
            });
        }
        if count == 0 {
            return Ok(());
        }
        let bytes = self.device_range(offset, count);
        logwise::trace_sync!(
            "Buffer::get_data_range {name} bytes {start}..{end}",
            name = logwise::privacy::LogIt(&self.debug_name),
            start = bytes.start,
            end = bytes.end
        );
        let region = self.device.map(self.raw, bytes, MapAccess::Read)?;
        let host: &mut [u8] = bytemuck::cast_slice_mut(&mut destination[..count]);
        (self.kind.layout().read)(
            region.as_slice(),
            host,
            std::mem::size_of::<Element>(),
            self.stride(),
        );
        region.unmap()?;
        Ok(())
    }

    /// Writes all of `source` starting at element 0.
    pub fn set_data(&self, source: &[Element]) -> Result<(), Error> {
        self.set_data_range(source, 0, source.len())
    }

    /// Writes the first `count` elements of `source` at `offset..offset + count`.
    ///
    /// Padding bytes between the written elements keep whatever they held.
    pub fn set_data_range(&self, source: &[Element], offset: usize, count: usize) -> Result<(), Error> {
        self.check_range(offset, count)?;
        if source.len() < count {
            return Err(Error::SliceTooShort {
                needed: count,
                available: source.len(),
            });
        }
        if count == 0 {
            return Ok(());
        }
        let bytes = self.device_range(offset, count);
        logwise::trace_sync!(
            "Buffer::set_data_range {name} bytes {start}..{end}",
            name = logwise::privacy::LogIt(&self.debug_name),
            start = bytes.start,
            end = bytes.end
        );
        let mut region = self.device.map(self.raw, bytes, MapAccess::Write)?;
        let host: &[u8] = bytemuck::cast_slice(&source[..count]);
        (self.kind.layout().write)(
            region.as_mut_slice(),
            host,
            std::mem::size_of::<Element>(),
            self.stride(),
        );
        region.unmap()?;
        Ok(())
    }

    /**
    Copies the contents of `source` into this buffer.

    Buffers of the same kind on the same device share a layout, so the copy stays on the
    device.  Otherwise the data is staged through a host array from [StagingPool::shared].
    */
    pub fn set_data_from(&self, source: &Buffer<Element>) -> Result<(), Error> {
        self.set_data_from_in(source, StagingPool::shared())
    }

    /// Like [Buffer::set_data_from], staging through `pool` when a host copy is needed.
    pub fn set_data_from_in(&self, source: &Buffer<Element>, pool: &StagingPool) -> Result<(), Error> {
        if source.len != self.len {
            return Err(Error::LengthMismatch {
                source_len: source.len,
                destination_len: self.len,
            });
        }
        let same_device = std::ptr::addr_eq(Arc::as_ptr(&self.device), Arc::as_ptr(&source.device));
        if same_device && source.raw == self.raw {
            return Ok(());
        }
        if same_device && source.kind == self.kind {
            let copy = logwise::perfwarn_begin!("Buffer::set_data_from device copy");
            self.device
                .copy_and_wait(source.raw, self.raw, self.size_in_bytes())?;
            drop(copy);
            return Ok(());
        }
        logwise::warn_sync!(
            "Staging copy from {source} ({source_kind}) to {destination} ({destination_kind}) through host memory",
            source = logwise::privacy::LogIt(&source.debug_name),
            source_kind = logwise::privacy::LogIt(&source.kind),
            destination = logwise::privacy::LogIt(&self.debug_name),
            destination_kind = logwise::privacy::LogIt(&self.kind)
        );
        let staged = logwise::perfwarn_begin!("Buffer::set_data_from staged copy");
        let mut staging = pool.rent::<Element>(self.len);
        source.get_data_into(&mut staging)?;
        self.set_data(&staging)?;
        staging.give_back();
        drop(staged);
        Ok(())
    }

    /**
    Reads element `index`.

    Constant buffers refuse with [Error::InvalidExecutionContext]: their elements are read
    inside kernels through fields, and from the host through [Buffer::get_data].
    */
    pub fn get(&self, index: usize) -> Result<Element, Error> {
        if self.kind == BufferKind::Constant {
            return Err(Error::InvalidExecutionContext {
                operation: "indexing a constant buffer",
            });
        }
        let mut element = [Element::zeroed()];
        self.get_data_range(&mut element, index, 1)?;
        Ok(element[0])
    }

    fn check_range(&self, offset: usize, count: usize) -> Result<(), Error> {
        match offset.checked_add(count) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::OutOfRange {
                offset,
                count,
                len: self.len,
            }),
        }
    }

    //the last element's trailing padding is not part of the range
    fn device_range(&self, offset: usize, count: usize) -> Range<usize> {
        let stride = self.stride();
        let start = offset * stride;
        start..start + (count - 1) * stride + std::mem::size_of::<Element>()
    }
}

impl<Element: ShaderElement> Drop for Buffer<Element> {
    fn drop(&mut self) {
        self.device.release(self.raw);
    }
}

impl<Element: ShaderElement> Debug for Buffer<Element> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("debug_name", &self.debug_name)
            .field("element", &std::any::type_name::<Element>())
            .field("len", &self.len)
            .field("kind", &self.kind)
            .field("heap", &self.heap)
            .field("raw", &self.raw)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::SoftwareDevice;

    fn device() -> Arc<dyn DeviceSession> {
        Arc::new(SoftwareDevice::new())
    }

    #[test]
    fn zero_len_rejected() {
        let device = device();
        assert!(matches!(
            Buffer::<u32>::new(&device, 0, BufferConfig::new(BufferKind::Structured)),
            Err(Error::ZeroSized)
        ));
    }

    #[test]
    fn overflowing_len_rejected() {
        let device = device();
        assert!(matches!(
            Buffer::<[f32; 4]>::new(&device, usize::MAX / 8, BufferConfig::new(BufferKind::Constant)),
            Err(Error::TooLarge { stride: 16, .. })
        ));
    }

    #[test]
    fn device_range_skips_trailing_padding() {
        let device = device();
        let buffer = Buffer::<u32>::new(&device, 4, BufferConfig::new(BufferKind::Constant)).unwrap();
        assert_eq!(buffer.device_range(0, 1), 0..4);
        assert_eq!(buffer.device_range(1, 2), 16..36);
        assert!(buffer.is_padding_present());
    }

    #[test]
    fn range_overflow_is_out_of_range() {
        let device = device();
        let buffer = Buffer::<u32>::new(&device, 4, BufferConfig::new(BufferKind::Structured)).unwrap();
        let mut out = [0u32; 1];
        assert!(matches!(
            buffer.get_data_range(&mut out, usize::MAX, 2),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn drop_releases_allocation() {
        let software = Arc::new(SoftwareDevice::new());
        let device: Arc<dyn DeviceSession> = software.clone();
        let buffer = Buffer::<f32>::new(&device, 3, BufferConfig::new(BufferKind::ReadWrite)).unwrap();
        assert_eq!(software.live_allocations(), 1);
        drop(buffer);
        assert_eq!(software.live_allocations(), 0);
    }
}
