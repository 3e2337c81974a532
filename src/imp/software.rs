// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A device whose "GPU memory" is host memory.

Useful anywhere a real adapter is unavailable, and as the reference the GPU backends are
checked against.  Allocations start zeroed.
*/

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{
    AllocationDescriptor, CompileError, DeviceSession, Error, MapAccess, MappedRegion,
    RawBufferId, ShaderCompiler,
};
use crate::bindings::{BufferKind, HeapType};
use crate::native::{Bytecode, Native};
use crate::translation::ShaderSource;

#[derive(Debug)]
struct Allocation {
    bytes: Vec<u8>,
    kind: BufferKind,
    heap: HeapType,
    label: String,
}

#[derive(Debug, Default)]
pub struct SoftwareDevice {
    allocations: Mutex<HashMap<RawBufferId, Allocation>>,
    next_id: AtomicU64,
    device_copies: AtomicUsize,
    /// Largest single allocation accepted; `None` is unlimited.
    max_allocation: Option<usize>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that refuses allocations above `max_allocation` bytes.
    pub fn with_max_allocation(max_allocation: usize) -> Self {
        SoftwareDevice {
            max_allocation: Some(max_allocation),
            ..Self::default()
        }
    }

    /// A copy of the raw bytes backing `buffer`, padding included.
    pub fn snapshot(&self, buffer: RawBufferId) -> Option<Vec<u8>> {
        self.allocations
            .lock()
            .unwrap()
            .get(&buffer)
            .map(|a| a.bytes.clone())
    }

    /// Number of allocations that have not been released.
    pub fn live_allocations(&self) -> usize {
        self.allocations.lock().unwrap().len()
    }

    /// Number of device-to-device copies performed so far.
    pub fn device_copies(&self) -> usize {
        self.device_copies.load(Ordering::Relaxed)
    }
}

impl DeviceSession for SoftwareDevice {
    fn allocate(&self, descriptor: &AllocationDescriptor<'_>) -> Result<RawBufferId, Error> {
        if let Some(max) = self.max_allocation {
            if descriptor.byte_len > max {
                return Err(Error::Allocation {
                    requested: descriptor.byte_len,
                    reason: format!("limit is {max} bytes"),
                });
            }
        }
        let id = RawBufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        logwise::trace_sync!(
            "software allocate {label} ({bytes} bytes)",
            label = logwise::privacy::LogIt(&descriptor.label),
            bytes = descriptor.byte_len
        );
        self.allocations.lock().unwrap().insert(
            id,
            Allocation {
                bytes: vec![0; descriptor.byte_len],
                kind: descriptor.kind,
                heap: descriptor.heap,
                label: descriptor.label.to_string(),
            },
        );
        Ok(id)
    }

    fn release(&self, buffer: RawBufferId) {
        self.allocations.lock().unwrap().remove(&buffer);
    }

    fn map(
        &self,
        buffer: RawBufferId,
        range: Range<usize>,
        access: MapAccess,
    ) -> Result<MappedRegion<'_>, Error> {
        let bytes = {
            let allocations = self.allocations.lock().unwrap();
            let allocation = allocations
                .get(&buffer)
                .ok_or(Error::UnknownBuffer(buffer))?;
            let window = allocation.bytes.get(range.clone()).ok_or_else(|| {
                Error::Map(format!(
                    "range {range:?} outside {label} ({kind:?}, {heap:?}, {len} bytes)",
                    label = allocation.label,
                    kind = allocation.kind,
                    heap = allocation.heap,
                    len = allocation.bytes.len()
                ))
            })?;
            window.to_vec()
        };
        let len = bytes.len();
        let start = range.start;
        Ok(MappedRegion::new(bytes, 0..len, access, move |bytes: &[u8]| {
            let mut allocations = self.allocations.lock().unwrap();
            let allocation = allocations
                .get_mut(&buffer)
                .ok_or(Error::UnknownBuffer(buffer))?;
            allocation.bytes[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }))
    }

    fn copy_and_wait(
        &self,
        source: RawBufferId,
        destination: RawBufferId,
        byte_len: usize,
    ) -> Result<(), Error> {
        let mut allocations = self.allocations.lock().unwrap();
        let staged = allocations
            .get(&source)
            .ok_or(Error::UnknownBuffer(source))?
            .bytes
            .get(..byte_len)
            .ok_or_else(|| Error::Copy(format!("source is shorter than {byte_len} bytes")))?
            .to_vec();
        let target = allocations
            .get_mut(&destination)
            .ok_or(Error::UnknownBuffer(destination))?
            .bytes
            .get_mut(..byte_len)
            .ok_or_else(|| Error::Copy(format!("destination is shorter than {byte_len} bytes")))?;
        target.copy_from_slice(&staged);
        self.device_copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/**
A compiler for the software device.

It does not lower the source; it checks that the entry point is declared and that brackets
balance, then stores the text as the blob.
*/
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareCompiler;

impl ShaderCompiler for SoftwareCompiler {
    type Handle = Bytecode;

    fn compile(&self, source: &ShaderSource) -> Result<Native<Bytecode>, CompileError> {
        let fail = |diagnostic: String| CompileError {
            entry_point: source.entry_point().to_string(),
            diagnostic,
        };
        let text = source.text();
        if !declares_function(text, source.entry_point()) {
            return Err(fail(format!(
                "entry point {} is not declared",
                source.entry_point()
            )));
        }
        let mut depth: Vec<char> = Vec::new();
        for (line, content) in text.lines().enumerate() {
            for c in content.chars() {
                match c {
                    '(' | '[' | '{' => depth.push(c),
                    ')' | ']' | '}' => {
                        let expected = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        if depth.pop() != Some(expected) {
                            return Err(fail(format!("unbalanced '{c}' on line {}", line + 1)));
                        }
                    }
                    _ => {}
                }
            }
        }
        if let Some(open) = depth.last() {
            return Err(fail(format!("unclosed '{open}'")));
        }
        Ok(Native::new(Bytecode::new(text.as_bytes())))
    }
}

fn declares_function(text: &str, name: &str) -> bool {
    text.match_indices(name).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + name.len()..].trim_start().chars().next();
        !before.is_some_and(|c| c.is_alphanumeric() || c == '_') && after == Some('(')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(byte_len: usize) -> AllocationDescriptor<'static> {
        AllocationDescriptor {
            byte_len,
            kind: BufferKind::Structured,
            heap: HeapType::Default,
            label: "test",
        }
    }

    #[test]
    fn map_write_then_read() {
        let device = SoftwareDevice::new();
        let id = device.allocate(&descriptor(8)).unwrap();
        let mut region = device.map(id, 4..8, MapAccess::Write).unwrap();
        region.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        region.unmap().unwrap();
        assert_eq!(device.snapshot(id).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        let region = device.map(id, 3..6, MapAccess::Read).unwrap();
        assert_eq!(region.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn map_outside_allocation_fails() {
        let device = SoftwareDevice::new();
        let id = device.allocate(&descriptor(4)).unwrap();
        match device.map(id, 2..6, MapAccess::Read) {
            Err(Error::Map(message)) => {
                assert!(message.contains("test (Structured, Default, 4 bytes)"), "{message}")
            }
            other => panic!("expected a map error, got {other:?}"),
        }
    }

    #[test]
    fn release_forgets_allocation() {
        let device = SoftwareDevice::new();
        let id = device.allocate(&descriptor(4)).unwrap();
        assert_eq!(device.live_allocations(), 1);
        device.release(id);
        assert_eq!(device.live_allocations(), 0);
        assert!(matches!(
            device.map(id, 0..4, MapAccess::Read),
            Err(Error::UnknownBuffer(_))
        ));
    }

    #[test]
    fn allocation_limit() {
        let device = SoftwareDevice::with_max_allocation(16);
        assert!(device.allocate(&descriptor(16)).is_ok());
        assert!(matches!(
            device.allocate(&descriptor(17)),
            Err(Error::Allocation { requested: 17, .. })
        ));
    }

    #[test]
    fn copy_between_allocations() {
        let device = SoftwareDevice::new();
        let a = device.allocate(&descriptor(4)).unwrap();
        let b = device.allocate(&descriptor(4)).unwrap();
        let mut region = device.map(a, 0..4, MapAccess::Write).unwrap();
        region.as_mut_slice().copy_from_slice(&[9, 8, 7, 6]);
        region.unmap().unwrap();
        device.copy_and_wait(a, b, 4).unwrap();
        assert_eq!(device.snapshot(b).unwrap(), vec![9, 8, 7, 6]);
        assert_eq!(device.device_copies(), 1);
        assert!(device.copy_and_wait(a, b, 5).is_err());
    }

    #[test]
    fn declared_function_detection() {
        assert!(declares_function("void main(uint3 id)", "main"));
        assert!(declares_function("fn main (@builtin", "main"));
        assert!(!declares_function("void domain(uint3 id)", "main"));
        assert!(!declares_function("int main_value;", "main"));
    }
}
