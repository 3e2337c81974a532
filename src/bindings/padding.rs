// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Byte codecs between a contiguous host array and a (possibly strided) device layout.

Constant memory requires each element to start on a 16-byte boundary.  When the element size
is already a multiple of 16 the layouts coincide and the codecs degrade to one flat copy.
Padding bytes are never written and never read.
*/

/// Per-element alignment of constant memory.
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 16;

/// Element size rounded up to [CONSTANT_BUFFER_ALIGNMENT].
pub const fn padded_stride(element_size: usize) -> usize {
    (element_size + (CONSTANT_BUFFER_ALIGNMENT - 1)) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

pub const fn unpadded_stride(element_size: usize) -> usize {
    element_size
}

/// Copies `host.len() / element_size` elements out of `device`, which holds them every `stride` bytes.
pub fn read_strided(device: &[u8], host: &mut [u8], element_size: usize, stride: usize) {
    debug_assert_eq!(host.len() % element_size, 0);
    if stride == element_size {
        read_flat(device, host, element_size, stride);
        return;
    }
    for (i, element) in host.chunks_exact_mut(element_size).enumerate() {
        let start = i * stride;
        element.copy_from_slice(&device[start..start + element_size]);
    }
}

/// Writes each host element at its strided slot in `device`, leaving the padding alone.
pub fn write_strided(device: &mut [u8], host: &[u8], element_size: usize, stride: usize) {
    debug_assert_eq!(host.len() % element_size, 0);
    if stride == element_size {
        write_flat(device, host, element_size, stride);
        return;
    }
    for (i, element) in host.chunks_exact(element_size).enumerate() {
        let start = i * stride;
        device[start..start + element_size].copy_from_slice(element);
    }
}

pub fn read_flat(device: &[u8], host: &mut [u8], _element_size: usize, _stride: usize) {
    host.copy_from_slice(&device[..host.len()]);
}

pub fn write_flat(device: &mut [u8], host: &[u8], _element_size: usize, _stride: usize) {
    device[..host.len()].copy_from_slice(host);
}
