// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! compute_kernels lets a host program describe GPU compute kernels in ordinary Rust,
translate them into shading-language source, and move structured data between host memory
and GPU memory through typed buffers.

There are two places where getting things slightly wrong is expensive:

| Concern              | What goes wrong                                  | Where it lives           |
|----------------------|--------------------------------------------------|--------------------------|
| Identifier emission  | A host name collides with a shader keyword, and the generated shader fails to compile | [keywords], [translation] |
| Buffer layout        | Constant memory needs 16-byte element strides; a wrong stride silently corrupts what the GPU reads | [bindings] |

# Buffers

[bindings::Buffer] is a GPU allocation bound to one element type.  Every buffer has a
[bindings::BufferKind], and the kind selects a layout strategy:

| Kind       | Stride                                | Host access           |
|------------|---------------------------------------|-----------------------|
| Constant   | element size rounded up to 16 bytes   | read/write, no `get`  |
| Structured | element size                          | read/write            |
| ReadWrite  | element size                          | read/write            |

All operations are synchronous.  A read or write maps the buffer, copies, and unmaps before
returning; a buffer-to-buffer copy blocks until the GPU reports completion.

# Kernels

[translation::Kernel] is a small typed IR.  You build the body of a kernel out of
[translation::Expr] and [translation::Stmt] values, attach buffer bindings, and emit HLSL or
WGSL with [translation::Kernel::emit].  Every user identifier goes through the keyword
mapper, and the emitter refuses kernels that index a constant buffer.

# Backends

The device is a collaborator described by [imp::DeviceSession].  [imp::SoftwareDevice] keeps
allocations in host memory and is always available.  With the `backend_wgpu` feature,
[imp::wgpu::WgpuDevice] allocates real GPU buffers and compiles WGSL.

Compiled shaders are held in [native::Native], which releases its handle exactly once.
*/

pub mod bindings;
pub mod imp;
pub mod keywords;
pub mod native;
pub mod translation;
