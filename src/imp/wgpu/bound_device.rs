// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use ::wgpu::{BufferDescriptor, BufferUsages, CommandEncoderDescriptor, Limits, MapMode, PollType, Trace};

use super::copy_aligned;
use crate::bindings::BufferKind;
use crate::imp::{AllocationDescriptor, DeviceSession, Error, MapAccess, MappedRegion, RawBufferId};

/// How to pick and open an adapter.
#[derive(Debug, Clone)]
pub struct DeviceConfig<'a> {
    pub label: &'a str,
    pub power_preference: ::wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
    pub limits: Limits,
}

impl Default for DeviceConfig<'static> {
    fn default() -> Self {
        DeviceConfig {
            label: "compute_kernels device",
            power_preference: Default::default(),
            force_fallback_adapter: false,
            limits: Limits::downlevel_defaults(),
        }
    }
}

#[derive(Debug)]
pub struct WgpuDevice {
    pub(super) device: ::wgpu::Device,
    queue: ::wgpu::Queue,
    buffers: Mutex<HashMap<RawBufferId, ::wgpu::Buffer>>,
    next_id: AtomicU64,
}

impl WgpuDevice {
    pub async fn new(config: &DeviceConfig<'_>) -> Result<Self, Error> {
        let instance = ::wgpu::Instance::new(&::wgpu::InstanceDescriptor::default());
        let options = ::wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            force_fallback_adapter: config.force_fallback_adapter,
            compatible_surface: None,
        };
        let adapter = instance
            .request_adapter(&options)
            .await
            .map_err(|_| Error::NoSuchAdapter)?;
        let descriptor = ::wgpu::DeviceDescriptor {
            label: Some(config.label),
            required_features: adapter.features() & ::wgpu::Features::SHADER_F16,
            required_limits: config.limits.clone(),
            memory_hints: Default::default(),
            trace: Trace::Off,
        };
        let (device, queue) = adapter.request_device(&descriptor).await?;
        logwise::info_sync!(
            "Opened wgpu device on {adapter}",
            adapter = logwise::privacy::LogIt(&adapter.get_info())
        );
        Ok(WgpuDevice {
            device,
            queue,
            buffers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// [WgpuDevice::new], blocking the calling thread.
    pub fn new_blocking(config: &DeviceConfig<'_>) -> Result<Self, Error> {
        test_executors::sleep_on(Self::new(config))
    }

    fn buffer(&self, id: RawBufferId) -> Result<::wgpu::Buffer, Error> {
        self.buffers
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownBuffer(id))
    }

    fn wait(&self) -> Result<(), String> {
        self.device
            .poll(PollType::Wait)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    //copies an aligned range into host memory through a MAP_READ staging buffer
    fn read_back(&self, buffer: &::wgpu::Buffer, range: Range<u64>) -> Result<Vec<u8>, Error> {
        let len = range.end - range.start;
        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("compute_kernels readback"),
            size: len,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(buffer, range.start, &staging, 0, len);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.wait().map_err(Error::Map)?;
        receiver
            .recv()
            .map_err(|_| Error::Map("map callback never ran".to_string()))?
            .map_err(|e| Error::Map(e.to_string()))?;
        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}

impl DeviceSession for WgpuDevice {
    fn allocate(&self, descriptor: &AllocationDescriptor<'_>) -> Result<RawBufferId, Error> {
        let size = copy_aligned(descriptor.byte_len as u64);
        let max = self.device.limits().max_buffer_size;
        if size > max {
            return Err(Error::Allocation {
                requested: descriptor.byte_len,
                reason: format!("device limit is {max} bytes"),
            });
        }
        let role = match descriptor.kind {
            BufferKind::Constant => BufferUsages::UNIFORM,
            BufferKind::Structured | BufferKind::ReadWrite => BufferUsages::STORAGE,
        };
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(descriptor.label),
            size,
            usage: role | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = RawBufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.buffers.lock().unwrap().insert(id, buffer);
        Ok(id)
    }

    fn release(&self, buffer: RawBufferId) {
        if let Some(buffer) = self.buffers.lock().unwrap().remove(&buffer) {
            buffer.destroy();
        }
    }

    fn map(
        &self,
        buffer: RawBufferId,
        range: Range<usize>,
        access: MapAccess,
    ) -> Result<MappedRegion<'_>, Error> {
        let wgpu_buffer = self.buffer(buffer)?;
        let align = ::wgpu::COPY_BUFFER_ALIGNMENT;
        let start = range.start as u64 / align * align;
        let end = copy_aligned(range.end as u64);
        if end > wgpu_buffer.size() {
            return Err(Error::Map(format!(
                "range {range:?} outside a buffer of {} bytes",
                wgpu_buffer.size()
            )));
        }
        logwise::trace_sync!(
            "WgpuDevice::map {start}..{end}",
            start = start,
            end = end
        );
        let bytes = self.read_back(&wgpu_buffer, start..end)?;
        let skip = range.start - start as usize;
        Ok(MappedRegion::new(
            bytes,
            skip..skip + range.len(),
            access,
            move |bytes: &[u8]| {
                self.queue.write_buffer(&wgpu_buffer, start, bytes);
                self.queue.submit(std::iter::empty());
                self.wait().map_err(Error::Map)
            },
        ))
    }

    fn copy_and_wait(
        &self,
        source: RawBufferId,
        destination: RawBufferId,
        byte_len: usize,
    ) -> Result<(), Error> {
        let source = self.buffer(source)?;
        let destination = self.buffer(destination)?;
        let len = copy_aligned(byte_len as u64);
        if len > source.size() || len > destination.size() {
            return Err(Error::Copy(format!(
                "{len} bytes exceed source ({}) or destination ({})",
                source.size(),
                destination.size()
            )));
        }
        let copy = logwise::perfwarn_begin!("WgpuDevice::copy_and_wait");
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("compute_kernels copy"),
            });
        encoder.copy_buffer_to_buffer(&source, 0, &destination, 0, len);
        self.queue.submit(std::iter::once(encoder.finish()));
        let waited = self.wait().map_err(Error::Copy);
        drop(copy);
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    //these need an adapter; they skip when none is present
    fn device() -> Option<WgpuDevice> {
        WgpuDevice::new_blocking(&DeviceConfig::default()).ok()
    }

    #[test]
    fn map_roundtrip_on_unaligned_range() {
        let Some(device) = device() else {
            return;
        };
        let id = device
            .allocate(&AllocationDescriptor {
                byte_len: 10,
                kind: BufferKind::Structured,
                heap: Default::default(),
                label: "unaligned",
            })
            .unwrap();
        let mut region = device.map(id, 3..7, MapAccess::Write).unwrap();
        region.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        region.unmap().unwrap();
        let region = device.map(id, 0..10, MapAccess::Read).unwrap();
        assert_eq!(region.as_slice(), &[0, 0, 0, 1, 2, 3, 4, 0, 0, 0]);
    }
}
