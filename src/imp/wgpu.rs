// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Accelerator backed by a wgpu queue.

Each frame slot owns one set of GPU buffers.  On submission the slot's CPU-side contents are copied
into its buffers with `Queue::write_buffer`, the recorded command buffers are submitted, and the
fence target is recorded by a `on_submitted_work_done` callback.  Waiting polls the device until the
callback has run or the deadline passes.

The accelerator has exactly as many slots as it was created with, and each slot holds at most
[SlotCapacity] elements.  Both are reported to the pipeline, which refuses configurations that do
not fit.  A submission that does not fit anyway is refused whole, before anything is written.

Blocking waits are not available on wasm32.  There the wait polls once and reports
[WaitError::WouldBlock] if the target is still outstanding.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use wgpu::PollType;

use crate::bindings::constants::{
    as_bytes, MaterialConstants, ObjectConstants, PassConstants, WaveVertex,
};
use crate::frames::accelerator::{Accelerator, SlotCapacity, SubmitError, WaitError};
use crate::frames::slot::FrameSlot;
use crate::sys::time::Instant;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("no suitable adapter: {0}")]
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    #[error(transparent)]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
}

/// GPU-side copy of one frame slot.
#[derive(Debug)]
pub struct SlotBuffers {
    pub vertices: wgpu::Buffer,
    pub objects: wgpu::Buffer,
    pub materials: wgpu::Buffer,
    pub pass: wgpu::Buffer,
}

fn create_buffer(device: &wgpu::Device, label: &str, size: usize, usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        //zero-sized bindings are invalid
        size: size.max(16) as u64,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl SlotBuffers {
    fn new(device: &wgpu::Device, index: usize, capacity: SlotCapacity) -> Self {
        SlotBuffers {
            vertices: create_buffer(
                device,
                &format!("slot {index} vertices"),
                capacity.vertices * size_of::<WaveVertex>(),
                wgpu::BufferUsages::VERTEX,
            ),
            objects: create_buffer(
                device,
                &format!("slot {index} objects"),
                capacity.objects * size_of::<ObjectConstants>(),
                wgpu::BufferUsages::STORAGE,
            ),
            materials: create_buffer(
                device,
                &format!("slot {index} materials"),
                capacity.materials * size_of::<MaterialConstants>(),
                wgpu::BufferUsages::STORAGE,
            ),
            pass: create_buffer(
                device,
                &format!("slot {index} pass"),
                size_of::<PassConstants>(),
                wgpu::BufferUsages::UNIFORM,
            ),
        }
    }
}

#[derive(Debug)]
pub struct WgpuAccelerator {
    device: wgpu::Device,
    queue: wgpu::Queue,
    completed: Arc<AtomicU64>,
    slots: Vec<SlotBuffers>,
    capacity: SlotCapacity,
}

impl WgpuAccelerator {
    /// Allocates `slot_count` sets of buffers, each sized for `capacity`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, slot_count: usize, capacity: SlotCapacity) -> Self {
        let slots = (0..slot_count)
            .map(|i| SlotBuffers::new(&device, i, capacity))
            .collect();
        WgpuAccelerator {
            device,
            queue,
            completed: Arc::new(AtomicU64::new(0)),
            slots,
            capacity,
        }
    }

    /// Opens the default adapter without a surface.
    pub async fn headless(slot_count: usize, capacity: SlotCapacity) -> Result<Self, Error> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;
        logwise::info_sync!(
            "headless adapter {info}",
            info = logwise::privacy::LogIt(&adapter.get_info())
        );
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("waves_and_frames"),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            })
            .await?;
        Ok(Self::new(device, queue, slot_count, capacity))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
    /// The buffers slot `index` is uploaded to, for binding in a renderer.
    pub fn slot_buffers(&self, index: usize) -> Option<&SlotBuffers> {
        self.slots.get(index)
    }

    fn upload<T: crate::bindings::constants::CRepr>(&self, buffer: &wgpu::Buffer, values: &[T]) {
        if !values.is_empty() {
            self.queue.write_buffer(buffer, 0, as_bytes(values));
        }
    }
}

impl Accelerator for WgpuAccelerator {
    type Commands = Vec<wgpu::CommandBuffer>;

    fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn wait_for(&self, target: u64, timeout: Duration) -> Result<(), WaitError> {
        let start = Instant::now();
        loop {
            let _ = self.device.poll(PollType::Poll);
            let completed = self.completed_value();
            if completed >= target {
                return Ok(());
            }
            if cfg!(target_arch = "wasm32") {
                return Err(WaitError::WouldBlock { target, completed });
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(WaitError::TimedOut { target, completed });
            }
            std::thread::sleep((timeout - elapsed).min(Duration::from_millis(1)));
        }
    }

    fn submit(
        &self,
        slot: &FrameSlot,
        commands: Vec<wgpu::CommandBuffer>,
        fence_target: u64,
    ) -> Result<(), SubmitError> {
        let buffers = self
            .slots
            .get(slot.index())
            .ok_or(SubmitError::NoSuchSlot { slot: slot.index() })?;
        self.capacity.check(SlotCapacity::of_slot(slot))?;
        self.upload(&buffers.vertices, slot.vertices());
        self.upload(&buffers.objects, slot.objects().as_slice());
        self.upload(&buffers.materials, slot.materials().as_slice());
        self.upload(&buffers.pass, std::slice::from_ref(slot.pass()));
        self.queue.submit(commands);
        //registered after submit so it tracks this submission
        let completed = self.completed.clone();
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(fence_target, Ordering::Release);
        });
        Ok(())
    }

    fn slot_limit(&self) -> Option<usize> {
        Some(self.slots.len())
    }

    fn slot_capacity(&self) -> Option<SlotCapacity> {
        Some(self.capacity)
    }
}
