// crates/th_physics/src/gpu/backend.rs

//! wgpu 设备上下文
//!
//! 适配器发现、设备/队列创建与阻塞式缓冲区读回。
//! 跨平台（Vulkan/Metal/DX12）。

use std::sync::Arc;

use log::info;
use wgpu::{
    Adapter, Device, DeviceDescriptor, Features, Instance, InstanceDescriptor, Limits,
    PowerPreference, Queue, RequestAdapterOptions,
};

use super::GpuError;

/// wgpu 设备上下文
pub struct GpuContext {
    device: Arc<Device>,
    queue: Arc<Queue>,
    adapter_name: String,
}

impl GpuContext {
    /// 异步创建上下文
    ///
    /// 返回 `Ok(None)` 表示无可用 GPU。
    pub async fn new_async() -> Result<Option<Self>, GpuError> {
        Self::new_with_preference_async(PowerPreference::HighPerformance).await
    }

    /// 指定电源偏好异步创建
    pub async fn new_with_preference_async(
        power_preference: PowerPreference,
    ) -> Result<Option<Self>, GpuError> {
        let instance = Instance::new(InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Some(adapter) => adapter,
            None => return Ok(None),
        };

        let adapter_info = adapter.get_info();
        info!(
            "GPU adapter: {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("TorrentHydro Device"),
                    required_features: Features::empty(),
                    required_limits: Self::required_limits(&adapter),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

        Ok(Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name: adapter_info.name,
        }))
    }

    /// 同步创建（阻塞）
    pub fn new() -> Result<Option<Self>, GpuError> {
        pollster::block_on(Self::new_async())
    }

    /// 必需的设备限制
    fn required_limits(adapter: &Adapter) -> Limits {
        let supported = adapter.limits();
        Limits {
            max_storage_buffer_binding_size: supported
                .max_storage_buffer_binding_size
                .min(256 * 1024 * 1024),
            max_compute_workgroup_size_x: supported.max_compute_workgroup_size_x.min(256),
            max_compute_workgroup_size_y: supported.max_compute_workgroup_size_y.min(256),
            max_compute_invocations_per_workgroup: supported
                .max_compute_invocations_per_workgroup
                .min(256),
            ..Limits::downlevel_defaults()
        }
    }

    /// 设备引用
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// 队列引用
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// 适配器名称
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// 等待设备空闲
    pub fn synchronize(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// 阻塞读回缓冲区
    pub fn read_buffer<T: bytemuck::Pod>(
        &self,
        buffer: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<T>, GpuError> {
        let size = (count * std::mem::size_of::<T>()) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let result: Vec<T> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(result)
    }
}
