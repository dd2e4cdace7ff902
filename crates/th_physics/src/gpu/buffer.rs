// crates/th_physics/src/gpu/buffer.rs

//! GPU 缓冲区管理
//!
//! 类型安全的缓冲区包装与格式核乒乓双缓冲。

use std::marker::PhantomData;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

/// GPU 缓冲区用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuBufferUsage {
    /// 存储缓冲区（可读写）
    Storage,
    /// 只读存储
    StorageReadOnly,
    /// 统一缓冲区
    Uniform,
    /// 暂存缓冲区（读回）
    Staging,
}

impl GpuBufferUsage {
    /// 转换为 wgpu BufferUsages
    pub fn to_wgpu_usage(self) -> BufferUsages {
        match self {
            Self::Storage => {
                BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC
            }
            Self::StorageReadOnly => BufferUsages::STORAGE | BufferUsages::COPY_DST,
            Self::Uniform => BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            Self::Staging => BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        }
    }
}

/// 类型化的 GPU 缓冲区
pub struct TypedBuffer<T> {
    buffer: Buffer,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> TypedBuffer<T> {
    /// 创建缓冲区
    pub fn new(device: &Device, len: usize, usage: GpuBufferUsage, label: Option<&str>) -> Self {
        let size = (len.max(1) * std::mem::size_of::<T>()) as u64;
        let buffer = device.create_buffer(&BufferDescriptor {
            label,
            size,
            usage: usage.to_wgpu_usage(),
            mapped_at_creation: false,
        });

        Self {
            buffer,
            len,
            _marker: PhantomData,
        }
    }

    /// 从数据创建缓冲区
    pub fn from_data(
        device: &Device,
        data: &[T],
        usage: GpuBufferUsage,
        label: Option<&str>,
    ) -> Self {
        let buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label,
                contents: bytemuck::cast_slice(data),
                usage: usage.to_wgpu_usage(),
            },
        );

        Self {
            buffer,
            len: data.len(),
            _marker: PhantomData,
        }
    }

    /// 上传数据
    pub fn write(&self, queue: &Queue, data: &[T]) {
        assert!(data.len() <= self.len, "数据超出缓冲区容量");
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
    }

    /// 底层缓冲区引用
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// 元素数量
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 字节大小
    pub fn size_bytes(&self) -> u64 {
        (self.len * std::mem::size_of::<T>()) as u64
    }
}

/// 乒乓双缓冲
///
/// 格式核从读侧取数、写入写侧；主机在步间交换。
pub struct DoubleBuffer<T> {
    front: TypedBuffer<T>,
    back: TypedBuffer<T>,
    front_active: bool,
}

impl<T: bytemuck::Pod> DoubleBuffer<T> {
    /// 创建双缓冲
    pub fn new(device: &Device, len: usize, usage: GpuBufferUsage, label: &str) -> Self {
        let front = TypedBuffer::new(device, len, usage, Some(&format!("{}_front", label)));
        let back = TypedBuffer::new(device, len, usage, Some(&format!("{}_back", label)));

        Self {
            front,
            back,
            front_active: true,
        }
    }

    /// 当前读取缓冲
    pub fn read_buffer(&self) -> &TypedBuffer<T> {
        if self.front_active {
            &self.front
        } else {
            &self.back
        }
    }

    /// 当前写入缓冲
    pub fn write_buffer(&self) -> &TypedBuffer<T> {
        if self.front_active {
            &self.back
        } else {
            &self.front
        }
    }

    /// 交换
    pub fn swap(&mut self) {
        self.front_active = !self.front_active;
    }

    /// 元素数量
    pub fn len(&self) -> usize {
        self.front.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }

    /// 读侧是否为 front（绑定组选择用）
    pub fn front_active(&self) -> bool {
        self.front_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        let storage = GpuBufferUsage::Storage.to_wgpu_usage();
        assert!(storage.contains(BufferUsages::STORAGE));
        assert!(storage.contains(BufferUsages::COPY_SRC));

        let uniform = GpuBufferUsage::Uniform.to_wgpu_usage();
        assert!(uniform.contains(BufferUsages::UNIFORM));
        assert!(!uniform.contains(BufferUsages::STORAGE));

        let staging = GpuBufferUsage::Staging.to_wgpu_usage();
        assert!(staging.contains(BufferUsages::MAP_READ));
    }
}
