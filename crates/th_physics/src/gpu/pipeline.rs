// crates/th_physics/src/gpu/pipeline.rs

//! 计算管线管理
//!
//! 着色器模块编译、绑定布局构建与已编译管线缓存。

use std::collections::HashMap;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, ComputePipeline,
    ComputePipelineDescriptor, Device, PipelineLayoutDescriptor, ShaderModuleDescriptor,
    ShaderStages,
};

/// 计算管线配置
#[derive(Debug, Clone)]
pub struct ComputePipelineConfig {
    /// 着色器源码（预编译头 + 公共段 + 核体）
    pub shader_source: String,
    /// 入口点函数名
    pub entry_point: String,
    /// 工作组大小
    pub workgroup_size: (u32, u32, u32),
    /// 绑定布局
    pub bindings: Vec<BindingConfig>,
}

/// 绑定配置
#[derive(Debug, Clone, Copy)]
pub struct BindingConfig {
    /// 绑定索引
    pub binding: u32,
    /// 绑定类型
    pub ty: BindingKind,
}

/// 绑定类型
#[derive(Debug, Clone, Copy)]
pub enum BindingKind {
    /// 可读写存储缓冲区
    Storage,
    /// 只读存储缓冲区
    StorageReadOnly,
    /// 统一缓冲区
    Uniform,
}

impl BindingConfig {
    /// 存储缓冲区绑定
    pub fn storage(binding: u32, read_only: bool) -> Self {
        Self {
            binding,
            ty: if read_only {
                BindingKind::StorageReadOnly
            } else {
                BindingKind::Storage
            },
        }
    }

    /// 统一缓冲区绑定
    pub fn uniform(binding: u32) -> Self {
        Self {
            binding,
            ty: BindingKind::Uniform,
        }
    }

    fn to_layout_entry(self) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding: self.binding,
            visibility: ShaderStages::COMPUTE,
            ty: match self.ty {
                BindingKind::Storage => BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                BindingKind::StorageReadOnly => BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                BindingKind::Uniform => BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
            },
            count: None,
        }
    }
}

/// 已编译的计算管线
pub struct CompiledPipeline {
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
    workgroup_size: (u32, u32, u32),
}

impl CompiledPipeline {
    /// 编译管线
    pub fn new(device: &Device, config: &ComputePipelineConfig, label: Option<&str>) -> Self {
        let shader_module = device.create_shader_module(ShaderModuleDescriptor {
            label,
            source: wgpu::ShaderSource::Wgsl(config.shader_source.clone().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label,
            entries: &config
                .bindings
                .iter()
                .map(|b| b.to_layout_entry())
                .collect::<Vec<_>>(),
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label,
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label,
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some(&config.entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
            workgroup_size: config.workgroup_size,
        }
    }

    /// 创建绑定组（按绑定索引顺序给出缓冲区）
    pub fn create_bind_group(
        &self,
        device: &Device,
        buffers: &[&Buffer],
        label: Option<&str>,
    ) -> BindGroup {
        let entries: Vec<_> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        device.create_bind_group(&BindGroupDescriptor {
            label,
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    /// 管线引用
    pub fn pipeline(&self) -> &ComputePipeline {
        &self.pipeline
    }

    /// 工作组大小
    pub fn workgroup_size(&self) -> (u32, u32, u32) {
        self.workgroup_size
    }

    /// 一维调度的工作组数量
    pub fn dispatch_size(&self, total_work: u32) -> u32 {
        total_work.div_ceil(self.workgroup_size.0)
    }
}

/// 管线缓存
pub struct PipelineCache {
    pipelines: HashMap<String, CompiledPipeline>,
}

impl PipelineCache {
    /// 创建缓存
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// 获取或编译管线
    pub fn get_or_create(
        &mut self,
        device: &Device,
        name: &str,
        config: &ComputePipelineConfig,
    ) -> &CompiledPipeline {
        if !self.pipelines.contains_key(name) {
            let pipeline = CompiledPipeline::new(device, config, Some(name));
            self.pipelines.insert(name.to_string(), pipeline);
        }
        self.pipelines.get(name).unwrap()
    }

    /// 获取已有管线
    pub fn get(&self, name: &str) -> Option<&CompiledPipeline> {
        self.pipelines.get(name)
    }

    /// 是否已编译
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_config() {
        let storage = BindingConfig::storage(0, false);
        assert_eq!(storage.binding, 0);
        assert!(matches!(storage.ty, BindingKind::Storage));

        let read_only = BindingConfig::storage(1, true);
        assert!(matches!(read_only.ty, BindingKind::StorageReadOnly));

        let uniform = BindingConfig::uniform(2);
        assert!(matches!(uniform.ty, BindingKind::Uniform));
    }

    #[test]
    fn test_pipeline_cache_empty() {
        let cache = PipelineCache::new();
        assert!(!cache.contains("scheme_godunov"));
        assert!(cache.get("scheme_godunov").is_none());
    }
}
