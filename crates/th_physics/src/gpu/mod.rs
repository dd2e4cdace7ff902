// crates/th_physics/src/gpu/mod.rs

//! wgpu GPU 计算后端
//!
//! 设备端以 f32 WGSL 运行完整的每步计算管线（边界核 → 归约 →
//! 时间步 → 格式核 → 摩擦核），主机只在批次间读回时间步标量块。
//! 命令按 FIFO 队列提交，核间顺序由队列序保证。
//!
//! wgpu 计算不支持 f64；主机 f64 参考后端是语义基准，
//! 设备端常量（干湿阈值等）使用 f32 适配值，由预编译头注入。

pub mod backend;
pub mod buffer;
pub mod pipeline;
pub mod shaders;
pub mod solver;

pub use backend::GpuContext;
pub use buffer::{DoubleBuffer, GpuBufferUsage, TypedBuffer};
pub use pipeline::{BindingConfig, CompiledPipeline, ComputePipelineConfig, PipelineCache};
pub use solver::GpuSimulation;

use th_foundation::ThError;

/// GPU 后端错误
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// 无可用适配器
    #[error("未找到可用的 GPU 适配器")]
    NoAdapter,

    /// 设备创建失败
    #[error("设备创建失败: {0}")]
    DeviceCreation(String),

    /// 缓冲区读回失败
    #[error("缓冲区读回失败: {0}")]
    Readback(String),

    /// 配置无效
    #[error("GPU 配置无效: {0}")]
    InvalidConfig(String),
}

impl From<GpuError> for ThError {
    fn from(err: GpuError) -> Self {
        ThError::internal(err.to_string())
    }
}
