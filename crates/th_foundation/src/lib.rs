// crates/th_foundation/src/lib.rs

//! TorrentHydro Foundation Layer
//!
//! 零业务依赖的基础层，为整个求解器提供基础抽象。
//!
//! # 模块概览
//!
//! - [`constants`]: 物理与数值常量（重力加速度、干湿阈值、时间步限制等）
//! - [`error`]: 统一基础错误类型
//! - [`index`]: 强类型单元/工作组索引
//! - [`memory`]: SIMD/GPU 友好的对齐缓冲区
//!
//! # 设计原则
//!
//! 1. 仅依赖 serde / bytemuck / rayon，不引入任何求解器领域概念
//! 2. 高层错误最终可转换为 [`ThError`]
//! 3. release 模式下零开销抽象

pub mod constants;
pub mod error;
pub mod index;
pub mod memory;

pub use error::{ThError, ThResult};
pub use index::{CellIndex, WorkGroupIndex};
pub use memory::AlignedVec;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::constants;
    pub use crate::error::{ThError, ThResult};
    pub use crate::index::{CellIndex, WorkGroupIndex};
    pub use crate::memory::AlignedVec;
}
