// crates/th_physics/src/boundary/mod.rs

//! 边界条件核
//!
//! 所有边界核在每步格式核之前就地修改源状态缓冲：
//! - [`cell`]: 单元列表 + 时间序列（水位/流量）
//! - [`uniform`]: 全域均匀降雨/损失（水文子步）
//! - [`gridded`]: 栅格化强迫，常驻或按时间流式上载
//! - [`pipe`]: 简单压力管连接（Darcy-Weisbach 迭代求解）
//!
//! 所有核尊重 `Δt > 0` 并跳过失效单元。多个边界指向同一单元时
//! 应用顺序未定义，边界集合的目标单元必须互不相交。

pub mod cell;
pub mod gridded;
pub mod pipe;
pub mod uniform;

pub use cell::{CellBoundary, DepthMode, DischargeMode};
pub use gridded::{GridTransform, GriddedBoundary, GriddedKind, StreamingGriddedBoundary};
pub use pipe::{SimplePipeBoundary, SimplePipeConfig};
pub use uniform::{UniformBoundary, UniformKind};

use th_foundation::ThResult;

use crate::grid::CartesianGrid;
use crate::state::{CellField, Terrain};
use crate::types::NumericalParams;

/// 边界核执行上下文
///
/// 时间步标量块在一步内对边界核只读。
pub struct BoundaryContext<'a> {
    /// 网格
    pub grid: &'a CartesianGrid,
    /// 静态地形
    pub terrain: &'a Terrain,
    /// 数值参数
    pub params: &'a NumericalParams,
    /// 模拟时间 [s]
    pub time: f64,
    /// 当前时间步 [s]
    pub dt: f64,
    /// 水文子时钟 [s]
    pub time_hydro: f64,
}

impl BoundaryContext<'_> {
    /// 本步是否为水文子步（均匀/栅格核的应用条件）
    #[inline]
    pub fn is_hydrological_step(&self) -> bool {
        self.time_hydro >= self.params.hydrological_period
    }
}

/// 边界条件
///
/// `apply` 在每步调用（调用方保证核自行检查 `dt > 0`）；
/// `stream` 每步在入队前调用一次，流式边界在此上载下一帧。
pub trait BoundaryCondition: Send {
    /// 边界名称（日志与查找用）
    fn name(&self) -> &str;

    /// 将边界效果就地写入状态场
    fn apply(&mut self, ctx: &BoundaryContext<'_>, state: &mut CellField);

    /// 流式数据推进回调
    fn stream(&mut self, _time: f64) -> ThResult<()> {
        Ok(())
    }
}
