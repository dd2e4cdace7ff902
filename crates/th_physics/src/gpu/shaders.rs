// crates/th_physics/src/gpu/shaders.rs

//! WGSL 核源码
//!
//! 使用 `include_str!` 在编译时嵌入核代码，管线创建时按
//! `预编译头 + common + 核体` 组装。预编译头把主机端数值参数与
//! 行为开关注入为 WGSL 常量，保证两侧共享同一组数值。
//!
//! # 核组织
//!
//! - `common.wgsl`: 公共结构体与工具函数（重构、HLLC、摩擦）
//! - `scheme_godunov.wgsl`: Godunov 一阶核（普通 + 工作组缓存变体）
//! - `scheme_inertial.wgsl`: 惯性简化核
//! - `friction.wgsl`: 独立摩擦核
//! - `reduce.wgsl`: 第一级波速归约
//! - `timestep.wgsl`: 第二级标量时间步核（推进 + 回滚后更新）
//! - `bdy_uniform.wgsl` / `bdy_gridded.wgsl` / `bdy_cell.wgsl` /
//!   `bdy_pipe.wgsl`: 边界核（每核独立文件，保持绑定布局连续）

use crate::types::{FrictionMode, SolverConfig, TimestepMode, WaveSpeedForm};

/// 公共结构体与工具函数
pub const COMMON: &str = include_str!("shaders/common.wgsl");

/// Godunov 一阶核
///
/// 入口点：`main`（直读全局内存）、`main_cached`（工作组瓦片缓存，
/// 外环仅装载）
pub const SCHEME_GODUNOV: &str = include_str!("shaders/scheme_godunov.wgsl");

/// 惯性简化核
pub const SCHEME_INERTIAL: &str = include_str!("shaders/scheme_inertial.wgsl");

/// 独立摩擦核
pub const FRICTION: &str = include_str!("shaders/friction.wgsl");

/// 第一级波速归约核
pub const REDUCE: &str = include_str!("shaders/reduce.wgsl");

/// 第二级标量时间步核
///
/// 入口点：`advance_normal`、`update_timestep`（回滚后）
pub const TIMESTEP: &str = include_str!("shaders/timestep.wgsl");

/// 均匀降雨/损失边界核
pub const BDY_UNIFORM: &str = include_str!("shaders/bdy_uniform.wgsl");

/// 栅格强迫边界核（常驻与流式共用，流式帧数为 1）
pub const BDY_GRIDDED: &str = include_str!("shaders/bdy_gridded.wgsl");

/// 单元时间序列边界核
pub const BDY_CELL: &str = include_str!("shaders/bdy_cell.wgsl");

/// 简单压力管边界核（单工作项）
pub const BDY_PIPE: &str = include_str!("shaders/bdy_pipe.wgsl");

/// 生成预编译头
///
/// f32 设备端的干湿阈值与时间步下限取 f32 可分辨的适配值，
/// 其余常量与主机端逐一对应。
pub fn preamble(config: &SolverConfig) -> String {
    let params = &config.params;
    format!(
        "\
// 由主机生成的预编译头
const G: f32 = {:.5};
const EPS: f32 = 1e-6;
const NODATA: f32 = -9999.0;
const COURANT: f32 = {:.6};
const FROUDE_MAX: f32 = {:.6};
const HYDRO_PERIOD: f32 = {:.6};
const DT_MIN: f32 = 1e-9;
const DT_MAX: f32 = {:.3};
const DT_START_MIN: f32 = 1e-9;
const START_DURATION: f32 = {:.3};
const EARLY_LIMIT: f32 = {:.3};
const EARLY_DURATION: f32 = {:.3};
const MM_HR_TO_M_S: f32 = 2.7777778e-7;
const VISCOSITY: f32 = 1.005e-6;
const TIMESTEP_DYNAMIC: bool = {};
const WAVE_SPEED_SIMPLIFIED: bool = {};
const FRICTION_IN_KERNEL: bool = {};
",
        params.gravity,
        params.courant,
        params.froude_max,
        params.hydrological_period,
        params.dt_max,
        params.start_duration,
        params.early_limit,
        params.early_duration,
        config.timestep_mode == TimestepMode::Dynamic,
        config.wave_speed == WaveSpeedForm::Simplified,
        config.friction == FrictionMode::InKernel,
    )
}

/// 组装完整的核源码
pub fn assemble(kernel: &str, config: &SolverConfig) -> String {
    format!("{}\n{}\n{}", preamble(config), COMMON, kernel)
}
