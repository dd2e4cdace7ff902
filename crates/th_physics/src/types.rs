// crates/th_physics/src/types.rs

//! 核心类型定义
//!
//! 数值参数、格式/时间步/摩擦模式枚举与求解器配置。
//! 所有默认值与设备端 WGSL 预编译头共享同一组常量。

use serde::{Deserialize, Serialize};
use th_foundation::constants;

// ============================================================
// 数值参数
// ============================================================

/// 数值参数
///
/// 干湿阈值、Courant 数与时间步限制的集中配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericalParams {
    /// 重力加速度 [m/s²]
    pub gravity: f64,
    /// 干湿判定阈值 [m]
    pub very_small: f64,
    /// Courant 数
    pub courant: f64,
    /// 惯性简化格式的 Froude 数上限
    pub froude_max: f64,
    /// 时间步下限 [s]
    pub dt_min: f64,
    /// 时间步上限 [s]
    pub dt_max: f64,
    /// 起步阶段时间步下限 [s]
    pub dt_start_min: f64,
    /// 起步阶段持续时间 [s]
    pub start_duration: f64,
    /// 初期限制阶段时间步上限 [s]
    pub early_limit: f64,
    /// 初期限制阶段持续时间 [s]
    pub early_duration: f64,
    /// 水文子时间步周期 [s]
    pub hydrological_period: f64,
}

impl Default for NumericalParams {
    fn default() -> Self {
        Self {
            gravity: constants::GRAVITY,
            very_small: constants::VERY_SMALL,
            courant: constants::DEFAULT_COURANT,
            froude_max: constants::DEFAULT_FROUDE_MAX,
            dt_min: constants::TIMESTEP_MIN,
            dt_max: constants::TIMESTEP_MAX,
            dt_start_min: constants::TIMESTEP_START_MIN,
            start_duration: constants::TIMESTEP_START_DURATION,
            early_limit: constants::TIMESTEP_EARLY_LIMIT,
            early_duration: constants::TIMESTEP_EARLY_DURATION,
            hydrological_period: constants::HYDROLOGICAL_PERIOD,
        }
    }
}

impl NumericalParams {
    /// 水深是否视为干
    #[inline]
    pub fn is_dry(&self, h: f64) -> bool {
        h < self.very_small
    }

    /// 安全除法求流速分量，干单元返回零
    #[inline]
    pub fn safe_velocity(&self, q: f64, h: f64) -> f64 {
        if self.is_dry(h) {
            0.0
        } else {
            q / h
        }
    }
}

// ============================================================
// 模式枚举
// ============================================================

/// 数值格式类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemeKind {
    /// Godunov 一阶格式（HLLC 通量）
    #[default]
    Godunov,
    /// 惯性简化格式（低精度、高速度）
    Inertial,
}

impl std::fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Godunov => write!(f, "Godunov"),
            Self::Inertial => write!(f, "Inertial"),
        }
    }
}

/// 时间步模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimestepMode {
    /// CFL 约束的动态时间步
    #[default]
    Dynamic,
    /// 固定时间步
    Fixed,
}

/// 波速估计形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaveSpeedForm {
    /// 完整形式 max(|u|+√(gh), |v|+√(gh))
    #[default]
    Full,
    /// 简化形式，仅 √(gh)
    Simplified,
}

/// 摩擦处理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrictionMode {
    /// 禁用摩擦
    Disabled,
    /// 在格式核内联执行
    #[default]
    InKernel,
    /// 作为独立核执行
    Standalone,
}

impl FrictionMode {
    /// 摩擦是否启用
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

// ============================================================
// 求解器配置
// ============================================================

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 数值参数
    pub params: NumericalParams,
    /// 数值格式
    pub scheme: SchemeKind,
    /// 时间步模式
    pub timestep_mode: TimestepMode,
    /// 固定时间步长 [s]（仅 Fixed 模式）
    pub fixed_dt: f64,
    /// 波速估计形式
    pub wave_speed: WaveSpeedForm,
    /// 摩擦处理模式
    pub friction: FrictionMode,
    /// 模拟结束时间 [s]
    pub end_time: f64,
    /// 归约工作组数量（主机参考后端亦按此分块）
    pub reduction_groups: usize,
    /// 调试追踪单元 (列, 行)，启用后逐步输出该单元状态
    pub debug_cell: Option<(usize, usize)>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            params: NumericalParams::default(),
            scheme: SchemeKind::default(),
            timestep_mode: TimestepMode::default(),
            fixed_dt: 0.001,
            wave_speed: WaveSpeedForm::default(),
            friction: FrictionMode::default(),
            end_time: f64::MAX,
            reduction_groups: 64,
            debug_cell: None,
        }
    }
}

impl SolverConfig {
    /// 创建构建器
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::default()
    }
}

/// 配置构建器
#[derive(Default)]
pub struct SolverConfigBuilder {
    config: SolverConfig,
}

impl SolverConfigBuilder {
    /// 设置数值参数
    pub fn params(mut self, params: NumericalParams) -> Self {
        self.config.params = params;
        self
    }

    /// 设置数值格式
    pub fn scheme(mut self, scheme: SchemeKind) -> Self {
        self.config.scheme = scheme;
        self
    }

    /// 使用固定时间步
    pub fn fixed_timestep(mut self, dt: f64) -> Self {
        self.config.timestep_mode = TimestepMode::Fixed;
        self.config.fixed_dt = dt;
        self
    }

    /// 设置 Courant 数
    pub fn courant(mut self, courant: f64) -> Self {
        self.config.params.courant = courant;
        self
    }

    /// 设置波速估计形式
    pub fn wave_speed(mut self, form: WaveSpeedForm) -> Self {
        self.config.wave_speed = form;
        self
    }

    /// 设置摩擦模式
    pub fn friction(mut self, mode: FrictionMode) -> Self {
        self.config.friction = mode;
        self
    }

    /// 设置模拟结束时间
    pub fn end_time(mut self, t: f64) -> Self {
        self.config.end_time = t;
        self
    }

    /// 设置调试追踪单元
    pub fn debug_cell(mut self, x: usize, y: usize) -> Self {
        self.config.debug_cell = Some((x, y));
        self
    }

    /// 构建配置
    pub fn build(self) -> SolverConfig {
        self.config
    }
}
