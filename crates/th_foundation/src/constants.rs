// crates/th_foundation/src/constants.rs

//! 物理与数值常量
//!
//! 集中定义求解器全局使用的常量，主机端与设备端（WGSL 预编译头）
//! 共享同一组数值，避免两侧漂移。

/// 重力加速度 [m/s²]
pub const GRAVITY: f64 = 9.80665;

/// 干湿判定阈值，小于该值的水深视为干
pub const VERY_SMALL: f64 = 1e-14;

/// NODATA 哨兵值：底床高程 ≤ 该值的单元视为无数据
pub const NODATA_SENTINEL: f64 = -9999.0;

/// 水的运动粘度 [m²/s]（20°C，用于管流 Colebrook-White 求解）
pub const KINEMATIC_VISCOSITY: f64 = 1.005e-6;

/// 默认 Courant 数
pub const DEFAULT_COURANT: f64 = 0.5;

/// 惯性简化格式的 Froude 数上限
pub const DEFAULT_FROUDE_MAX: f64 = 0.8;

/// 水文子时间步周期 [s]
pub const HYDROLOGICAL_PERIOD: f64 = 0.25;

/// 时间步下限 [s]
pub const TIMESTEP_MIN: f64 = 1e-10;

/// 时间步上限 [s]
pub const TIMESTEP_MAX: f64 = 15.0;

/// 起步阶段的时间步下限 [s]（干启动时避免 CFL 得到零步长）
pub const TIMESTEP_START_MIN: f64 = 1e-10;

/// 起步阶段持续时间 [s]
pub const TIMESTEP_START_DURATION: f64 = 1.0;

/// 初期限制阶段的时间步上限 [s]
pub const TIMESTEP_EARLY_LIMIT: f64 = 0.1;

/// 初期限制阶段持续时间 [s]
pub const TIMESTEP_EARLY_DURATION: f64 = 60.0;

/// 降雨强度单位换算：mm/hr → m/s
pub const MM_PER_HOUR_TO_M_PER_SEC: f64 = 1.0 / 3.6e6;

/// MINBEE 限制器参数 β
pub const MINBEE_BETA: f64 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion() {
        // 10 mm/hr 持续 3600 s 应累积 0.01 m
        let depth = 10.0 * MM_PER_HOUR_TO_M_PER_SEC * 3600.0;
        assert!((depth - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_thresholds_ordering() {
        assert!(VERY_SMALL > 0.0);
        assert!(TIMESTEP_MIN <= TIMESTEP_EARLY_LIMIT);
        assert!(TIMESTEP_EARLY_LIMIT < TIMESTEP_MAX);
    }
}
