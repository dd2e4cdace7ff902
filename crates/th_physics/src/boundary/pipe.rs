// crates/th_physics/src/boundary/pipe.rs

//! 简单压力管边界
//!
//! 两个单元端点由直径 D、长度 L、糙率 k、局部损失系数 ζ 与
//! 管底高程描述的管道连接。每步对未知摩擦水头损失 h_f 迭代求解
//! Colebrook-White 流速：
//!
//! ```text
//! V = −2·log₁₀(k/(3.71·D_w) + 2.51·ν/(D_w·√(2g·D_w·h_f/L))) · √(2g·D_w·h_f/L)
//! ```
//!
//! 约束 h₀ − h_f − ζ·V²/(2g) = 0，h₀ 为两端水位差。部分过流时
//! D_w = D·φ，φ = (θ − sinθ)/θ，θ = 2·arccos(1 − 2h/D)。
//!
//! 定点迭代步长自适应：|err| ≥ 0.2 时乘子 0.2，否则 0.002，
//! 下限 1e-5，负向越界时折半；上限 5000 次，容差 1e-4。
//! 不收敛时向状态注入 NaN 流量，使模拟终止并告警。

use serde::{Deserialize, Serialize};
use th_foundation::constants::{GRAVITY, KINEMATIC_VISCOSITY};
use th_foundation::CellIndex;

use super::{BoundaryCondition, BoundaryContext};
use crate::state::CellField;

/// 管道配置（设备上载就绪的不可变块）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplePipeConfig {
    /// 管径 [m]
    pub diameter: f64,
    /// 管长 [m]
    pub length: f64,
    /// 绝对糙率 [m]
    pub roughness: f64,
    /// 局部损失系数之和 ζ
    pub loss_coefficients: f64,
    /// 起点管底高程 [m]
    pub invert_start: f64,
    /// 终点管底高程 [m]
    pub invert_end: f64,
    /// 起点单元
    pub start_cell: CellIndex,
    /// 终点单元
    pub end_cell: CellIndex,
}

/// 管流迭代求解结果
#[derive(Debug, Clone, Copy)]
pub(crate) struct PipeSolution {
    /// 管内流速 [m/s]
    pub velocity: f64,
    /// 过流断面积 [m²]
    pub area: f64,
}

/// 部分过流形状因子：湿周折算直径与过流面积
#[inline]
fn flow_geometry(diameter: f64, depth_above_invert: f64) -> (f64, f64) {
    let ratio = (depth_above_invert / diameter).clamp(0.0, 1.0);
    if ratio >= 1.0 {
        // 满管
        let area = std::f64::consts::FRAC_PI_4 * diameter * diameter;
        return (diameter, area);
    }
    let theta = 2.0 * (1.0 - 2.0 * ratio).acos();
    let phi = (theta - theta.sin()) / theta;
    let area = diameter * diameter / 8.0 * (theta - theta.sin());
    (diameter * phi, area)
}

/// Colebrook-White 流速
#[inline]
fn colebrook_velocity(roughness: f64, d_wet: f64, length: f64, head_loss: f64) -> f64 {
    if head_loss <= 0.0 || d_wet <= 0.0 {
        return 0.0;
    }
    let shear = (2.0 * GRAVITY * d_wet * head_loss / length).sqrt();
    let arg = roughness / (3.71 * d_wet) + 2.51 * KINEMATIC_VISCOSITY / (d_wet * shear);
    -2.0 * arg.log10() * shear
}

/// 求解水头平衡：h₀ − h_f − ζV²/(2g) = 0
///
/// 不收敛时返回 None。
pub(crate) fn solve_pipe(
    config: &SimplePipeConfig,
    available_head: f64,
    depth_above_invert: f64,
) -> Option<PipeSolution> {
    let (d_wet, area) = flow_geometry(config.diameter, depth_above_invert);
    if area <= 0.0 || d_wet <= 0.0 {
        return Some(PipeSolution {
            velocity: 0.0,
            area: 0.0,
        });
    }

    let mut head_friction = 0.5 * available_head;

    for _ in 0..5000 {
        let velocity = colebrook_velocity(config.roughness, d_wet, config.length, head_friction);
        let head_local = config.loss_coefficients * velocity * velocity / (2.0 * GRAVITY);
        let err = available_head - head_friction - head_local;

        if err.abs() < 1e-4 {
            return Some(PipeSolution { velocity, area });
        }

        let multiplier = if err.abs() >= 0.2 { 0.2 } else { 0.002 };
        let mut step = multiplier * err;
        if step.abs() < 1e-5 {
            step = 1e-5 * err.signum();
        }

        head_friction += step;
        if head_friction <= 0.0 {
            // 负向越界：回退并折半
            head_friction = (head_friction - step) * 0.5;
        }
    }

    None
}

/// 简单压力管边界
pub struct SimplePipeBoundary {
    name: String,
    config: SimplePipeConfig,
}

impl SimplePipeBoundary {
    /// 创建边界
    pub fn new(name: impl Into<String>, config: SimplePipeConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// 配置块
    pub fn config(&self) -> &SimplePipeConfig {
        &self.config
    }
}

impl BoundaryCondition for SimplePipeBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, ctx: &BoundaryContext<'_>, state: &mut CellField) {
        if ctx.dt <= 0.0 {
            return;
        }

        let cfg = &self.config;
        let (start, end) = (cfg.start_cell, cfg.end_cell);

        // 端点 NODATA 或失效则管道不活动
        if state.is_disabled(start)
            || state.is_disabled(end)
            || ctx.terrain.is_nodata(start)
            || ctx.terrain.is_nodata(end)
        {
            return;
        }

        // 管底低于地面的管道不活动
        if cfg.invert_start < ctx.terrain.z_bed[start.get()]
            || cfg.invert_end < ctx.terrain.z_bed[end.get()]
        {
            return;
        }

        let eta_start = state.eta[start.get()];
        let eta_end = state.eta[end.get()];

        // 上游 = 水位较高端
        let (up, down, invert_up) = if eta_start >= eta_end {
            (start, end, cfg.invert_start)
        } else {
            (end, start, cfg.invert_end)
        };

        let available_head = (state.eta[up.get()] - state.eta[down.get()]).abs();
        if available_head < ctx.params.very_small {
            return;
        }

        // 上游水位低于管底则不过流
        let depth_above_invert = state.eta[up.get()] - invert_up;
        if depth_above_invert <= ctx.params.very_small {
            return;
        }

        let Some(solution) = solve_pipe(cfg, available_head, depth_above_invert) else {
            // 不收敛：注入 NaN 流量终止模拟
            log::warn!(
                "pipe boundary '{}' failed to converge, poisoning state",
                self.name
            );
            state.qx[up.get()] = f64::NAN;
            return;
        };

        if solution.velocity <= 0.0 || solution.area <= 0.0 {
            return;
        }

        let volume = solution.velocity * solution.area * ctx.dt;
        let delta_eta = volume / ctx.grid.cell_area();

        let up_idx = up.get();
        let down_idx = down.get();
        let z_up = ctx.terrain.z_bed[up_idx];

        state.eta[up_idx] = (state.eta[up_idx] - delta_eta).max(z_up);
        state.eta[down_idx] += delta_eta;
        state.eta_max[down_idx] = state.eta_max[down_idx].max(state.eta[down_idx]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CartesianGrid;
    use crate::state::Terrain;
    use crate::types::NumericalParams;

    fn reference_config() -> SimplePipeConfig {
        SimplePipeConfig {
            diameter: 0.5,
            length: 100.0,
            roughness: 0.0005,
            loss_coefficients: 1.5,
            invert_start: 0.0,
            invert_end: 0.0,
            start_cell: CellIndex(5),
            end_cell: CellIndex(10),
        }
    }

    /// 二分法独立求解水头平衡，作为定点迭代的对照
    fn bisection_velocity(config: &SimplePipeConfig, head: f64, depth: f64) -> f64 {
        let (d_wet, _) = flow_geometry(config.diameter, depth);
        let residual = |h_f: f64| {
            let v = colebrook_velocity(config.roughness, d_wet, config.length, h_f);
            head - h_f - config.loss_coefficients * v * v / (2.0 * GRAVITY)
        };
        let (mut lo, mut hi) = (1e-12, head);
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            if residual(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        colebrook_velocity(config.roughness, d_wet, config.length, 0.5 * (lo + hi))
    }

    #[test]
    fn test_steady_state_matches_closed_form() {
        // 参考场景：L=100, D=0.5, k=0.5mm, ζ=1.5, Δh=2, 满管
        let config = reference_config();
        let solution = solve_pipe(&config, 2.0, 1.0).unwrap();
        let reference = bisection_velocity(&config, 2.0, 1.0);

        assert!(
            (solution.velocity - reference).abs() / reference < 0.01,
            "迭代解 {} 与闭式解 {} 偏差超过 1%",
            solution.velocity,
            reference
        );
        // Colebrook-White 量级检查
        assert!(solution.velocity > 2.0 && solution.velocity < 3.5);
    }

    #[test]
    fn test_full_pipe_geometry() {
        let (d_wet, area) = flow_geometry(0.5, 1.0);
        assert!((d_wet - 0.5).abs() < 1e-12);
        assert!((area - std::f64::consts::FRAC_PI_4 * 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_partial_pipe_geometry() {
        // 半管：θ = 2·acos(0) = π，φ = (π − sin π)/π = 1
        let (d_wet, area) = flow_geometry(0.5, 0.25);
        let theta = std::f64::consts::PI;
        let phi = (theta - theta.sin()) / theta;
        assert!((d_wet - 0.5 * phi).abs() < 1e-12);
        // 半管面积 = 满管一半
        let (_, full_area) = flow_geometry(0.5, 1.0);
        assert!((area - 0.5 * full_area).abs() < 1e-12);
    }

    #[test]
    fn test_transfer_conserves_volume() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(0.0, &vec![0.0; 16]);
        state.eta[5] = 2.0;
        state.eta_max[5] = 2.0;

        let mut boundary = SimplePipeBoundary::new("culvert", reference_config());
        let ctx = BoundaryContext {
            grid: &grid,
            terrain: &terrain,
            params: &params,
            time: 0.0,
            dt: 0.01,
            time_hydro: 0.0,
        };

        let volume_before = state.total_volume(&terrain, grid.cell_area());
        boundary.apply(&ctx, &mut state);
        let volume_after = state.total_volume(&terrain, grid.cell_area());

        assert!(state.eta[5] < 2.0, "上游水位应下降");
        assert!(state.eta[10] > 0.0, "下游水位应上升");
        assert!((volume_after - volume_before).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_below_invert() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(0.0, &vec![0.0; 16]);
        // 上游水位低于管底 0.5
        let mut config = reference_config();
        config.invert_start = 0.5;
        config.invert_end = 0.5;
        state.eta[5] = 0.3;
        state.eta_max[5] = 0.3;

        let mut boundary = SimplePipeBoundary::new("culvert", config);
        let ctx = BoundaryContext {
            grid: &grid,
            terrain: &terrain,
            params: &params,
            time: 0.0,
            dt: 0.01,
            time_hydro: 0.0,
        };
        boundary.apply(&ctx, &mut state);
        assert!((state.eta[5] - 0.3).abs() < 1e-15);
        assert_eq!(state.eta[10], 0.0);
    }

    #[test]
    fn test_inactive_invert_below_bed() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 1.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(1.0, &vec![1.0; 16]);
        state.eta[5] = 3.0;
        state.eta_max[5] = 3.0;

        // 管底 0.0 低于地面 1.0 → 不活动
        let mut boundary = SimplePipeBoundary::new("culvert", reference_config());
        let ctx = BoundaryContext {
            grid: &grid,
            terrain: &terrain,
            params: &params,
            time: 0.0,
            dt: 0.01,
            time_hydro: 0.0,
        };
        boundary.apply(&ctx, &mut state);
        assert!((state.eta[5] - 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_no_flow_without_head() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(1.0, &vec![0.0; 16]);

        let mut boundary = SimplePipeBoundary::new("culvert", reference_config());
        let ctx = BoundaryContext {
            grid: &grid,
            terrain: &terrain,
            params: &params,
            time: 0.0,
            dt: 0.01,
            time_hydro: 0.0,
        };
        boundary.apply(&ctx, &mut state);
        assert!((state.eta[5] - 1.0).abs() < 1e-15);
        assert!((state.eta[10] - 1.0).abs() < 1e-15);
    }
}
