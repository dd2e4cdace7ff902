// crates/th_physics/src/boundary/cell.rs

//! 单元时间序列边界
//!
//! 对一组目标单元按当前模拟时间在两个序列条目之间线性插值，
//! 按水位模式与流量模式施加：
//!
//! - 水位模式：忽略 | 直接水位 | 水深 | 临界水深
//! - 流量模式：忽略 | 单宽流量 | 流速 | 体积
//!
//! 体积模式按序列值符号决定注入/抽取方向，不施加流向；
//! 其余流量模式以 `|q_x|·Δt/Δy + |q_y|·Δt/Δx` 作为水深增量，
//! 并保证不低于临界水深 `h_c = (q²/g)^(1/3)`。

use serde::{Deserialize, Serialize};
use th_foundation::CellIndex;

use super::{BoundaryCondition, BoundaryContext};
use crate::forcing::{TimeSeries, TimeSeriesCursor};
use crate::state::CellField;

/// 水位解释模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    /// 不施加水位
    #[default]
    Ignore,
    /// 序列值为自由水面高程
    FreeSurfaceLevel,
    /// 序列值为水深
    Depth,
    /// 由流量推临界水深
    Critical,
}

/// 流量解释模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DischargeMode {
    /// 不施加流量
    #[default]
    Ignore,
    /// 序列值为单宽流量 [m²/s]
    Discharge,
    /// 序列值为流速 [m/s]
    Velocity,
    /// 序列值为体积流量 [m³/s]，符号决定注入/抽取
    Volume,
}

/// 单元时间序列边界
pub struct CellBoundary {
    name: String,
    cells: Vec<CellIndex>,
    depth_mode: DepthMode,
    discharge_mode: DischargeMode,
    level: Option<TimeSeries>,
    discharge_x: Option<TimeSeries>,
    discharge_y: Option<TimeSeries>,
    cursor_level: TimeSeriesCursor,
    cursor_x: TimeSeriesCursor,
    cursor_y: TimeSeriesCursor,
}

impl CellBoundary {
    /// 创建边界
    pub fn new(
        name: impl Into<String>,
        cells: Vec<CellIndex>,
        depth_mode: DepthMode,
        discharge_mode: DischargeMode,
    ) -> Self {
        Self {
            name: name.into(),
            cells,
            depth_mode,
            discharge_mode,
            level: None,
            discharge_x: None,
            discharge_y: None,
            cursor_level: TimeSeriesCursor::new(),
            cursor_x: TimeSeriesCursor::new(),
            cursor_y: TimeSeriesCursor::new(),
        }
    }

    /// 设置水位序列
    pub fn with_level(mut self, series: TimeSeries) -> Self {
        self.level = Some(series);
        self
    }

    /// 设置流量序列（x/y 分量；体积模式仅用 x 分量）
    pub fn with_discharge(mut self, x: TimeSeries, y: TimeSeries) -> Self {
        self.discharge_x = Some(x);
        self.discharge_y = Some(y);
        self
    }

    /// 设置体积流量序列
    pub fn with_volume(mut self, series: TimeSeries) -> Self {
        self.discharge_x = Some(series);
        self
    }

    /// 目标单元
    pub fn cells(&self) -> &[CellIndex] {
        &self.cells
    }
}

impl BoundaryCondition for CellBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, ctx: &BoundaryContext<'_>, state: &mut CellField) {
        if ctx.dt <= 0.0 {
            return;
        }

        let gravity = ctx.params.gravity;
        let level_value = self
            .level
            .as_ref()
            .map(|s| s.sample_with_cursor(ctx.time, &mut self.cursor_level));
        let qx_value = self
            .discharge_x
            .as_ref()
            .map(|s| s.sample_with_cursor(ctx.time, &mut self.cursor_x))
            .unwrap_or(0.0);
        let qy_value = self
            .discharge_y
            .as_ref()
            .map(|s| s.sample_with_cursor(ctx.time, &mut self.cursor_y))
            .unwrap_or(0.0);

        for &cell in &self.cells {
            let idx = cell.get();
            if idx >= state.n_cells() || state.is_disabled(cell) || ctx.terrain.is_nodata(cell) {
                continue;
            }
            let z = ctx.terrain.z_bed[idx];
            let mut eta = state.eta[idx];

            // 水位模式
            match self.depth_mode {
                DepthMode::Ignore => {}
                DepthMode::FreeSurfaceLevel => {
                    if let Some(level) = level_value {
                        eta = level.max(z);
                    }
                }
                DepthMode::Depth => {
                    if let Some(depth) = level_value {
                        eta = z + depth.max(0.0);
                    }
                }
                DepthMode::Critical => {
                    let q_mag = (qx_value * qx_value + qy_value * qy_value).sqrt();
                    eta = z + (q_mag * q_mag / gravity).cbrt();
                }
            }

            // 流量模式
            match self.discharge_mode {
                DischargeMode::Ignore => {}
                DischargeMode::Volume => {
                    // 符号决定方向，不施加流向
                    let d_eta = qx_value * ctx.dt / ctx.grid.cell_area();
                    eta = (eta + d_eta).max(z);
                }
                DischargeMode::Discharge | DischargeMode::Velocity => {
                    let (qx_b, qy_b) = if self.discharge_mode == DischargeMode::Velocity {
                        let h = (eta - z).max(0.0);
                        (qx_value * h, qy_value * h)
                    } else {
                        (qx_value, qy_value)
                    };

                    eta += qx_b.abs() * ctx.dt * ctx.grid.dy_inv()
                        + qy_b.abs() * ctx.dt * ctx.grid.dx_inv();

                    // 临界水深下限
                    let q_mag = (qx_b * qx_b + qy_b * qy_b).sqrt();
                    if q_mag > ctx.params.very_small {
                        let h_crit = (q_mag * q_mag / gravity).cbrt();
                        if eta - z < h_crit {
                            eta = z + h_crit;
                        }
                    }

                    state.qx[idx] = qx_b;
                    state.qy[idx] = qy_b;
                }
            }

            state.eta[idx] = eta;
            state.eta_max[idx] = state.eta_max[idx].max(eta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CartesianGrid;
    use crate::state::Terrain;
    use crate::types::NumericalParams;

    fn context<'a>(
        grid: &'a CartesianGrid,
        terrain: &'a Terrain,
        params: &'a NumericalParams,
        time: f64,
        dt: f64,
    ) -> BoundaryContext<'a> {
        BoundaryContext {
            grid,
            terrain,
            params,
            time,
            dt,
            time_hydro: 0.0,
        }
    }

    #[test]
    fn test_fsl_mode_sets_level() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(0.0, &vec![0.0; 16]);

        let mut boundary = CellBoundary::new(
            "stage",
            vec![CellIndex(5)],
            DepthMode::FreeSurfaceLevel,
            DischargeMode::Ignore,
        )
        .with_level(TimeSeries::from_points(vec![(0.0, 1.0), (10.0, 2.0)]));

        let ctx = context(&grid, &terrain, &params, 5.0, 0.1);
        boundary.apply(&ctx, &mut state);

        assert!((state.eta[5] - 1.5).abs() < 1e-12);
        assert!((state.eta_max[5] - 1.5).abs() < 1e-12);
        // 其他单元不受影响
        assert_eq!(state.eta[6], 0.0);
    }

    #[test]
    fn test_fsl_clamped_to_bed() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 2.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(2.0, &vec![2.0; 16]);

        let mut boundary = CellBoundary::new(
            "stage",
            vec![CellIndex(5)],
            DepthMode::FreeSurfaceLevel,
            DischargeMode::Ignore,
        )
        .with_level(TimeSeries::from_points(vec![(0.0, 1.0), (10.0, 1.0)]));

        let ctx = context(&grid, &terrain, &params, 0.0, 0.1);
        boundary.apply(&ctx, &mut state);
        assert!((state.eta[5] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_volume_mode_accumulates() {
        let grid = CartesianGrid::new(4, 4, 2.0, 2.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(0.0, &vec![0.0; 16]);

        // 0.4 m³/s 注入 2x2 m 单元，Δt=1 → 水深 +0.1 m
        let mut boundary = CellBoundary::new(
            "inflow",
            vec![CellIndex(5)],
            DepthMode::Ignore,
            DischargeMode::Volume,
        )
        .with_volume(TimeSeries::from_points(vec![(0.0, 0.4), (100.0, 0.4)]));

        let ctx = context(&grid, &terrain, &params, 0.0, 1.0);
        boundary.apply(&ctx, &mut state);
        assert!((state.eta[5] - 0.1).abs() < 1e-12);
        // 流量模式不施加流向
        assert_eq!(state.qx[5], 0.0);
    }

    #[test]
    fn test_volume_mode_negative_clamped_to_bed() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(0.05, &vec![0.0; 16]);

        let mut boundary = CellBoundary::new(
            "outflow",
            vec![CellIndex(5)],
            DepthMode::Ignore,
            DischargeMode::Volume,
        )
        .with_volume(TimeSeries::from_points(vec![(0.0, -1.0), (100.0, -1.0)]));

        let ctx = context(&grid, &terrain, &params, 0.0, 1.0);
        boundary.apply(&ctx, &mut state);
        assert!((state.eta[5] - 0.0).abs() < 1e-12, "抽取不得低于底床");
    }

    #[test]
    fn test_discharge_mode_enforces_critical_depth() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(0.0, &vec![0.0; 16]);

        let q = 0.5;
        let mut boundary = CellBoundary::new(
            "hydrograph",
            vec![CellIndex(5)],
            DepthMode::Ignore,
            DischargeMode::Discharge,
        )
        .with_discharge(
            TimeSeries::from_points(vec![(0.0, q), (100.0, q)]),
            TimeSeries::from_points(vec![(0.0, 0.0), (100.0, 0.0)]),
        );

        let ctx = context(&grid, &terrain, &params, 0.0, 0.001);
        boundary.apply(&ctx, &mut state);

        let h_crit = (q * q / params.gravity).cbrt();
        assert!(state.eta[5] >= h_crit - 1e-12);
        assert!((state.qx[5] - q).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_mode_scales_by_depth() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(2.0, &vec![0.0; 16]);

        let mut boundary = CellBoundary::new(
            "velocity",
            vec![CellIndex(5)],
            DepthMode::Ignore,
            DischargeMode::Velocity,
        )
        .with_discharge(
            TimeSeries::from_points(vec![(0.0, 0.5), (100.0, 0.5)]),
            TimeSeries::from_points(vec![(0.0, 0.0), (100.0, 0.0)]),
        );

        let ctx = context(&grid, &terrain, &params, 0.0, 0.001);
        boundary.apply(&ctx, &mut state);
        // q = v·h = 0.5·2 + 增量修正后的量级
        assert!(state.qx[5] > 0.9 && state.qx[5] < 1.1);
    }

    #[test]
    fn test_skipped_when_not_advancing() {
        let grid = CartesianGrid::new(4, 4, 1.0, 1.0).unwrap();
        let terrain = Terrain::uniform(16, 0.0, 0.03);
        let params = NumericalParams::default();
        let mut state = CellField::cold_start(0.0, &vec![0.0; 16]);

        let mut boundary = CellBoundary::new(
            "stage",
            vec![CellIndex(5)],
            DepthMode::FreeSurfaceLevel,
            DischargeMode::Ignore,
        )
        .with_level(TimeSeries::from_points(vec![(0.0, 1.0), (10.0, 1.0)]));

        let ctx = context(&grid, &terrain, &params, 0.0, 0.0);
        boundary.apply(&ctx, &mut state);
        assert_eq!(state.eta[5], 0.0);
    }
}
