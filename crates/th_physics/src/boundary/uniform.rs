// crates/th_physics/src/boundary/uniform.rs

//! 均匀降雨/损失边界
//!
//! 仅在水文子步（`t_hydro ≥ T_H`）施加。降雨强度单位 mm/hr，
//! 换算为 `η ← η + (r/3.6e6)·t_hydro`；损失对称但钳制到底床。

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use th_foundation::constants::{MM_PER_HOUR_TO_M_PER_SEC, NODATA_SENTINEL};

use super::{BoundaryCondition, BoundaryContext};
use crate::forcing::{TimeSeries, TimeSeriesCursor};
use crate::state::CellField;

/// 均匀边界类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformKind {
    /// 降雨（加水）
    Rainfall,
    /// 损失（下渗/蒸发，减水）
    Loss,
}

/// 均匀降雨/损失边界
pub struct UniformBoundary {
    name: String,
    kind: UniformKind,
    series: TimeSeries,
    cursor: TimeSeriesCursor,
}

impl UniformBoundary {
    /// 创建边界；序列值单位 mm/hr
    pub fn new(name: impl Into<String>, kind: UniformKind, series: TimeSeries) -> Self {
        Self {
            name: name.into(),
            kind,
            series,
            cursor: TimeSeriesCursor::new(),
        }
    }
}

impl BoundaryCondition for UniformBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, ctx: &BoundaryContext<'_>, state: &mut CellField) {
        if ctx.dt <= 0.0 || !ctx.is_hydrological_step() {
            return;
        }

        let rate = self.series.sample_with_cursor(ctx.time, &mut self.cursor);
        let delta = rate * MM_PER_HOUR_TO_M_PER_SEC * ctx.time_hydro;
        if delta.abs() < ctx.params.very_small {
            return;
        }

        let kind = self.kind;
        let terrain = ctx.terrain;
        let eta_max_field = &mut state.eta_max;
        let eta_field = &mut state.eta;

        eta_field
            .as_mut_slice()
            .par_iter_mut()
            .zip(eta_max_field.as_mut_slice().par_iter_mut())
            .enumerate()
            .for_each(|(idx, (eta, eta_max))| {
                if *eta_max <= NODATA_SENTINEL
                    || *eta <= NODATA_SENTINEL
                    || terrain.z_bed[idx] <= NODATA_SENTINEL
                {
                    return;
                }
                match kind {
                    UniformKind::Rainfall => *eta += delta,
                    UniformKind::Loss => *eta = (*eta - delta).max(terrain.z_bed[idx]),
                }
                *eta_max = eta_max.max(*eta);
            });
    }
}
