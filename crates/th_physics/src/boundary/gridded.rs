// crates/th_physics/src/boundary/gridded.rs

//! 栅格化强迫边界
//!
//! 单元按世界坐标采样强迫栅格：
//! `col = ⌊(i·Δx − O_x)/R⌋`，`row = ⌊(j·Δy − O_y)/R⌋`。
//!
//! - 常驻变体：整条时间序列驻留内存/设备，按 `⌊t/T_int⌋` 取帧（钳制）
//! - 流式变体：仅驻留单帧；主机在帧索引推进时经 `stream` 回调
//!   读取下一帧并在消费核入队前完成上载

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use th_foundation::constants::{MM_PER_HOUR_TO_M_PER_SEC, NODATA_SENTINEL};
use th_foundation::memory::AlignedVec;
use th_foundation::{ThError, ThResult};

use super::{BoundaryCondition, BoundaryContext};
use crate::state::CellField;

/// 世界坐标 → 强迫栅格的仿射变换
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridTransform {
    /// 栅格原点 x [m]
    pub origin_x: f64,
    /// 栅格原点 y [m]
    pub origin_y: f64,
    /// 栅格分辨率 [m]
    pub resolution: f64,
    /// 栅格列数
    pub cols: usize,
    /// 栅格行数
    pub rows: usize,
}

impl GridTransform {
    /// 采样索引；落在栅格外返回 None
    #[inline]
    pub fn sample_index(&self, world_x: f64, world_y: f64) -> Option<usize> {
        let col = ((world_x - self.origin_x) / self.resolution).floor();
        let row = ((world_y - self.origin_y) / self.resolution).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(row * self.cols + col)
    }
}

/// 栅格强迫类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GriddedKind {
    /// 降雨强度 [mm/hr]
    RainIntensity,
    /// 质量通量 [m³/s]，按单元面积折算
    MassFlux,
}

#[inline]
fn apply_frame(
    ctx: &BoundaryContext<'_>,
    state: &mut CellField,
    transform: &GridTransform,
    frame: &[f64],
    kind: GriddedKind,
) {
    let grid = ctx.grid;
    let terrain = ctx.terrain;
    let time_hydro = ctx.time_hydro;
    let cell_area_inv = 1.0 / grid.cell_area();
    let cols = grid.cols();
    let (dx, dy) = (grid.dx(), grid.dy());

    let eta_field = &mut state.eta;
    let eta_max_field = &mut state.eta_max;

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

            let (i, j) = (idx % cols, idx / cols);
            let Some(sample) = transform.sample_index(i as f64 * dx, j as f64 * dy) else {
                return;
            };
            let rate = frame[sample];
            if rate <= NODATA_SENTINEL {
                return;
            }

            let delta = match kind {
                GriddedKind::RainIntensity => rate * MM_PER_HOUR_TO_M_PER_SEC * time_hydro,
                GriddedKind::MassFlux => rate * cell_area_inv * time_hydro,
            };

            *eta = (*eta + delta).max(terrain.z_bed[idx]);
            *eta_max = eta_max.max(*eta);
        });
}

// ============================================================
// 常驻变体
// ============================================================

/// 常驻栅格强迫边界（整条时间序列驻留）
pub struct GriddedBoundary {
    name: String,
    kind: GriddedKind,
    transform: GridTransform,
    /// 帧间隔 [s]
    interval: f64,
    frames: Vec<AlignedVec<f64>>,
}

impl GriddedBoundary {
    /// 创建边界
    ///
    /// 每帧长度必须等于 `transform.cols × transform.rows`。
    pub fn new(
        name: impl Into<String>,
        kind: GriddedKind,
        transform: GridTransform,
        interval: f64,
        frames: Vec<Vec<f64>>,
    ) -> ThResult<Self> {
        if frames.is_empty() {
            return Err(ThError::invalid_input("栅格边界至少需要一帧"));
        }
        let expected = transform.cols * transform.rows;
        for frame in &frames {
            ThError::check_size("gridded frame", expected, frame.len())?;
        }
        Ok(Self {
            name: name.into(),
            kind,
            transform,
            interval,
            frames: frames.into_iter().map(AlignedVec::from_vec).collect(),
        })
    }

    /// 当前时间对应的帧索引（钳制到最后一帧）
    #[inline]
    fn frame_index(&self, time: f64) -> usize {
        ((time / self.interval) as usize).min(self.frames.len() - 1)
    }
}

impl BoundaryCondition for GriddedBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, ctx: &BoundaryContext<'_>, state: &mut CellField) {
        if ctx.dt <= 0.0 || !ctx.is_hydrological_step() {
            return;
        }
        let frame = &self.frames[self.frame_index(ctx.time)];
        apply_frame(ctx, state, &self.transform, frame, self.kind);
    }
}

// ============================================================
// 流式变体
// ============================================================

/// 帧加载回调：按帧索引读取一帧栅格数据
pub type FrameLoader = Box<dyn FnMut(usize) -> ThResult<Vec<f64>> + Send>;

/// 流式栅格强迫边界（仅驻留单帧）
///
/// 主机每步调用 [`BoundaryCondition::stream`]；帧索引推进时
/// 经加载回调取下一帧并覆盖驻留缓冲。核只读单帧，无时间索引。
pub struct StreamingGriddedBoundary {
    name: String,
    kind: GriddedKind,
    transform: GridTransform,
    interval: f64,
    frame: AlignedVec<f64>,
    loaded_index: Option<usize>,
    loader: FrameLoader,
}

impl StreamingGriddedBoundary {
    /// 创建边界
    pub fn new(
        name: impl Into<String>,
        kind: GriddedKind,
        transform: GridTransform,
        interval: f64,
        loader: FrameLoader,
    ) -> Self {
        let len = transform.cols * transform.rows;
        Self {
            name: name.into(),
            kind,
            transform,
            interval,
            frame: AlignedVec::zeros(len),
            loaded_index: None,
            loader,
        }
    }

    /// 已加载的帧索引
    pub fn loaded_index(&self) -> Option<usize> {
        self.loaded_index
    }
}

impl BoundaryCondition for StreamingGriddedBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&mut self, time: f64) -> ThResult<()> {
        let index = (time / self.interval) as usize;
        if self.loaded_index == Some(index) {
            return Ok(());
        }

        let data = (self.loader)(index)?;
        ThError::check_size("streaming frame", self.frame.len(), data.len())?;
        self.frame.as_mut_slice().copy_from_slice(&data);
        self.loaded_index = Some(index);
        log::debug!("streaming boundary '{}' loaded frame {}", self.name, index);
        Ok(())
    }

    fn apply(&mut self, ctx: &BoundaryContext<'_>, state: &mut CellField) {
        if ctx.dt <= 0.0 || !ctx.is_hydrological_step() || self.loaded_index.is_none() {
            return;
        }
        apply_frame(ctx, state, &self.transform, &self.frame, self.kind);
    }
}
