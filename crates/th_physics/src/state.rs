// crates/th_physics/src/state.rs

//! 单元状态管理
//!
//! 单元状态为 `(η, η_max, q_x, q_y)`：自由水面高程、运行最大水位、
//! x/y 方向单宽流量 [m²/s]。主机端采用 SoA 布局优化缓存，
//! 设备端以 `vec4` AoS 上传。
//!
//! 失效单元约定：`η_max ≤ −9999` 或 `η ≤ −9999` 的单元被所有核
//! 原样传递，不参与任何更新。

use glam::DVec2;
use serde::{Deserialize, Serialize};
use th_foundation::constants::NODATA_SENTINEL;
use th_foundation::memory::AlignedVec;
use th_foundation::{CellIndex, ThError, ThResult};

use crate::types::NumericalParams;

// ============================================================
// 单元状态
// ============================================================

/// 单个单元的状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellState {
    /// 自由水面高程 [m]
    pub eta: f64,
    /// 运行最大水位 [m]
    pub eta_max: f64,
    /// x 方向单宽流量 [m²/s]
    pub qx: f64,
    /// y 方向单宽流量 [m²/s]
    pub qy: f64,
}

impl CellState {
    /// 创建新状态
    #[inline]
    pub const fn new(eta: f64, eta_max: f64, qx: f64, qy: f64) -> Self {
        Self {
            eta,
            eta_max,
            qx,
            qy,
        }
    }

    /// 单元是否失效
    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.eta_max <= NODATA_SENTINEL || self.eta <= NODATA_SENTINEL
    }

    /// 水深 [m]
    #[inline]
    pub fn depth(&self, z_bed: f64) -> f64 {
        self.eta - z_bed
    }

    /// 流速 (u, v)，干单元返回零
    #[inline]
    pub fn velocity(&self, z_bed: f64, params: &NumericalParams) -> DVec2 {
        let h = self.depth(z_bed);
        DVec2::new(params.safe_velocity(self.qx, h), params.safe_velocity(self.qy, h))
    }

    /// 状态是否有限
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.eta.is_finite() && self.qx.is_finite() && self.qy.is_finite()
    }
}

// ============================================================
// 单元状态场 (SoA 布局)
// ============================================================

/// 全网格单元状态场（SoA 布局）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellField {
    n_cells: usize,
    /// 自由水面高程 [m]
    pub eta: AlignedVec<f64>,
    /// 运行最大水位 [m]
    pub eta_max: AlignedVec<f64>,
    /// x 方向单宽流量 [m²/s]
    pub qx: AlignedVec<f64>,
    /// y 方向单宽流量 [m²/s]
    pub qy: AlignedVec<f64>,
}

impl CellField {
    /// 创建零初始化状态场
    pub fn new(n_cells: usize) -> Self {
        Self {
            n_cells,
            eta: AlignedVec::zeros(n_cells),
            eta_max: AlignedVec::zeros(n_cells),
            qx: AlignedVec::zeros(n_cells),
            qy: AlignedVec::zeros(n_cells),
        }
    }

    /// 从初始水位与底床冷启动
    ///
    /// 水位低于底床的单元被钳制到底床；NODATA 底床单元被失效。
    pub fn cold_start(initial_eta: f64, z_bed: &[f64]) -> Self {
        let n_cells = z_bed.len();
        let mut field = Self::new(n_cells);
        for (idx, &z) in z_bed.iter().enumerate() {
            if z <= NODATA_SENTINEL {
                field.eta[idx] = NODATA_SENTINEL;
                field.eta_max[idx] = NODATA_SENTINEL;
            } else {
                field.eta[idx] = initial_eta.max(z);
                field.eta_max[idx] = field.eta[idx];
            }
        }
        field
    }

    /// 单元数量
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 获取单元状态
    #[inline]
    pub fn get(&self, cell: CellIndex) -> CellState {
        let idx = cell.get();
        CellState {
            eta: self.eta[idx],
            eta_max: self.eta_max[idx],
            qx: self.qx[idx],
            qy: self.qy[idx],
        }
    }

    /// 写入单元状态
    #[inline]
    pub fn set(&mut self, cell: CellIndex, state: CellState) {
        let idx = cell.get();
        self.eta[idx] = state.eta;
        self.eta_max[idx] = state.eta_max;
        self.qx[idx] = state.qx;
        self.qy[idx] = state.qy;
    }

    /// 单元是否失效
    #[inline]
    pub fn is_disabled(&self, cell: CellIndex) -> bool {
        let idx = cell.get();
        self.eta_max[idx] <= NODATA_SENTINEL || self.eta[idx] <= NODATA_SENTINEL
    }

    /// 从另一状态场整体复制
    pub fn copy_from(&mut self, other: &Self) {
        debug_assert_eq!(self.n_cells, other.n_cells);
        self.eta.as_mut_slice().copy_from_slice(&other.eta);
        self.eta_max.as_mut_slice().copy_from_slice(&other.eta_max);
        self.qx.as_mut_slice().copy_from_slice(&other.qx);
        self.qy.as_mut_slice().copy_from_slice(&other.qy);
    }

    /// 启用单元上的水体总体积 Σ h·A [m³]
    pub fn total_volume(&self, terrain: &Terrain, cell_area: f64) -> f64 {
        let mut volume = 0.0;
        for idx in 0..self.n_cells {
            if self.eta_max[idx] <= NODATA_SENTINEL || self.eta[idx] <= NODATA_SENTINEL {
                continue;
            }
            let h = self.eta[idx] - terrain.z_bed[idx];
            if h > 0.0 {
                volume += h * cell_area;
            }
        }
        volume
    }

    /// 检查状态有效性（NaN/Inf 检测，管流毒化经此上浮）
    pub fn validate(&self, time: f64) -> ThResult<()> {
        for idx in 0..self.n_cells {
            if self.eta_max[idx] <= NODATA_SENTINEL {
                continue;
            }
            if !self.eta[idx].is_finite() || !self.qx[idx].is_finite() || !self.qy[idx].is_finite()
            {
                return Err(ThError::internal(format!(
                    "单元 {} 状态非有限 (t={:.6}s): eta={}, qx={}, qy={}",
                    idx, time, self.eta[idx], self.qx[idx], self.qy[idx]
                )));
            }
        }
        Ok(())
    }
}

// ============================================================
// 静态地形场
// ============================================================

/// 静态地形场：底床高程与曼宁糙率（初始化后不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    /// 底床高程 [m]；≤ −9999 表示 NODATA
    pub z_bed: AlignedVec<f64>,
    /// 曼宁糙率系数 [s/m^(1/3)]
    pub manning: AlignedVec<f64>,
}

impl Terrain {
    /// 从底床与糙率数组创建
    pub fn new(z_bed: Vec<f64>, manning: Vec<f64>) -> ThResult<Self> {
        ThError::check_size("manning", z_bed.len(), manning.len())?;
        Ok(Self {
            z_bed: AlignedVec::from_vec(z_bed),
            manning: AlignedVec::from_vec(manning),
        })
    }

    /// 均匀底床与糙率
    pub fn uniform(n_cells: usize, z_bed: f64, manning: f64) -> Self {
        Self {
            z_bed: AlignedVec::splat(n_cells, z_bed),
            manning: AlignedVec::splat(n_cells, manning),
        }
    }

    /// 单元是否为 NODATA
    #[inline]
    pub fn is_nodata(&self, cell: CellIndex) -> bool {
        self.z_bed[cell.get()] <= NODATA_SENTINEL
    }
}

// ============================================================
// 乒乓状态对
// ============================================================

/// 乒乓状态对
///
/// 格式核从源缓冲读、向目标缓冲写，主机在步间交换，
/// 避免核内读写别名。
#[derive(Debug, Clone)]
pub struct PingPongState {
    front: CellField,
    back: CellField,
    front_active: bool,
}

impl PingPongState {
    /// 从初始状态场创建（两份拷贝）
    pub fn new(initial: CellField) -> Self {
        let back = initial.clone();
        Self {
            front: initial,
            back,
            front_active: true,
        }
    }

    /// 当前源（读取）缓冲
    #[inline]
    pub fn src(&self) -> &CellField {
        if self.front_active {
            &self.front
        } else {
            &self.back
        }
    }

    /// 当前源缓冲（可变，供边界核就地修改）
    #[inline]
    pub fn src_mut(&mut self) -> &mut CellField {
        if self.front_active {
            &mut self.front
        } else {
            &mut self.back
        }
    }

    /// 源与目标缓冲对（供格式核使用）
    #[inline]
    pub fn pair_mut(&mut self) -> (&CellField, &mut CellField) {
        if self.front_active {
            (&self.front, &mut self.back)
        } else {
            (&self.back, &mut self.front)
        }
    }

    /// 交换缓冲区
    #[inline]
    pub fn swap(&mut self) {
        self.front_active = !self.front_active;
    }

    /// 单元数量
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.front.n_cells()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_state_basic() {
        let state = CellState::new(1.5, 2.0, 0.3, -0.1);
        assert!((state.depth(0.5) - 1.0).abs() < 1e-15);
        assert!(!state.is_disabled());
        assert!(state.is_finite());
    }

    #[test]
    fn test_disabled_detection() {
        let disabled = CellState::new(-9999.0, -9999.0, 0.0, 0.0);
        assert!(disabled.is_disabled());

        let max_only = CellState::new(1.0, -9999.5, 0.0, 0.0);
        assert!(max_only.is_disabled());
    }

    #[test]
    fn test_velocity() {
        let params = NumericalParams::default();
        let state = CellState::new(2.0, 2.0, 4.0, 1.0);
        let vel = state.velocity(0.0, &params);
        assert!((vel.x - 2.0).abs() < 1e-12);
        assert!((vel.y - 0.5).abs() < 1e-12);

        let dry = CellState::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(dry.velocity(0.0, &params), DVec2::ZERO);
    }

    #[test]
    fn test_cold_start() {
        let z_bed = vec![-2.0, 0.5, -10000.0, 1.5];
        let field = CellField::cold_start(1.0, &z_bed);

        assert!((field.eta[0] - 1.0).abs() < 1e-15);
        assert!((field.eta[1] - 1.0).abs() < 1e-15);
        assert!(field.is_disabled(CellIndex(2)));
        // 干单元钳制到底床
        assert!((field.eta[3] - 1.5).abs() < 1e-15);
    }

    #[test]
    fn test_total_volume() {
        let z_bed = vec![0.0; 4];
        let terrain = Terrain::new(z_bed.clone(), vec![0.03; 4]).unwrap();
        let field = CellField::cold_start(0.5, &z_bed);
        let volume = field.total_volume(&terrain, 2.0);
        assert!((volume - 4.0 * 0.5 * 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_detects_nan() {
        let mut field = CellField::cold_start(1.0, &[0.0; 4]);
        assert!(field.validate(0.0).is_ok());
        field.qx[2] = f64::NAN;
        assert!(field.validate(0.0).is_err());
    }

    #[test]
    fn test_ping_pong_swap() {
        let field = CellField::cold_start(1.0, &[0.0; 9]);
        let mut pp = PingPongState::new(field);

        {
            let (src, dst) = pp.pair_mut();
            assert!((src.eta[0] - 1.0).abs() < 1e-15);
            dst.eta[0] = 2.0;
        }
        pp.swap();
        assert!((pp.src().eta[0] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_terrain_size_mismatch() {
        assert!(Terrain::new(vec![0.0; 4], vec![0.03; 3]).is_err());
    }
}
