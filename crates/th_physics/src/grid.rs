// crates/th_physics/src/grid.rs

//! 结构化笛卡尔网格
//!
//! 行主序二维单元网格：`id(i, j) = j * cols + i`。
//! 越界邻居钳制到边界环单元，边界环不被格式核更新。

use serde::{Deserialize, Serialize};
use th_foundation::{CellIndex, ThError, ThResult};

/// 邻居方向
///
/// 北为 +y，东为 +x。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +y
    North,
    /// +x
    East,
    /// -y
    South,
    /// -x
    West,
}

impl Direction {
    /// 四个方向，按 N/E/S/W 顺序
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// 界面轴是否为 x 轴
    #[inline]
    pub fn is_x_axis(&self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }

    /// 单元是否位于该方向界面的低坐标（"左"）侧
    ///
    /// N/E 方向单元为左侧，S/W 方向单元为右侧。
    #[inline]
    pub fn cell_is_low_side(&self) -> bool {
        matches!(self, Direction::North | Direction::East)
    }
}

/// 结构化笛卡尔网格（初始化后不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesianGrid {
    cols: usize,
    rows: usize,
    dx: f64,
    dy: f64,
    dx_inv: f64,
    dy_inv: f64,
}

impl CartesianGrid {
    /// 创建网格
    ///
    /// 要求至少 3×3（内部至少一个可更新单元）且间距为正。
    pub fn new(cols: usize, rows: usize, dx: f64, dy: f64) -> ThResult<Self> {
        if cols < 3 || rows < 3 {
            return Err(ThError::invalid_input(format!(
                "网格至少 3x3，给定 {}x{}",
                cols, rows
            )));
        }
        if dx <= 0.0 || dy <= 0.0 {
            return Err(ThError::invalid_input(format!(
                "单元间距必须为正: dx={}, dy={}",
                dx, dy
            )));
        }

        Ok(Self {
            cols,
            rows,
            dx,
            dy,
            dx_inv: 1.0 / dx,
            dy_inv: 1.0 / dy,
        })
    }

    /// 列数
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// 行数
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// x 方向间距 [m]
    #[inline]
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// y 方向间距 [m]
    #[inline]
    pub fn dy(&self) -> f64 {
        self.dy
    }

    /// 1/Δx
    #[inline]
    pub fn dx_inv(&self) -> f64 {
        self.dx_inv
    }

    /// 1/Δy
    #[inline]
    pub fn dy_inv(&self) -> f64 {
        self.dy_inv
    }

    /// 最小间距 min(Δx, Δy)
    #[inline]
    pub fn min_spacing(&self) -> f64 {
        self.dx.min(self.dy)
    }

    /// 单元面积 [m²]
    #[inline]
    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    /// 单元总数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cols * self.rows
    }

    /// 线性索引
    #[inline]
    pub fn id(&self, i: usize, j: usize) -> CellIndex {
        debug_assert!(i < self.cols && j < self.rows);
        CellIndex(j * self.cols + i)
    }

    /// 线性索引 → (列, 行)
    #[inline]
    pub fn coords(&self, cell: CellIndex) -> (usize, usize) {
        (cell.0 % self.cols, cell.0 / self.cols)
    }

    /// 方向邻居，越界时钳制到边界环单元（返回自身所在边界单元）
    #[inline]
    pub fn neighbour(&self, cell: CellIndex, dir: Direction) -> CellIndex {
        let (i, j) = self.coords(cell);
        let (ni, nj) = match dir {
            Direction::North => (i, (j + 1).min(self.rows - 1)),
            Direction::East => ((i + 1).min(self.cols - 1), j),
            Direction::South => (i, j.saturating_sub(1)),
            Direction::West => (i.saturating_sub(1), j),
        };
        self.id(ni, nj)
    }

    /// 是否为边界环单元（不被格式核更新）
    #[inline]
    pub fn is_perimeter(&self, cell: CellIndex) -> bool {
        let (i, j) = self.coords(cell);
        i == 0 || j == 0 || i == self.cols - 1 || j == self.rows - 1
    }
}
