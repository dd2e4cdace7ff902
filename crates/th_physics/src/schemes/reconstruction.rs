// crates/th_physics/src/schemes/reconstruction.rs

//! 保深度正性的界面重构
//!
//! 在相邻单元之间重构界面两侧状态，保证重构水深非负，
//! 并通过垂向基准面平移在干湿锋面处保持静水平衡。
//!
//! # 算法
//!
//! 1. 原始水深 h = η − z_b，流速 u = q_x/h（干单元取零）
//! 2. 界面底床 z_b* = max(z_L, z_R)，平移量 shift = max(0, z_b* − η_ref)
//! 3. 各侧 h' = max(η − z_b*, 0)，η' = h' + z_b*，q' = h'·(u, v)
//! 4. 垂向平移：z_b* ← z_b* − shift，η' ← η' − shift
//! 5. 阻断计数 stop：一侧干且另一侧沿界面方向的流速指向干侧时
//!    （该流速被清零），或湿侧重构前流量背离界面时，均递增
//!
//! 任一界面 stop > 0 的单元在通量更新后流量被清零（流动阻断规则）。

use crate::grid::Direction;

/// 界面一侧的重构输入
#[derive(Debug, Clone, Copy)]
pub struct FaceInput {
    /// 自由水面高程 [m]
    pub eta: f64,
    /// x 方向单宽流量 [m²/s]
    pub qx: f64,
    /// y 方向单宽流量 [m²/s]
    pub qy: f64,
    /// 底床高程 [m]
    pub z_bed: f64,
}

/// 界面一侧的重构结果
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceSide {
    /// 重构水位 [m]
    pub eta: f64,
    /// 重构水深 [m]（非负）
    pub h: f64,
    /// x 方向单宽流量 [m²/s]
    pub qx: f64,
    /// y 方向单宽流量 [m²/s]
    pub qy: f64,
    /// x 方向流速 [m/s]
    pub u: f64,
    /// y 方向流速 [m/s]
    pub v: f64,
}

/// 界面重构结果
///
/// `left` 为界面低坐标侧，`right` 为高坐标侧；`z_face` 为平移后的
/// 界面底床高程，两侧共享。
#[derive(Debug, Clone, Copy)]
pub struct InterfaceStates {
    /// 低坐标侧
    pub left: InterfaceSide,
    /// 高坐标侧
    pub right: InterfaceSide,
    /// 平移后的界面底床高程 [m]
    pub z_face: f64,
    /// 阻断计数
    pub stop: u32,
}

#[inline]
fn reconstruct_side(input: &FaceInput, z_face: f64, eps: f64) -> InterfaceSide {
    let h_raw = input.eta - input.z_bed;
    let (u, v) = if h_raw < eps {
        (0.0, 0.0)
    } else {
        (input.qx / h_raw, input.qy / h_raw)
    };

    let h = (input.eta - z_face).max(0.0);
    InterfaceSide {
        eta: h + z_face,
        h,
        qx: h * u,
        qy: h * v,
        u,
        v,
    }
}

/// 重构一个界面
///
/// `dir` 为从本单元指向邻居的方向；`cell` 为本单元、`neighbour`
/// 为邻居的输入量。基准水位 η_ref 取本单元水位。
pub fn reconstruct_interface(
    dir: Direction,
    cell: &FaceInput,
    neighbour: &FaceInput,
    eps: f64,
) -> InterfaceStates {
    // N/E 方向本单元在低坐标侧
    let (low, high) = if dir.cell_is_low_side() {
        (cell, neighbour)
    } else {
        (neighbour, cell)
    };

    let mut z_face = low.z_bed.max(high.z_bed);
    let shift = (z_face - cell.eta).max(0.0);

    let mut left = reconstruct_side(low, z_face, eps);
    let mut right = reconstruct_side(high, z_face, eps);

    z_face -= shift;
    left.eta -= shift;
    right.eta -= shift;

    // 阻断条件
    let mut stop = 0u32;
    let x_axis = dir.is_x_axis();
    let (un_left, un_right) = if x_axis {
        (left.u, right.u)
    } else {
        (left.v, right.v)
    };
    let (q_raw_low, q_raw_high) = if x_axis {
        (low.qx, high.qx)
    } else {
        (low.qy, high.qy)
    };

    if right.h <= eps {
        if un_left > 0.0 {
            stop += 1;
            if x_axis {
                left.u = 0.0;
                left.qx = 0.0;
            } else {
                left.v = 0.0;
                left.qy = 0.0;
            }
        }
        if q_raw_low < 0.0 {
            stop += 1;
        }
    }
    if left.h <= eps {
        if un_right < 0.0 {
            stop += 1;
            if x_axis {
                right.u = 0.0;
                right.qx = 0.0;
            } else {
                right.v = 0.0;
                right.qy = 0.0;
            }
        }
        if q_raw_high > 0.0 {
            stop += 1;
        }
    }

    InterfaceStates {
        left,
        right,
        z_face,
        stop,
    }
}
