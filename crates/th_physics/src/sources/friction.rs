// crates/th_physics/src/sources/friction.rs

//! 点隐式曼宁摩擦
//!
//! 摩擦系数 C_f = g·n²/h^(1/3)，减速度经点隐式分母缩放以保证
//! 大糙率/浅水深下的数值稳定。
//!
//! 摩擦只削减流量，永不反向：减速度被钳制在单步内恰好
//! 归零流量的水平。

use rayon::prelude::*;
use th_foundation::constants::NODATA_SENTINEL;

use crate::state::{CellField, Terrain};
use crate::types::NumericalParams;

/// 单个单元的点隐式摩擦更新
///
/// 返回更新后的 (q_x, q_y)。干单元或静止单元原样返回。
#[inline]
pub fn friction_update(
    eta: f64,
    qx: f64,
    qy: f64,
    z_bed: f64,
    manning: f64,
    dt: f64,
    params: &NumericalParams,
) -> (f64, f64) {
    let h = eta - z_bed;
    if h < params.very_small {
        return (qx, qy);
    }

    let discharge = (qx * qx + qy * qy).sqrt();
    if discharge < params.very_small {
        return (qx, qy);
    }

    let cf = params.gravity * manning * manning / h.cbrt();
    let cf_h2 = cf / (h * h);

    let s_fx = -cf_h2 * qx * discharge;
    let s_fy = -cf_h2 * qy * discharge;

    let denom_x = 1.0 + dt * cf_h2 * (2.0 * qx * qx + qy * qy) / discharge;
    let denom_y = 1.0 + dt * cf_h2 * (qx * qx + 2.0 * qy * qy) / discharge;

    let mut fx = s_fx / denom_x;
    let mut fy = s_fy / denom_y;

    // 只减速不反向
    if qx >= 0.0 {
        fx = fx.max(-qx / dt);
    } else {
        fx = fx.min(-qx / dt);
    }
    if qy >= 0.0 {
        fy = fy.max(-qy / dt);
    } else {
        fy = fy.min(-qy / dt);
    }

    (qx + dt * fx, qy + dt * fy)
}

/// 独立摩擦核：对整场应用点隐式摩擦
///
/// 跳过失效单元；与格式核内联版本语义一致。
pub fn apply_friction_field(
    terrain: &Terrain,
    field: &mut CellField,
    dt: f64,
    params: &NumericalParams,
) {
    debug_assert_eq!(terrain.z_bed.len(), field.n_cells());

    // 字段拆借：eta/eta_max 只读，qx/qy 可变
    let eta = &field.eta;
    let eta_max = &field.eta_max;
    let qx_field = &mut field.qx;
    let qy_field = &mut field.qy;

    qx_field
        .as_mut_slice()
        .par_iter_mut()
        .zip(qy_field.as_mut_slice().par_iter_mut())
        .enumerate()
        .for_each(|(idx, (qx, qy))| {
            if eta_max[idx] <= NODATA_SENTINEL
                || eta[idx] <= NODATA_SENTINEL
                || terrain.z_bed[idx] <= NODATA_SENTINEL
            {
                return;
            }
            let (qx_new, qy_new) = friction_update(
                eta[idx],
                *qx,
                *qy,
                terrain.z_bed[idx],
                terrain.manning[idx],
                dt,
                params,
            );
            *qx = qx_new;
            *qy = qy_new;
        });
}
