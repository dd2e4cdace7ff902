// crates/th_physics/src/schemes/riemann/hllc.rs

//! HLLC 近似黎曼求解器
//!
//! HLLC (Harten-Lax-van Leer-Contact) 在接触间断与干湿界面处
//! 保持高分辨率。波速采用双稀疏波估计；动量压力项使用
//! `½g(η² − 2ηz_b)` 的底床线性化形式以维持静水平衡。
//!
//! # 区域选择
//!
//! - `s_L ≥ 0` → 左物理通量
//! - `s_R ≤ 0` → 右物理通量
//! - 否则取星区域通量，横向动量按接触波速 `s_M` 的符号
//!   取左或右侧切向流速

use super::Flux;
use crate::grid::Direction;
use crate::schemes::reconstruction::InterfaceStates;

/// 面坐标系下的物理通量 (质量, 法向动量, 切向动量)
#[inline]
fn physical_flux(h: f64, eta: f64, un: f64, ut: f64, z_face: f64, gravity: f64) -> (f64, f64, f64) {
    let q_n = h * un;
    (
        q_n,
        un * q_n + 0.5 * gravity * (eta * eta - 2.0 * eta * z_face),
        q_n * ut,
    )
}

/// 计算一个界面的 HLLC 通量
///
/// `iface` 为重构结果（`left` 低坐标侧、`right` 高坐标侧），
/// 返回全局 x/y 分量形式的通量，法向沿界面轴正向。
pub fn hllc_flux(dir: Direction, iface: &InterfaceStates, gravity: f64, eps: f64) -> Flux {
    let x_axis = dir.is_x_axis();
    let (l, r) = (&iface.left, &iface.right);
    let z_face = iface.z_face;

    // 面坐标系：法向沿轴正向，切向为另一轴
    let (un_l, ut_l) = if x_axis { (l.u, l.v) } else { (l.v, l.u) };
    let (un_r, ut_r) = if x_axis { (r.u, r.v) } else { (r.v, r.u) };

    let left_dry = l.h < eps;
    let right_dry = r.h < eps;

    // 两侧均干：仅静水压力通量，无对流分量
    if left_dry && right_dry {
        let eta_mean = 0.5 * (l.eta + r.eta);
        let pressure = 0.5 * gravity * (eta_mean * eta_mean - 2.0 * eta_mean * z_face);
        return to_global(x_axis, 0.0, pressure, 0.0);
    }

    let a_l = (gravity * l.h).sqrt();
    let a_r = (gravity * r.h).sqrt();

    // 双稀疏波估计
    let a_bar = 0.5 * (a_l + a_r);
    let h_star = {
        let tmp = a_bar + 0.25 * (un_l - un_r);
        tmp * tmp / gravity
    };
    let u_star = 0.5 * (un_l + un_r) + a_l - a_r;
    let a_star = (gravity * h_star).sqrt();

    let s_l = if left_dry {
        un_r - 2.0 * a_r
    } else {
        (un_l - a_l).min(u_star - a_star)
    };
    let s_r = if right_dry {
        un_l + 2.0 * a_l
    } else {
        (un_r + a_r).max(u_star + a_star)
    };

    let (f_l1, f_l2, _) = physical_flux(l.h, l.eta, un_l, ut_l, z_face, gravity);
    let (f_r1, f_r2, _) = physical_flux(r.h, r.eta, un_r, ut_r, z_face, gravity);

    if s_l >= 0.0 {
        return to_global(x_axis, f_l1, f_l2, f_l1 * ut_l);
    }
    if s_r <= 0.0 {
        return to_global(x_axis, f_r1, f_r2, f_r1 * ut_r);
    }

    let span = s_r - s_l;
    if span < eps {
        return to_global(x_axis, f_l1, f_l2, f_l1 * ut_l);
    }

    // 接触波速
    let q_nl = l.h * un_l;
    let q_nr = r.h * un_r;
    let denom = r.h * (un_r - s_r) - l.h * (un_l - s_l);
    let s_m = if denom.abs() < eps {
        0.0
    } else {
        (s_l * r.h * (un_r - s_r) - s_r * l.h * (un_l - s_l)) / denom
    };

    let inv = 1.0 / span;
    let f1 = (s_r * f_l1 - s_l * f_r1 + s_l * s_r * (r.h - l.h)) * inv;
    let f2 = (s_r * f_l2 - s_l * f_r2 + s_l * s_r * (q_nr - q_nl)) * inv;
    let f3 = if s_m >= 0.0 { f1 * ut_l } else { f1 * ut_r };

    to_global(x_axis, f1, f2, f3)
}

/// 面坐标系 → 全局分量
#[inline]
fn to_global(x_axis: bool, mass: f64, mom_n: f64, mom_t: f64) -> Flux {
    if x_axis {
        Flux::new(mass, mom_n, mom_t)
    } else {
        Flux::new(mass, mom_t, mom_n)
    }
}
