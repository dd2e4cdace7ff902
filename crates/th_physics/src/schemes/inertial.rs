// crates/th_physics/src/schemes/inertial.rs

//! 惯性简化格式（低精度、高速度的替代格式）
//!
//! 逐界面显式更新单宽流量，摩擦以半隐式分母形式内嵌：
//!
//! ```text
//! q' = (q − g·h·Δt·∂η/∂x) / (1 + g·h·Δt·n²·|q|/h^(10/3))
//! ```
//!
//! 过流水深 h = max(η_L, η_R) − max(z_L, z_R)。Froude 限制器
//! 钳制 |q'| ≤ Fr_max·h·√(gh)，单步反向穿零的流量被钳制为零。
//!
//! 存储约定：单元的 q_x 为其东侧界面流量，q_y 为其北侧界面流量。
//! 连续方程按 Δx⁻¹/Δy⁻¹ 分项差分（不假设方形单元）。

use rayon::prelude::*;
use th_foundation::constants::NODATA_SENTINEL;
use th_foundation::CellIndex;

use crate::grid::{CartesianGrid, Direction};
use crate::state::{CellField, Terrain};
use crate::types::SolverConfig;

/// 一个界面的流量更新
///
/// `eta_low`/`z_low` 为低坐标侧，`eta_high`/`z_high` 为高坐标侧；
/// `q_prev` 为该界面上一步流量（正向指向坐标增大方向）。
#[inline]
fn face_discharge(
    eta_low: f64,
    z_low: f64,
    eta_high: f64,
    z_high: f64,
    manning: f64,
    q_prev: f64,
    spacing_inv: f64,
    dt: f64,
    gravity: f64,
    eps: f64,
    froude_max: f64,
) -> f64 {
    let h_flow = eta_low.max(eta_high) - z_low.max(z_high);
    if h_flow <= eps {
        return 0.0;
    }

    let slope = (eta_high - eta_low) * spacing_inv;
    let numerator = q_prev - gravity * h_flow * dt * slope;
    let denominator =
        1.0 + gravity * h_flow * dt * manning * manning * q_prev.abs() / h_flow.powf(10.0 / 3.0);
    let mut q_new = numerator / denominator;

    // Froude 限制器
    let q_limit = froude_max * h_flow * (gravity * h_flow).sqrt();
    q_new = q_new.clamp(-q_limit, q_limit);

    // 单步反向穿零钳制
    if q_prev != 0.0 && q_new * q_prev < 0.0 {
        q_new = 0.0;
    }

    q_new
}

/// 界面描述：低/高坐标侧单元索引
#[inline]
fn face_cells(
    grid: &CartesianGrid,
    cell: CellIndex,
    dir: Direction,
) -> (usize, usize) {
    let nb = grid.neighbour(cell, dir).get();
    if dir.cell_is_low_side() {
        (cell.get(), nb)
    } else {
        (nb, cell.get())
    }
}

/// 单元是否失效或 NODATA
#[inline]
fn unusable(src: &CellField, terrain: &Terrain, idx: usize) -> bool {
    src.eta_max[idx] <= NODATA_SENTINEL
        || src.eta[idx] <= NODATA_SENTINEL
        || terrain.z_bed[idx] <= NODATA_SENTINEL
}

/// 重算某单元某方向界面的流量；墙界面（自环/失效邻居）返回零
#[inline]
fn compute_face(
    grid: &CartesianGrid,
    terrain: &Terrain,
    src: &CellField,
    owner: CellIndex,
    dir: Direction,
    dt: f64,
    config: &SolverConfig,
) -> f64 {
    let params = &config.params;
    let nb = grid.neighbour(owner, dir);
    if nb == owner || unusable(src, terrain, nb.get()) || unusable(src, terrain, owner.get()) {
        return 0.0;
    }

    let (low, high) = face_cells(grid, owner, dir);
    // 界面流量存储在低坐标侧单元上（东/北面约定）
    let q_prev = if dir.is_x_axis() {
        src.qx[low]
    } else {
        src.qy[low]
    };
    let spacing_inv = if dir.is_x_axis() {
        grid.dx_inv()
    } else {
        grid.dy_inv()
    };
    let manning = 0.5 * (terrain.manning[low] + terrain.manning[high]);

    face_discharge(
        src.eta[low],
        terrain.z_bed[low],
        src.eta[high],
        terrain.z_bed[high],
        manning,
        q_prev,
        spacing_inv,
        dt,
        params.gravity,
        params.very_small,
        params.froude_max,
    )
}

/// 惯性简化格式整场更新：src → dst
pub fn inertial_step(
    grid: &CartesianGrid,
    terrain: &Terrain,
    src: &CellField,
    dst: &mut CellField,
    dt: f64,
    config: &SolverConfig,
) {
    debug_assert_eq!(src.n_cells(), grid.n_cells());
    let eps = config.params.very_small;

    let (dst_eta, dst_eta_max, dst_qx, dst_qy) = (
        dst.eta.as_mut_slice(),
        dst.eta_max.as_mut_slice(),
        dst.qx.as_mut_slice(),
        dst.qy.as_mut_slice(),
    );

    dst_eta
        .par_iter_mut()
        .zip(dst_eta_max.par_iter_mut())
        .zip(dst_qx.par_iter_mut())
        .zip(dst_qy.par_iter_mut())
        .enumerate()
        .for_each(|(idx, (((eta, eta_max), qx), qy))| {
            let cell = CellIndex(idx);
            let state = src.get(cell);

            if state.is_disabled() || grid.is_perimeter(cell) {
                *eta = state.eta;
                *eta_max = state.eta_max;
                *qx = state.qx;
                *qy = state.qy;
                return;
            }

            let z = terrain.z_bed[idx];

            // 全干邻域跳过
            let cell_dry = state.eta - z < eps;
            let all_dry = cell_dry
                && Direction::ALL.iter().all(|d| {
                    let nb = grid.neighbour(cell, *d).get();
                    src.eta[nb] - terrain.z_bed[nb] < eps
                });
            if all_dry {
                *eta = state.eta;
                *eta_max = state.eta_max;
                *qx = state.qx;
                *qy = state.qy;
                return;
            }

            // 自有东/北界面与相邻单元共享的西/南界面
            let q_east = compute_face(grid, terrain, src, cell, Direction::East, dt, config);
            let q_north = compute_face(grid, terrain, src, cell, Direction::North, dt, config);
            let q_west = compute_face(grid, terrain, src, cell, Direction::West, dt, config);
            let q_south = compute_face(grid, terrain, src, cell, Direction::South, dt, config);

            let mut eta_new = state.eta
                + dt * ((q_west - q_east) * grid.dx_inv() + (q_south - q_north) * grid.dy_inv());

            if eta_new - z < eps {
                eta_new = z;
            }

            *eta = eta_new;
            *eta_max = state.eta_max.max(eta_new);
            *qx = q_east;
            *qy = q_north;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PingPongState;
    use crate::types::{SchemeKind, SolverConfig};

    fn config() -> SolverConfig {
        SolverConfig::builder().scheme(SchemeKind::Inertial).build()
    }

    #[test]
    fn test_face_discharge_downhill() {
        // 东高西低 → 向西（负）流量
        let q = face_discharge(
            1.0, 0.0, 1.5, 0.0, 0.03, 0.0, 1.0, 0.1, 9.80665, 1e-14, 0.8,
        );
        assert!(q < 0.0);
    }

    #[test]
    fn test_face_discharge_dry() {
        let q = face_discharge(
            0.5, 0.5, 0.3, 0.3, 0.03, 0.2, 1.0, 0.1, 9.80665, 1e-14, 0.8,
        );
        assert_eq!(q, 0.0);
    }

    #[test]
    fn test_froude_limiter() {
        // 极陡坡面下流量被钳制在 Froude 上限（过流水深 = max(η) − max(z) = 10）
        let h: f64 = 10.0;
        let g: f64 = 9.80665;
        let q = face_discharge(10.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, g, 1e-14, 0.8);
        let q_limit = 0.8 * h * (g * h).sqrt();
        assert!(q.abs() <= q_limit + 1e-12);
        assert!((q.abs() - q_limit).abs() < 1e-9);
    }

    #[test]
    fn test_zero_crossing_clamp() {
        // 逆坡的正流量单步反向时钳为零
        let q = face_discharge(
            1.0, 0.0, 2.0, 0.0, 0.03, 0.5, 1.0, 10.0, 9.80665, 1e-14, 0.8,
        );
        assert_eq!(q, 0.0);
    }

    #[test]
    fn test_still_water_stable() {
        let grid = CartesianGrid::new(6, 6, 1.0, 1.0).unwrap();
        let n = grid.n_cells();
        let terrain = Terrain::uniform(n, 0.0, 0.03);
        let field = CellField::cold_start(1.0, &vec![0.0; n]);
        let mut state = PingPongState::new(field);
        let cfg = config();

        for _ in 0..100 {
            let (src, dst) = state.pair_mut();
            inertial_step(&grid, &terrain, src, dst, 0.01, &cfg);
            state.swap();
        }

        for idx in 0..n {
            assert!((state.src().eta[idx] - 1.0).abs() < 1e-12);
            assert!(state.src().qx[idx].abs() < 1e-12);
        }
    }

    #[test]
    fn test_mass_conservation() {
        let grid = CartesianGrid::new(8, 8, 1.0, 1.0).unwrap();
        let n = grid.n_cells();
        let mut z_bed = vec![0.0; n];
        for j in 0..8 {
            for i in 0..8 {
                if i == 0 || j == 0 || i == 7 || j == 7 {
                    z_bed[grid.id(i, j).get()] = 10.0;
                }
            }
        }
        let terrain = Terrain::new(z_bed.clone(), vec![0.03; n]).unwrap();
        let mut field = CellField::cold_start(0.5, &z_bed);
        let centre = grid.id(4, 4).get();
        field.eta[centre] = 0.8;
        field.eta_max[centre] = 0.8;

        let mut state = PingPongState::new(field);
        let cfg = config();
        let volume_initial = state.src().total_volume(&terrain, grid.cell_area());

        for _ in 0..500 {
            let (src, dst) = state.pair_mut();
            inertial_step(&grid, &terrain, src, dst, 0.005, &cfg);
            state.swap();
        }

        let volume_final = state.src().total_volume(&terrain, grid.cell_area());
        assert!(
            (volume_final - volume_initial).abs() / volume_initial < 1e-9,
            "质量不守恒: {} -> {}",
            volume_initial,
            volume_final
        );
    }

    #[test]
    fn test_gradient_drives_flow() {
        let grid = CartesianGrid::new(8, 4, 1.0, 1.0).unwrap();
        let n = grid.n_cells();
        let z_bed = vec![0.0; n];
        let terrain = Terrain::new(z_bed.clone(), vec![0.03; n]).unwrap();
        let mut field = CellField::cold_start(0.5, &z_bed);
        // 左半高水位
        for j in 0..4 {
            for i in 0..4 {
                let idx = grid.id(i, j).get();
                field.eta[idx] = 1.0;
                field.eta_max[idx] = 1.0;
            }
        }

        let mut state = PingPongState::new(field);
        let cfg = config();
        for _ in 0..10 {
            let (src, dst) = state.pair_mut();
            inertial_step(&grid, &terrain, src, dst, 0.01, &cfg);
            state.swap();
        }

        // 界面处向东流量为正
        let probe = grid.id(3, 2).get();
        assert!(
            state.src().qx[probe] > 0.0,
            "高水位侧应向东泄流, qx={}",
            state.src().qx[probe]
        );
    }
}
