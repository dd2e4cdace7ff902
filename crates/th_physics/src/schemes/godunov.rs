// crates/th_physics/src/schemes/godunov.rs

//! Godunov 一阶逐单元更新核（主机参考后端）
//!
//! 每个非边界环单元：四向界面重构 + HLLC 通量 + 底坡源项 +
//! 可选核内摩擦，写入目标缓冲。与设备端 WGSL 核语义一致。
//!
//! 邻居为失效/NODATA 单元时按反射墙处理（镜像轴向流量），
//! 保证封闭域质量守恒。

use rayon::prelude::*;
use th_foundation::constants::NODATA_SENTINEL;
use th_foundation::CellIndex;

use crate::grid::{CartesianGrid, Direction};
use crate::schemes::reconstruction::{reconstruct_interface, FaceInput};
use crate::schemes::riemann::{hllc_flux, Flux};
use crate::sources::friction::friction_update;
use crate::state::{CellField, CellState, Terrain};
use crate::types::{FrictionMode, SolverConfig};

/// 单元及其四个邻居的就绪输入
pub(crate) struct CellInputs {
    cell: FaceInput,
    neighbours: [FaceInput; 4],
}

/// 读取一个单元的 FaceInput
#[inline]
fn load_face(src: &CellField, terrain: &Terrain, idx: usize) -> FaceInput {
    FaceInput {
        eta: src.eta[idx],
        qx: src.qx[idx],
        qy: src.qy[idx],
        z_bed: terrain.z_bed[idx],
    }
}

/// 失效邻居的反射虚单元：镜像轴向流量
#[inline]
fn reflective_ghost(cell: &FaceInput, dir: Direction) -> FaceInput {
    let mut ghost = *cell;
    if dir.is_x_axis() {
        ghost.qx = -ghost.qx;
    } else {
        ghost.qy = -ghost.qy;
    }
    ghost
}

#[inline]
fn gather_inputs(
    grid: &CartesianGrid,
    terrain: &Terrain,
    src: &CellField,
    cell_idx: CellIndex,
) -> CellInputs {
    let cell = load_face(src, terrain, cell_idx.get());

    let mut neighbours = [cell; 4];
    for (slot, dir) in Direction::ALL.iter().enumerate() {
        let nb = grid.neighbour(cell_idx, *dir);
        let nb_idx = nb.get();
        let disabled = src.eta_max[nb_idx] <= NODATA_SENTINEL
            || src.eta[nb_idx] <= NODATA_SENTINEL
            || terrain.z_bed[nb_idx] <= NODATA_SENTINEL;
        neighbours[slot] = if disabled {
            reflective_ghost(&cell, *dir)
        } else {
            load_face(src, terrain, nb_idx)
        };
    }

    CellInputs { cell, neighbours }
}

/// 计算单个单元的 Godunov 更新
///
/// 返回写入目标缓冲的新状态。
pub(crate) fn update_cell(
    grid: &CartesianGrid,
    inputs: &CellInputs,
    state: CellState,
    manning: f64,
    dt: f64,
    config: &SolverConfig,
) -> CellState {
    let params = &config.params;
    let eps = params.very_small;
    let gravity = params.gravity;
    let cell = &inputs.cell;

    // 五单元全干则跳过
    let cell_dry = cell.eta - cell.z_bed < eps;
    let all_dry = cell_dry
        && inputs
            .neighbours
            .iter()
            .all(|nb| nb.eta - nb.z_bed < eps);
    if all_dry {
        return state;
    }

    let mut fluxes = [Flux::ZERO; 4];
    let mut face_eta = [0.0f64; 4];
    let mut face_z = [0.0f64; 4];
    let mut stop_total = 0u32;

    for (slot, dir) in Direction::ALL.iter().enumerate() {
        let iface = reconstruct_interface(*dir, cell, &inputs.neighbours[slot], eps);
        stop_total += iface.stop;

        // 源项使用本单元侧的重构水位与平移后的界面底床
        let cell_side = if dir.cell_is_low_side() {
            &iface.left
        } else {
            &iface.right
        };
        face_eta[slot] = cell_side.eta;
        face_z[slot] = iface.z_face;

        fluxes[slot] = hllc_flux(*dir, &iface, gravity, eps);
    }

    const NORTH: usize = 0;
    const EAST: usize = 1;
    const SOUTH: usize = 2;
    const WEST: usize = 3;

    let eta_ew = 0.5 * (face_eta[EAST] + face_eta[WEST]);
    let eta_ns = 0.5 * (face_eta[NORTH] + face_eta[SOUTH]);
    let source_x = -gravity * eta_ew * (face_z[EAST] - face_z[WEST]) * grid.dx_inv();
    let source_y = -gravity * eta_ns * (face_z[NORTH] - face_z[SOUTH]) * grid.dy_inv();

    let mut delta_eta = (fluxes[EAST].mass - fluxes[WEST].mass) * grid.dx_inv()
        + (fluxes[NORTH].mass - fluxes[SOUTH].mass) * grid.dy_inv();
    let mut delta_qx = (fluxes[EAST].mom_x - fluxes[WEST].mom_x) * grid.dx_inv()
        + (fluxes[NORTH].mom_x - fluxes[SOUTH].mom_x) * grid.dy_inv()
        - source_x;
    let mut delta_qy = (fluxes[EAST].mom_y - fluxes[WEST].mom_y) * grid.dx_inv()
        + (fluxes[NORTH].mom_y - fluxes[SOUTH].mom_y) * grid.dy_inv()
        - source_y;

    if delta_eta.abs() < eps {
        delta_eta = 0.0;
    }
    if delta_qx.abs() < eps {
        delta_qx = 0.0;
    }
    if delta_qy.abs() < eps {
        delta_qy = 0.0;
    }

    let mut eta_new = state.eta - dt * delta_eta;
    let (mut qx_new, mut qy_new) = if stop_total > 0 {
        (0.0, 0.0)
    } else {
        (state.qx - dt * delta_qx, state.qy - dt * delta_qy)
    };

    if config.friction == FrictionMode::InKernel && eta_new - cell.z_bed >= eps {
        let (qx_f, qy_f) = friction_update(
            eta_new,
            qx_new,
            qy_new,
            cell.z_bed,
            manning,
            dt,
            params,
        );
        qx_new = qx_f;
        qy_new = qy_f;
    }

    if eta_new - cell.z_bed < eps {
        eta_new = cell.z_bed;
    }

    CellState {
        eta: eta_new,
        eta_max: state.eta_max.max(eta_new),
        qx: qx_new,
        qy: qy_new,
    }
}

/// Godunov 格式整场更新：src → dst
pub fn godunov_step(
    grid: &CartesianGrid,
    terrain: &Terrain,
    src: &CellField,
    dst: &mut CellField,
    dt: f64,
    config: &SolverConfig,
) {
    debug_assert_eq!(src.n_cells(), grid.n_cells());
    debug_assert_eq!(dst.n_cells(), grid.n_cells());

    let debug_idx = config
        .debug_cell
        .map(|(x, y)| grid.id(x.min(grid.cols() - 1), y.min(grid.rows() - 1)).get());

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
            let cell_idx = CellIndex(idx);
            let state = src.get(cell_idx);

            // 失效与边界环单元原样传递
            let new_state = if state.is_disabled() || grid.is_perimeter(cell_idx) {
                state
            } else {
                let inputs = gather_inputs(grid, terrain, src, cell_idx);
                update_cell(
                    grid,
                    &inputs,
                    state,
                    terrain.manning[idx],
                    dt,
                    config,
                )
            };

            if debug_idx == Some(idx) {
                log::debug!(
                    "cell {}: eta {:.9} -> {:.9}, q ({:.6e}, {:.6e}) -> ({:.6e}, {:.6e})",
                    idx,
                    state.eta,
                    new_state.eta,
                    state.qx,
                    state.qy,
                    new_state.qx,
                    new_state.qy
                );
            }

            *eta = new_state.eta;
            *eta_max = new_state.eta_max;
            *qx = new_state.qx;
            *qy = new_state.qy;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PingPongState;
    use crate::types::SolverConfig;

    fn flat_setup(
        cols: usize,
        rows: usize,
        eta: f64,
    ) -> (CartesianGrid, Terrain, PingPongState, SolverConfig) {
        let grid = CartesianGrid::new(cols, rows, 1.0, 1.0).unwrap();
        let n = grid.n_cells();
        let terrain = Terrain::uniform(n, 0.0, 0.03);
        let field = CellField::cold_start(eta, &vec![0.0; n]);
        let config = SolverConfig::default();
        (grid, terrain, PingPongState::new(field), config)
    }

    #[test]
    fn test_still_water_unchanged() {
        let (grid, terrain, mut state, config) = flat_setup(6, 6, 1.0);

        for _ in 0..20 {
            let (src, dst) = state.pair_mut();
            godunov_step(&grid, &terrain, src, dst, 0.01, &config);
            state.swap();
        }

        for idx in 0..grid.n_cells() {
            assert!(
                (state.src().eta[idx] - 1.0).abs() < 1e-12,
                "单元 {} 水位漂移: {}",
                idx,
                state.src().eta[idx]
            );
            assert!(state.src().qx[idx].abs() < 1e-12);
            assert!(state.src().qy[idx].abs() < 1e-12);
        }
    }

    #[test]
    fn test_lake_at_rest_variable_bed() {
        let grid = CartesianGrid::new(8, 8, 1.0, 1.0).unwrap();
        let n = grid.n_cells();
        let mut z_bed = vec![0.0; n];
        // 起伏底床，全部被淹没
        for j in 0..8 {
            for i in 0..8 {
                z_bed[grid.id(i, j).get()] = 0.2 * ((i + j) % 3) as f64;
            }
        }
        let terrain = Terrain::new(z_bed.clone(), vec![0.0; n]).unwrap();
        let field = CellField::cold_start(1.0, &z_bed);
        let mut state = PingPongState::new(field);
        let config = SolverConfig::default();

        for _ in 0..100 {
            let (src, dst) = state.pair_mut();
            godunov_step(&grid, &terrain, src, dst, 0.01, &config);
            state.swap();
        }

        for idx in 0..n {
            assert!(
                (state.src().eta[idx] - 1.0).abs() < 1e-11,
                "静水被扰动: 单元 {} eta={}",
                idx,
                state.src().eta[idx]
            );
        }
    }

    #[test]
    fn test_lake_at_rest_emergent_island() {
        let grid = CartesianGrid::new(9, 9, 1.0, 1.0).unwrap();
        let n = grid.n_cells();
        let mut z_bed = vec![0.0; n];
        // 中央露出水面的岛（水位 1.0，岛顶 2.0）
        for j in 3..6 {
            for i in 3..6 {
                z_bed[grid.id(i, j).get()] = 2.0;
            }
        }
        let terrain = Terrain::new(z_bed.clone(), vec![0.0; n]).unwrap();
        let field = CellField::cold_start(1.0, &z_bed);
        let mut state = PingPongState::new(field);
        let config = SolverConfig::default();

        for _ in 0..1000 {
            let (src, dst) = state.pair_mut();
            godunov_step(&grid, &terrain, src, dst, 0.01, &config);
            state.swap();
        }

        for idx in 0..n {
            assert!(
                state.src().qx[idx].abs() < 1e-12,
                "岛屿静水产生流动: 单元 {} qx={}",
                idx,
                state.src().qx[idx]
            );
            assert!(state.src().qy[idx].abs() < 1e-12);
            let h = state.src().eta[idx] - z_bed[idx];
            assert!(h >= -1e-14);
        }
    }

    #[test]
    fn test_disabled_cell_passthrough() {
        let (grid, mut terrain, _, config) = flat_setup(5, 5, 1.0);
        let n = grid.n_cells();
        let mut field = CellField::cold_start(1.0, &vec![0.0; n]);

        let target = grid.id(2, 2).get();
        field.eta[target] = NODATA_SENTINEL;
        field.eta_max[target] = NODATA_SENTINEL;
        terrain.z_bed[target] = -10000.0;

        let mut state = PingPongState::new(field);
        for _ in 0..50 {
            let (src, dst) = state.pair_mut();
            godunov_step(&grid, &terrain, src, dst, 0.01, &config);
            state.swap();
        }

        assert_eq!(state.src().eta[target], NODATA_SENTINEL);
        assert_eq!(state.src().eta_max[target], NODATA_SENTINEL);
    }

    #[test]
    fn test_mass_conservation_closed_basin() {
        // 高底床墙围成的封闭水池，中央扰动
        let grid = CartesianGrid::new(10, 10, 1.0, 1.0).unwrap();
        let n = grid.n_cells();
        let mut z_bed = vec![0.0; n];
        for j in 0..10 {
            for i in 0..10 {
                if i == 0 || j == 0 || i == 9 || j == 9 {
                    z_bed[grid.id(i, j).get()] = 10.0;
                }
            }
        }
        let terrain = Terrain::new(z_bed.clone(), vec![0.0; n]).unwrap();
        let mut field = CellField::cold_start(1.0, &z_bed);
        // 中央隆起水柱
        let centre = grid.id(5, 5).get();
        field.eta[centre] = 1.5;
        field.eta_max[centre] = 1.5;

        let mut state = PingPongState::new(field);
        let config = SolverConfig::default();
        let volume_initial = state.src().total_volume(&terrain, grid.cell_area());

        for _ in 0..500 {
            let (src, dst) = state.pair_mut();
            godunov_step(&grid, &terrain, src, dst, 0.005, &config);
            state.swap();
        }

        let volume_final = state.src().total_volume(&terrain, grid.cell_area());
        assert!(
            (volume_final - volume_initial).abs() / volume_initial < 1e-9,
            "质量不守恒: {} -> {}",
            volume_initial,
            volume_final
        );
        state.src().validate(0.0).unwrap();
    }

    #[test]
    fn test_eta_max_monotone() {
        let grid = CartesianGrid::new(10, 4, 0.5, 0.5).unwrap();
        let n = grid.n_cells();
        let z_bed = vec![0.0; n];
        let terrain = Terrain::new(z_bed.clone(), vec![0.0; n]).unwrap();
        let mut field = CellField::cold_start(0.2, &z_bed);
        // 左侧高水位
        for j in 0..4 {
            for i in 0..4 {
                let idx = grid.id(i, j).get();
                field.eta[idx] = 1.0;
                field.eta_max[idx] = 1.0;
            }
        }

        let mut state = PingPongState::new(field);
        let config = SolverConfig::default();
        let mut prev_max: Vec<f64> = state.src().eta_max.to_vec();

        for _ in 0..100 {
            let (src, dst) = state.pair_mut();
            godunov_step(&grid, &terrain, src, dst, 0.002, &config);
            state.swap();

            for idx in 0..n {
                let cur = state.src().eta_max[idx];
                assert!(cur >= prev_max[idx] - 1e-15, "η_max 回退: 单元 {}", idx);
                assert!(cur >= state.src().eta[idx] - 1e-15);
                prev_max[idx] = cur;
            }
        }
    }
}
