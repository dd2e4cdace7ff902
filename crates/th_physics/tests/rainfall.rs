//! 封闭流域降雨积水验证
//!
//! 32×32 有效内部、失效边界环（z_b = −10000）的封闭流域上
//! 施加 10 mm/hr 均匀降雨 3600 s：最终平均水深应为 0.010 m，
//! 水文子步的区间覆盖不重不漏（允许最后一个未消费周期的欠差）。

use th_physics::boundary::{UniformBoundary, UniformKind};
use th_physics::forcing::TimeSeries;
use th_physics::{
    CartesianGrid, CellField, FrictionMode, SchemeKind, Simulation, SolverConfig, Terrain,
};

fn rain_basin(cols: usize, rows: usize, rate_mm_hr: f64) -> Simulation {
    let grid = CartesianGrid::new(cols, rows, 1.0, 1.0).unwrap();
    let n = grid.n_cells();

    let mut z_bed = vec![0.0; n];
    for j in 0..rows {
        for i in 0..cols {
            if i == 0 || j == 0 || i == cols - 1 || j == rows - 1 {
                z_bed[grid.id(i, j).get()] = -10000.0;
            }
        }
    }
    let terrain = Terrain::new(z_bed.clone(), vec![0.03; n]).unwrap();
    let initial = CellField::cold_start(0.0, &z_bed);

    let config = SolverConfig::builder()
        .scheme(SchemeKind::Godunov)
        .fixed_timestep(0.125)
        .friction(FrictionMode::InKernel)
        .build();

    let mut sim = Simulation::new(grid, terrain, initial, config).unwrap();
    let series = TimeSeries::from_points(vec![(0.0, rate_mm_hr), (1e7, rate_mm_hr)]);
    sim.add_boundary(Box::new(UniformBoundary::new(
        "design_storm",
        UniformKind::Rainfall,
        series,
    )));
    sim
}

#[test]
fn test_constant_rain_final_mean_depth() {
    // 34×34 网格 → 32×32 有效内部
    let mut sim = rain_basin(34, 34, 10.0);
    sim.run_to_sync(3600.0, 60000).unwrap();

    let grid = sim.grid();
    let state = sim.state();

    let mut total_depth = 0.0;
    let mut wet_cells = 0usize;
    for j in 1..grid.rows() - 1 {
        for i in 1..grid.cols() - 1 {
            let idx = grid.id(i, j).get();
            total_depth += state.eta[idx];
            wet_cells += 1;
        }
    }
    assert_eq!(wet_cells, 32 * 32);

    let mean_depth = total_depth / wet_cells as f64;
    // 10 mm/hr × 3600 s = 0.010 m
    assert!(
        (mean_depth - 0.010).abs() < 1e-6,
        "平均水深 {} 偏离 0.010 m",
        mean_depth
    );
}

#[test]
fn test_rain_volume_accounting() {
    let mut sim = rain_basin(10, 10, 36.0);
    let volume_initial = sim.total_volume();

    sim.run_to_sync(100.0, 10000).unwrap();

    // 36 mm/hr = 1e-5 m/s；水文子步恰好覆盖 [0, 100 − T_H]，
    // 终点处最后一个周期未被消费；有效内部 8×8 = 64 m²
    let expected = 1e-5 * (100.0 - 0.25) * 64.0;
    let gained = sim.total_volume() - volume_initial;
    assert!(
        (gained - expected).abs() / expected < 1e-8,
        "降雨体积 {} 偏离期望 {}",
        gained,
        expected
    );
}

#[test]
fn test_rain_disabled_ring_untouched() {
    let mut sim = rain_basin(10, 10, 100.0);
    sim.run_to_sync(50.0, 10000).unwrap();

    let grid = sim.grid();
    let state = sim.state();
    for i in 0..grid.cols() {
        let bottom = grid.id(i, 0).get();
        let top = grid.id(i, grid.rows() - 1).get();
        assert!(state.eta[bottom] <= -9999.0, "失效单元被降雨修改");
        assert!(state.eta[top] <= -9999.0);
    }
}

#[test]
fn test_rain_then_loss_drains_back() {
    let grid = CartesianGrid::new(8, 8, 1.0, 1.0).unwrap();
    let n = grid.n_cells();
    let z_bed = vec![0.0; n];
    let terrain = Terrain::new(z_bed.clone(), vec![0.03; n]).unwrap();
    let initial = CellField::cold_start(0.001, &z_bed);

    let config = SolverConfig::builder()
        .fixed_timestep(0.125)
        .friction(FrictionMode::InKernel)
        .build();
    let mut sim = Simulation::new(grid, terrain, initial, config).unwrap();

    // 损失速率远超存量 → 全域回落到底床
    let series = TimeSeries::from_points(vec![(0.0, 3600.0), (1e7, 3600.0)]);
    sim.add_boundary(Box::new(UniformBoundary::new(
        "infiltration",
        UniformKind::Loss,
        series,
    )));

    sim.run_to_sync(30.0, 10000).unwrap();

    for idx in 0..n {
        let h = sim.state().eta[idx];
        assert!(
            (0.0..1e-9).contains(&h),
            "损失未钳制到底床: 单元 {} h={}",
            idx,
            h
        );
    }
}
