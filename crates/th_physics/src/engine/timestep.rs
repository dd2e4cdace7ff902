// crates/th_physics/src/engine/timestep.rs

//! CFL 归约与时间步控制
//!
//! 两级树形归约：第一级按工作组分块计算最大波速写入归约缓冲，
//! 第二级标量核读取归约结果，推进模拟时间并确定下一时间步。
//!
//! ## 控制核语义
//!
//! 1. `t += Δt_in`，`t_hydro` 在超过水文周期后回卷（先回卷后累加，
//!    保证均匀核消费的区间不重不漏）；按 Δt_in 符号累加成功/跳过计数
//! 2. `Δt_cfl = C·Δx_min/s_max`
//! 3. 起步阶段下限抬升（干启动自举）
//! 4. 正时间步的最小值下限
//! 5. 同步点钳制：越过同步点时截断；已达同步点时取负示意主机
//! 6. 初期上限限制
//! 7. 截断到模拟终点与全局上限
//!
//! 回滚后使用 [`update_after_rollback`]：重新归约后取重算值与
//! 回滚前 |Δt| 的较小者，再套用全部钳制。

use rayon::prelude::*;
use th_foundation::constants::NODATA_SENTINEL;

use crate::state::{CellField, Terrain};
use crate::types::{SolverConfig, TimestepMode, WaveSpeedForm};

// ============================================================
// 时间步标量块
// ============================================================

/// 时间步标量块（设备可见，单一所有者：时间步控制核）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestepBlock {
    /// 模拟时间 [s]
    pub time: f64,
    /// 当前时间步 [s]；正值推进、零跳过、负值表示已达同步点
    pub dt: f64,
    /// 水文子时钟 [s]
    pub time_hydro: f64,
    /// 下一同步屏障 [s]
    pub sync_time: f64,
    /// 批次累计时间步 [s]
    pub batch_total: f64,
    /// 成功迭代计数
    pub successful: u32,
    /// 跳过迭代计数
    pub skipped: u32,
}

impl Default for TimestepBlock {
    fn default() -> Self {
        Self {
            time: 0.0,
            dt: 0.0,
            time_hydro: 0.0,
            sync_time: f64::MAX,
            batch_total: 0.0,
            successful: 0,
            skipped: 0,
        }
    }
}

impl TimestepBlock {
    /// 批次平均时间步 [s]
    pub fn average_timestep(&self) -> f64 {
        if self.successful == 0 {
            0.0
        } else {
            self.batch_total / self.successful as f64
        }
    }

    /// 是否处于挂起状态（已达同步点）
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.dt < 0.0
    }

    /// 重置批次计数
    pub fn reset_batch(&mut self) {
        self.batch_total = 0.0;
        self.successful = 0;
        self.skipped = 0;
    }
}

// ============================================================
// 第一级：波速归约
// ============================================================

/// 单元波速
#[inline]
fn cell_wave_speed(
    eta: f64,
    eta_max: f64,
    qx: f64,
    qy: f64,
    z_bed: f64,
    gravity: f64,
    eps: f64,
    form: WaveSpeedForm,
) -> f64 {
    if eta_max <= NODATA_SENTINEL || eta <= NODATA_SENTINEL || z_bed <= NODATA_SENTINEL {
        return 0.0;
    }
    let h = eta - z_bed;
    if h < eps {
        return 0.0;
    }
    let celerity = (gravity * h).sqrt();
    match form {
        WaveSpeedForm::Simplified => celerity,
        WaveSpeedForm::Full => {
            let u = (qx / h).abs();
            let v = (qy / h).abs();
            (u + celerity).max(v + celerity)
        }
    }
}

/// 第一级归约：分块计算最大波速写入归约缓冲
///
/// 主机参考后端将定义域划分为 `reduction.len()` 个连续块，
/// 与设备端工作组跨步归约语义一致。
pub fn reduce_wave_speeds(
    terrain: &Terrain,
    state: &CellField,
    config: &SolverConfig,
    reduction: &mut [f64],
) {
    let n = state.n_cells();
    let groups = reduction.len().max(1);
    let chunk = n.div_ceil(groups);
    let params = &config.params;
    let form = config.wave_speed;

    reduction.par_iter_mut().enumerate().for_each(|(g, out)| {
        let start = g * chunk;
        let end = ((g + 1) * chunk).min(n);
        let mut group_max = 0.0f64;
        for idx in start..end {
            let speed = cell_wave_speed(
                state.eta[idx],
                state.eta_max[idx],
                state.qx[idx],
                state.qy[idx],
                terrain.z_bed[idx],
                params.gravity,
                params.very_small,
                form,
            );
            group_max = group_max.max(speed);
        }
        *out = group_max;
    });
}

// ============================================================
// 第二级：标量控制核
// ============================================================

/// 按 CFL 条件计算候选时间步
#[inline]
fn courant_timestep(s_max: f64, dx_min: f64, config: &SolverConfig) -> f64 {
    let params = &config.params;
    if s_max < params.very_small {
        params.dt_max
    } else {
        params.courant * dx_min / s_max
    }
}

/// 对候选时间步套用下限/同步/上限钳制
#[inline]
fn apply_limits(mut dt: f64, block: &TimestepBlock, config: &SolverConfig) -> f64 {
    let params = &config.params;
    let dynamic = config.timestep_mode == TimestepMode::Dynamic;

    if dynamic {
        // 起步阶段下限（干启动自举）
        if block.time < params.start_duration && dt < params.dt_start_min {
            dt = params.dt_start_min;
        }
        if dt > 0.0 && dt < params.dt_min {
            dt = params.dt_min;
        }
    }

    // 同步点
    if block.time + dt >= block.sync_time {
        if block.sync_time - block.time > params.very_small {
            dt = block.sync_time - block.time;
        } else {
            dt = -dt;
        }
    }

    if dt > 0.0 {
        if dynamic && block.time < params.early_duration && dt > params.early_limit {
            dt = params.early_limit;
        }
        if block.time + dt > config.end_time {
            dt = (config.end_time - block.time).max(0.0);
        }
        if dt > params.dt_max {
            dt = params.dt_max;
        }
    }

    dt
}

/// 第二级标量核：推进时间并确定下一时间步
pub fn advance_normal(
    block: &mut TimestepBlock,
    reduction: &[f64],
    dx_min: f64,
    config: &SolverConfig,
) {
    let dt_in = block.dt;
    if dt_in > 0.0 {
        block.time += dt_in;
        block.batch_total += dt_in;
        block.successful += 1;
        // 先回卷后累加：均匀核在本步开始时已消费了累计值
        if block.time_hydro >= config.params.hydrological_period {
            block.time_hydro = 0.0;
        }
        block.time_hydro += dt_in;
    } else {
        block.skipped += 1;
    }

    let s_max = reduction.iter().cloned().fold(0.0f64, f64::max);
    let dt = match config.timestep_mode {
        TimestepMode::Fixed => config.fixed_dt,
        TimestepMode::Dynamic => courant_timestep(s_max, dx_min, config),
    };

    block.dt = apply_limits(dt, block, config);
}

/// 回滚/重同步后的时间步更新核
///
/// 不推进时间；取重算时间步与回滚前 |Δt| 的较小者并重套钳制。
pub fn update_after_rollback(
    block: &mut TimestepBlock,
    reduction: &[f64],
    dx_min: f64,
    config: &SolverConfig,
) {
    let dt_old = block.dt.abs();

    let s_max = reduction.iter().cloned().fold(0.0f64, f64::max);
    let mut dt = match config.timestep_mode {
        TimestepMode::Fixed => config.fixed_dt,
        TimestepMode::Dynamic => courant_timestep(s_max, dx_min, config),
    };

    if dt_old > 0.0 {
        dt = dt.min(dt_old);
    }

    block.dt = apply_limits(dt, block, config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SolverConfig;

    fn dynamic_config() -> SolverConfig {
        SolverConfig::default()
    }

    #[test]
    fn test_courant_timestep_reference() {
        // s_max=5, Δx=1, C=0.5 → Δt = 0.1
        let config = dynamic_config();
        let mut block = TimestepBlock::default();
        advance_normal(&mut block, &[5.0, 2.0, 1.0], 1.0, &config);
        assert!((block.dt - 0.1).abs() < 1e-12, "dt={}", block.dt);
    }

    #[test]
    fn test_advance_accumulates_time() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            dt: 0.05,
            ..Default::default()
        };
        advance_normal(&mut block, &[1.0], 1.0, &config);
        assert!((block.time - 0.05).abs() < 1e-12);
        assert_eq!(block.successful, 1);
        assert_eq!(block.skipped, 0);
        assert!((block.batch_total - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_zero_dt_counts_skipped() {
        let config = dynamic_config();
        let mut block = TimestepBlock::default();
        advance_normal(&mut block, &[1.0], 1.0, &config);
        assert_eq!(block.skipped, 1);
        assert_eq!(block.time, 0.0);
    }

    #[test]
    fn test_hydro_clock_wraps_after_consumption() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            dt: 0.1,
            time_hydro: 0.3, // 已超过 0.25，本步边界核已消费
            ..Default::default()
        };
        advance_normal(&mut block, &[1.0], 1.0, &config);
        // 回卷后累加本步
        assert!((block.time_hydro - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_hydro_clock_accumulates_below_period() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            dt: 0.1,
            time_hydro: 0.1,
            ..Default::default()
        };
        advance_normal(&mut block, &[1.0], 1.0, &config);
        assert!((block.time_hydro - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_sync_point_clamp() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            dt: 0.0,
            time: 0.95,
            sync_time: 1.0,
            ..Default::default()
        };
        // CFL 给出 0.1，但同步点只剩 0.05
        advance_normal(&mut block, &[5.0], 1.0, &config);
        assert!((block.dt - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_sync_point_reached_flips_sign() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            dt: 0.0,
            time: 1.0,
            sync_time: 1.0,
            ..Default::default()
        };
        advance_normal(&mut block, &[5.0], 1.0, &config);
        assert!(block.dt < 0.0, "到达同步点应取负: dt={}", block.dt);
        assert!(block.is_suspended());
        assert!((block.dt + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_early_limit() {
        // 初期阶段时间步不超过 0.1 s
        let config = dynamic_config();
        let mut block = TimestepBlock::default();
        advance_normal(&mut block, &[0.01], 1.0, &config);
        assert!(block.dt <= 0.1 + 1e-15);
    }

    #[test]
    fn test_dt_max_cap_after_early_phase() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            time: 100.0,
            sync_time: f64::MAX,
            ..Default::default()
        };
        advance_normal(&mut block, &[1e-16], 1.0, &config);
        assert!((block.dt - config.params.dt_max).abs() < 1e-9);
    }

    #[test]
    fn test_start_floor_on_dry_domain() {
        // 干启动：s_max=0 → dt_max，但起步下限逻辑不受触发
        let config = dynamic_config();
        let mut block = TimestepBlock::default();
        advance_normal(&mut block, &[0.0], 1.0, &config);
        assert!(block.dt >= config.params.dt_start_min);
    }

    #[test]
    fn test_fixed_mode() {
        let config = SolverConfig::builder().fixed_timestep(0.02).build();
        let mut block = TimestepBlock::default();
        advance_normal(&mut block, &[100.0], 1.0, &config);
        assert!((block.dt - 0.02).abs() < 1e-15);
    }

    #[test]
    fn test_end_time_cap() {
        let config = SolverConfig::builder().end_time(1.0).build();
        let mut block = TimestepBlock {
            time: 0.98,
            ..Default::default()
        };
        advance_normal(&mut block, &[0.01], 1.0, &config);
        assert!(block.dt <= 0.02 + 1e-12);
    }

    #[test]
    fn test_rollback_update_keeps_smaller() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            dt: -0.001, // 回滚前 |dt| = 0.001
            time: 100.0,
            ..Default::default()
        };
        // 重算 CFL 给出 0.1，取较小者 0.001
        update_after_rollback(&mut block, &[5.0], 1.0, &config);
        assert!((block.dt - 0.001).abs() < 1e-12);
        // 时间与计数不受影响
        assert!((block.time - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_rollback_update_adopts_recomputed_if_smaller() {
        let config = dynamic_config();
        let mut block = TimestepBlock {
            dt: 1.0,
            time: 100.0,
            ..Default::default()
        };
        update_after_rollback(&mut block, &[50.0], 1.0, &config);
        assert!((block.dt - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_reduction_skips_dry_and_disabled() {
        use crate::state::{CellField, Terrain};
        let n = 8;
        let terrain = Terrain::uniform(n, 0.0, 0.03);
        let mut field = CellField::cold_start(1.0, &vec![0.0; n]);
        field.qx[1] = 2.0; // u = 2 → s = 2 + √g
        field.eta[3] = NODATA_SENTINEL;
        field.eta_max[3] = NODATA_SENTINEL;
        field.eta[4] = 0.0; // 干

        let config = SolverConfig::default();
        let mut reduction = vec![0.0; 2];
        reduce_wave_speeds(&terrain, &field, &config, &mut reduction);

        let s_max = reduction.iter().cloned().fold(0.0f64, f64::max);
        let expected = 2.0 + 9.80665f64.sqrt();
        assert!((s_max - expected).abs() < 1e-9, "s_max={}", s_max);
    }

    #[test]
    fn test_simplified_wave_speed() {
        use crate::state::{CellField, Terrain};
        use crate::types::WaveSpeedForm;

        let n = 4;
        let terrain = Terrain::uniform(n, 0.0, 0.03);
        let mut field = CellField::cold_start(1.0, &vec![0.0; n]);
        field.qx[0] = 5.0;

        let config = SolverConfig::builder()
            .wave_speed(WaveSpeedForm::Simplified)
            .build();
        let mut reduction = vec![0.0; 1];
        reduce_wave_speeds(&terrain, &field, &config, &mut reduction);

        // 简化形式忽略对流速度
        assert!((reduction[0] - 9.80665f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_average_timestep() {
        let mut block = TimestepBlock::default();
        assert_eq!(block.average_timestep(), 0.0);
        block.successful = 4;
        block.batch_total = 0.2;
        assert!((block.average_timestep() - 0.05).abs() < 1e-12);
    }
}
