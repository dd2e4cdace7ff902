// crates/th_physics/src/engine/solver.rs

//! 主机编排器
//!
//! 按固定顺序提交每步的核序列：
//!
//! ```text
//! 流式回调 → 边界核(就地) → 波速归约 → 时间步推进 → 格式核(src→dst)
//!          → 独立摩擦核(可选) → 乒乓交换
//! ```
//!
//! 批次状态机：
//! - RUN: Δt > 0，核执行，步末排队归约
//! - SYNC_REACHED: Δt 取负，主机读回、调整同步点、复位符号，可回滚
//! - IDLE: Δt == 0，本步跳过但仍计数

use log::{debug, info};
use th_foundation::{ThError, ThResult};

use crate::boundary::{BoundaryCondition, BoundaryContext};
use crate::engine::timestep::{
    advance_normal, reduce_wave_speeds, update_after_rollback, TimestepBlock,
};
use crate::grid::CartesianGrid;
use crate::schemes::{godunov_step, inertial_step};
use crate::sources::friction::apply_friction_field;
use crate::state::{CellField, PingPongState, Terrain};
use crate::types::{FrictionMode, SchemeKind, SolverConfig};

/// 批次状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStatus {
    /// 正常推进
    #[default]
    Running,
    /// 已达同步点（Δt 为负，待主机处理）
    SyncReached,
    /// 跳过（Δt 为零）
    Idle,
}

/// 队列模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// 按批次速率自动调整排队步数
    #[default]
    Auto,
    /// 固定排队步数
    Fixed,
}

/// 浅水模拟编排器（主机参考后端）
pub struct Simulation {
    grid: CartesianGrid,
    terrain: Terrain,
    state: PingPongState,
    saved: Option<CellField>,
    boundaries: Vec<Box<dyn BoundaryCondition>>,
    block: TimestepBlock,
    reduction: Vec<f64>,
    config: SolverConfig,
    status: BatchStatus,
    queue_mode: QueueMode,
    queue_size: usize,
}

impl Simulation {
    /// 创建模拟
    pub fn new(
        grid: CartesianGrid,
        terrain: Terrain,
        initial: CellField,
        config: SolverConfig,
    ) -> ThResult<Self> {
        ThError::check_size("terrain", grid.n_cells(), terrain.z_bed.len())?;
        ThError::check_size("initial state", grid.n_cells(), initial.n_cells())?;

        let groups = config.reduction_groups.max(1);
        info!(
            "simulation prepared: {}x{} cells, dx={:.3} dy={:.3}, scheme={}",
            grid.cols(),
            grid.rows(),
            grid.dx(),
            grid.dy(),
            config.scheme
        );

        Ok(Self {
            grid,
            terrain,
            state: PingPongState::new(initial),
            saved: None,
            boundaries: Vec::new(),
            block: TimestepBlock::default(),
            reduction: vec![0.0; groups],
            config,
            status: BatchStatus::Idle,
            queue_mode: QueueMode::Auto,
            queue_size: 1,
        })
    }

    /// 注册边界条件
    ///
    /// 多个边界的目标单元必须互不相交（重叠时应用顺序未定义）。
    pub fn add_boundary(&mut self, boundary: Box<dyn BoundaryCondition>) {
        debug!("boundary '{}' registered", boundary.name());
        self.boundaries.push(boundary);
    }

    /// 网格
    pub fn grid(&self) -> &CartesianGrid {
        &self.grid
    }

    /// 地形
    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// 当前源状态场
    pub fn state(&self) -> &CellField {
        self.state.src()
    }

    /// 当前源状态场（可变，供初始条件注入）
    pub fn state_mut(&mut self) -> &mut CellField {
        self.state.src_mut()
    }

    /// 时间步标量块
    pub fn block(&self) -> &TimestepBlock {
        &self.block
    }

    /// 批次状态
    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// 设置下一同步屏障
    pub fn set_sync_time(&mut self, t_sync: f64) {
        self.block.sync_time = t_sync;
    }

    /// 设置队列模式
    pub fn set_queue_mode(&mut self, mode: QueueMode) {
        self.queue_mode = mode;
    }

    /// 设置排队步数（固定模式下的批次长度）
    pub fn set_queue_size(&mut self, size: usize) {
        self.queue_size = size.max(1);
    }

    /// 当前排队步数
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// 提议同步点
    ///
    /// 以批次平均时间步外推一个队列批次可覆盖的时间，不超过目标。
    pub fn propose_sync_point(&self, target: f64) -> f64 {
        let avg = self.block.average_timestep();
        if avg <= 0.0 {
            return target;
        }
        (self.block.time + avg * self.queue_size as f64).min(target)
    }

    /// 自动队列调整：批次顺利完成时加长，回滚时减半
    fn adjust_queue(&mut self, grew: bool) {
        if self.queue_mode != QueueMode::Auto {
            return;
        }
        if grew {
            self.queue_size = (self.queue_size * 3 / 2 + 1).min(64);
        } else {
            self.queue_size = (self.queue_size / 2).max(1);
        }
    }

    /// 启用单元上的水体总体积 [m³]
    pub fn total_volume(&self) -> f64 {
        self.state.src().total_volume(&self.terrain, self.grid.cell_area())
    }

    /// 保存当前状态（供回滚）
    pub fn save_state(&mut self) {
        match &mut self.saved {
            Some(saved) => saved.copy_from(self.state.src()),
            None => self.saved = Some(self.state.src().clone()),
        }
    }

    /// 回滚到上次保存的状态并重算时间步
    pub fn rollback(&mut self) -> ThResult<()> {
        let saved = self
            .saved
            .as_ref()
            .ok_or_else(|| ThError::internal("无已保存状态可回滚"))?;
        self.state.src_mut().copy_from(saved);

        reduce_wave_speeds(&self.terrain, self.state.src(), &self.config, &mut self.reduction);
        update_after_rollback(
            &mut self.block,
            &self.reduction,
            self.grid.min_spacing(),
            &self.config,
        );
        self.adjust_queue(false);
        self.status = BatchStatus::Running;
        Ok(())
    }

    /// 同步点处理后复位时间步符号继续推进
    pub fn resume_after_sync(&mut self) {
        if self.block.dt < 0.0 {
            self.block.dt = -self.block.dt;
        }
        self.status = BatchStatus::Running;
    }

    /// 执行一步
    pub fn step(&mut self) -> ThResult<BatchStatus> {
        // 流式边界推进（上载必须先于消费核入队）
        for boundary in &mut self.boundaries {
            boundary.stream(self.block.time)?;
        }

        // 边界核就地修改源缓冲（各核自行尊重 Δt > 0）
        {
            let ctx = BoundaryContext {
                grid: &self.grid,
                terrain: &self.terrain,
                params: &self.config.params,
                time: self.block.time,
                dt: self.block.dt,
                time_hydro: self.block.time_hydro,
            };
            let state = self.state.src_mut();
            for boundary in &mut self.boundaries {
                boundary.apply(&ctx, state);
            }
        }

        // 归约 + 时间推进
        reduce_wave_speeds(&self.terrain, self.state.src(), &self.config, &mut self.reduction);
        advance_normal(
            &mut self.block,
            &self.reduction,
            self.grid.min_spacing(),
            &self.config,
        );

        if self.block.dt > 0.0 {
            let dt = self.block.dt;
            {
                let (src, dst) = self.state.pair_mut();
                match self.config.scheme {
                    SchemeKind::Godunov => {
                        godunov_step(&self.grid, &self.terrain, src, dst, dt, &self.config)
                    }
                    SchemeKind::Inertial => {
                        inertial_step(&self.grid, &self.terrain, src, dst, dt, &self.config)
                    }
                }
            }
            self.state.swap();

            if self.config.friction == FrictionMode::Standalone {
                apply_friction_field(&self.terrain, self.state.src_mut(), dt, &self.config.params);
            }
            self.status = BatchStatus::Running;
        } else if self.block.dt < 0.0 {
            debug!(
                "sync point reached at t={:.6}s ({} ok, {} skipped)",
                self.block.time, self.block.successful, self.block.skipped
            );
            self.status = BatchStatus::SyncReached;
        } else {
            self.status = BatchStatus::Idle;
        }

        Ok(self.status)
    }

    /// 推进到同步点
    ///
    /// 循环执行步进直至时间步控制核示意到达 `t_sync`；
    /// 返回前校验状态有限性（NaN 毒化经此上浮）。
    pub fn run_to_sync(&mut self, t_sync: f64, max_steps: usize) -> ThResult<BatchStatus> {
        self.set_sync_time(t_sync);

        for _ in 0..max_steps {
            if self.step()? == BatchStatus::SyncReached {
                self.state.src().validate(self.block.time)?;
                self.adjust_queue(true);
                return Ok(BatchStatus::SyncReached);
            }
        }

        self.state.src().validate(self.block.time)?;
        Err(ThError::internal(format!(
            "超过最大步数 {} 仍未到达同步点 t={}",
            max_steps, t_sync
        )))
    }
}
